//! JSON-RPC protocol representations and formatting utilities
//!
//! Provides standardized mapping of internal AppErrors to valid JSON-RPC payloads.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::AppError;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub const UPSTREAM_ERROR: i32 = -32010;
pub const MALFORMED_RESPONSE: i32 = -32011;
pub const ENTITY_NOT_FOUND: i32 = -32012;
pub const AGGREGATION_FAILED: i32 = -32013;

fn error_data(err: &AppError) -> Value {
    let mut details = json!({});
    if let Some(status) = err.upstream_status() {
        details["upstream_status"] = json!(status);
    }
    if let AppError::EntityNotFound { name } = err {
        details["entity"] = json!(name);
    }

    json!({
        "code": err.code(),
        "message": err.public_message(),
        "details": details
    })
}

pub fn app_error_to_json_rpc(id: Option<Value>, err: AppError) -> Value {
    let (code, message) = match &err {
        AppError::BadRequest { .. } => (-32602, "Invalid params"),
        AppError::Unauthorized { .. } => (-32001, "Unauthorized"),
        AppError::NotFound { .. } => (-32601, "Method not found"),
        AppError::Upstream { .. } => (UPSTREAM_ERROR, "Upstream error"),
        AppError::MalformedResponse { .. } => (MALFORMED_RESPONSE, "Malformed upstream response"),
        AppError::EntityNotFound { .. } => (ENTITY_NOT_FOUND, "Entity not found"),
        AppError::AggregationFailed { .. } => (AGGREGATION_FAILED, "Aggregation failed"),
        AppError::Internal { message, .. } => {
            tracing::error!(error = %message, "tool call failed with internal error");
            return json_rpc_error(id, -32603, "Internal error");
        }
    };

    json_rpc_error_with_data(id, code, message, Some(error_data(&err)))
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        id.as_ref().and_then(value_to_request_id),
    );
    serde_json::to_value(response).expect("jsonrpc error response serialization")
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let extra = result.as_object().cloned();
        let response = JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra });
        return serde_json::to_value(response).expect("jsonrpc result response serialization");
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

pub fn request_id_to_value(id: RequestId) -> Value {
    match id {
        RequestId::String(value) => Value::String(value),
        RequestId::Integer(value) => Value::Number(value.into()),
    }
}
