use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod rootdata_client;
pub mod stdio;

#[cfg(test)]
mod test_support;

use domain::aggregate::FanOutLimits;
use http::sse::SseSessions;
use rootdata_client::RootDataApi;

#[derive(Clone)]
pub struct AppState {
    pub mcp_api_token: Option<Arc<str>>,
    pub rootdata: Arc<dyn RootDataApi>,
    pub limits: FanOutLimits,
    pub sessions: SseSessions,
}

impl AppState {
    pub fn new(
        rootdata: Arc<dyn RootDataApi>,
        limits: FanOutLimits,
        mcp_api_token: Option<String>,
    ) -> Self {
        Self {
            mcp_api_token: mcp_api_token.map(Arc::<str>::from),
            rootdata,
            limits,
            sessions: SseSessions::default(),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/mcp", post(http::handlers::mcp_endpoint))
        .route("/sse", get(http::sse::open_stream))
        .route("/messages", post(http::sse::post_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protected)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
