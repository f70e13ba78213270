//! RootData REST client
//!
//! Every RootData endpoint is a `POST {base_url}/{endpoint}` taking a JSON body and
//! answering with an envelope `{"result": 200, "data": ..., "message": ...}`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Search,
    Project,
    Organization,
    People,
    Investors,
    FundingRounds,
    SyncUpdate,
    HotIndex,
    XHotProjects,
    XPopularFigures,
    JobChanges,
    NewTokens,
    EcosystemMap,
    TagMap,
    ProjectsByEcosystems,
    ProjectsByTags,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Search => "ser_inv",
            Self::Project => "get_item",
            Self::Organization => "get_org",
            Self::People => "get_people",
            Self::Investors => "get_invest",
            Self::FundingRounds => "get_fac",
            Self::SyncUpdate => "ser_change",
            Self::HotIndex => "hot_index",
            Self::XHotProjects => "hot_project_on_x",
            Self::XPopularFigures => "leading_figures_on_crypto_x",
            Self::JobChanges => "job_changes",
            Self::NewTokens => "new_tokens",
            Self::EcosystemMap => "ecosystem_map",
            Self::TagMap => "tag_map",
            Self::ProjectsByEcosystems => "projects_by_ecosystems",
            Self::ProjectsByTags => "projects_by_tags",
        }
    }
}

#[async_trait]
pub trait RootDataApi: Send + Sync {
    /// Issues one upstream call and returns the envelope's `data` payload.
    async fn call(&self, endpoint: Endpoint, params: Value) -> Result<Value, AppError>;
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_key: String,
    pub base_url: String,
    pub language: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpRootDataClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    result: Option<i64>,
    /// `Some(Value::Null)` for an explicit `"data": null`, `None` when the field is absent.
    #[serde(default, deserialize_with = "present")]
    data: Option<Value>,
    message: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl HttpRootDataClient {
    pub fn new(settings: ClientSettings) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::HeaderName::from_static("apikey"),
            header::HeaderValue::from_str(&settings.api_key)
                .map_err(|_| AppError::internal("api key is not a valid header value"))?,
        );
        headers.insert(
            header::HeaderName::from_static("language"),
            header::HeaderValue::from_str(&settings.language)
                .map_err(|_| AppError::internal("language is not a valid header value"))?,
        );

        let client = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| AppError::internal(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl RootDataApi for HttpRootDataClient {
    async fn call(&self, endpoint: Endpoint, params: Value) -> Result<Value, AppError> {
        let started_at = Instant::now();
        let body = strip_nulls(params);

        let response = self
            .client
            .post(self.url(endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AppError::upstream(504, format!("{} timed out", endpoint.path()))
                } else {
                    AppError::upstream(502, format!("{} request failed: {err}", endpoint.path()))
                }
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| {
            AppError::upstream(502, format!("{} body read failed: {err}", endpoint.path()))
        })?;

        debug!(
            endpoint = endpoint.path(),
            status = status.as_u16(),
            duration_ms = started_at.elapsed().as_millis(),
            "rootdata call completed"
        );

        if !status.is_success() {
            let message = serde_json::from_slice::<Envelope>(&bytes)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| format!("RootData API returned status: {}", status.as_u16()));
            return Err(AppError::upstream(status.as_u16(), message));
        }

        parse_envelope(endpoint, &bytes)
    }
}

pub fn parse_envelope(endpoint: Endpoint, bytes: &[u8]) -> Result<Value, AppError> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(|err| {
        AppError::malformed(format!("{} returned invalid json: {err}", endpoint.path()))
    })?;

    let Some(result) = envelope.result else {
        return Err(AppError::malformed(format!(
            "{} response is missing the result field",
            endpoint.path()
        )));
    };

    if result != 200 {
        let status = u16::try_from(result).unwrap_or(502);
        return Err(AppError::upstream(
            status,
            envelope
                .message
                .unwrap_or_else(|| format!("API Error: {result}")),
        ));
    }

    envelope.data.ok_or_else(|| {
        AppError::malformed(format!(
            "{} response is missing the data field",
            endpoint.path()
        ))
    })
}

/// Drops `null` members from the top-level body; unset optional parameters are not sent.
fn strip_nulls(params: Value) -> Value {
    match params {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, value)| !value.is_null())
                .collect::<Map<_, _>>(),
        ),
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> HttpRootDataClient {
        HttpRootDataClient::new(ClientSettings {
            api_key: "test-key".to_string(),
            base_url: format!("{}/open/", server.uri()),
            language: "en".to_string(),
            timeout: Duration::from_secs(5),
        })
        .expect("client should build")
    }

    #[tokio::test]
    async fn sends_credential_and_returns_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/open/ser_inv"))
            .and(header("apikey", "test-key"))
            .and(header("language", "en"))
            .and(body_json(json!({"query": "ethereum"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": 200,
                "data": [{"id": 12, "type": 1, "name": "Ethereum"}]
            })))
            .mount(&server)
            .await;

        let data = client_for(&server)
            .call(
                Endpoint::Search,
                json!({"query": "ethereum", "precise_x_search": null}),
            )
            .await
            .expect("call should succeed");

        assert_eq!(data[0]["name"], "Ethereum");
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/open/get_fac"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .call(Endpoint::FundingRounds, json!({}))
            .await
            .expect_err("expected upstream error");

        assert_eq!(error.upstream_status(), Some(500));
        assert!(error.public_message().contains("500"));
    }

    #[tokio::test]
    async fn api_level_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/open/get_people"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": 403,
                "message": "Pro plan required"
            })))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .call(Endpoint::People, json!({"people_id": 1}))
            .await
            .expect_err("expected api error");

        assert_eq!(error.upstream_status(), Some(403));
        assert_eq!(error.public_message(), "Pro plan required");
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/open/tag_map"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .call(Endpoint::TagMap, json!({}))
            .await
            .expect_err("expected malformed response");

        assert_eq!(error.code(), "malformed_response");
    }

    #[test]
    fn missing_data_is_malformed() {
        let error = parse_envelope(Endpoint::NewTokens, br#"{"result":200}"#)
            .expect_err("expected malformed response");
        assert_eq!(error.code(), "malformed_response");
    }

    #[test]
    fn explicit_null_data_is_passed_through() {
        let data = parse_envelope(Endpoint::NewTokens, br#"{"result":200,"data":null}"#)
            .expect("null data is a valid payload");
        assert!(data.is_null());
    }

    #[test]
    fn strips_null_parameters() {
        let body = strip_nulls(json!({"page": 1, "start_time": null}));
        assert_eq!(body, json!({"page": 1}));
    }
}
