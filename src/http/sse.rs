//! Server-sent events transport
//!
//! `GET /sse` opens a session stream whose first event names the POST endpoint for that
//! session. Messages posted to `/messages?session_id=..` are answered on the stream.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::mcp::rpc::json_rpc_error;
use crate::mcp::server::handle_json_rpc_payload;
use crate::AppState;

const SESSION_BUFFER: usize = 64;

/// Open SSE sessions, keyed by session id.
#[derive(Clone, Default)]
pub struct SseSessions {
    inner: Arc<RwLock<HashMap<String, mpsc::Sender<Value>>>>,
}

impl SseSessions {
    pub fn open(&self) -> (String, mpsc::Receiver<Value>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.clone(), tx);
        (id, rx)
    }

    pub fn sender(&self, id: &str) -> Option<mpsc::Sender<Value>> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
    }

    pub fn close(&self, id: &str) {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id);
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unregisters its session when the event stream is dropped.
struct SessionGuard {
    sessions: SseSessions,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.close(&self.id);
        info!(session = %self.id, "sse session closed");
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub session_id: String,
}

pub async fn open_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = state.sessions.open();
    info!(session = %id, "sse session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?session_id={id}"));
    let guard = SessionGuard {
        sessions: state.sessions.clone(),
        id,
    };

    let messages = ReceiverStream::new(rx).map(move |message| {
        let _session = &guard;
        let data = serde_json::to_string(&message).unwrap_or_else(|_| "{}".to_string());
        Ok::<Event, Infallible>(Event::default().event("message").data(data))
    });

    Sse::new(tokio_stream::once(Ok(endpoint)).chain(messages)).keep_alive(KeepAlive::default())
}

/// Accepts one JSON-RPC payload for a session; the response is delivered on its stream.
/// Work still in flight when the stream goes away is dropped with it.
pub async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let Some(sender) = state.sessions.sender(&query.session_id) else {
        return AppError::not_found("unknown_session", "unknown or expired session")
            .into_response();
    };

    let session = query.session_id;
    tokio::spawn(async move {
        let work = async {
            match serde_json::from_slice::<Value>(&body) {
                Ok(payload) => handle_json_rpc_payload(&state, payload).await,
                Err(_) => Some(json_rpc_error(None, -32700, "Parse error")),
            }
        };

        let response = tokio::select! {
            response = work => response,
            _ = sender.closed() => {
                info!(session = %session, "sse session closed, abandoning in-flight request");
                return;
            }
        };

        if let Some(response) = response {
            if sender.send(response).await.is_err() {
                warn!(session = %session, "sse session closed before response was delivered");
            }
        }
    });

    StatusCode::ACCEPTED.into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Bytes,
        extract::{Query, State},
        http::StatusCode,
    };
    use serde_json::{json, Value};

    use super::{post_message, MessageQuery, SseSessions};
    use crate::domain::aggregate::FanOutLimits;
    use crate::errors::AppError;
    use crate::rootdata_client::{Endpoint, RootDataApi};
    use crate::test_support::sample_universe;
    use crate::AppState;

    /// Answers from the sample universe after a delay, counting calls that finish.
    struct SlowRootData {
        delay: Duration,
        started: AtomicUsize,
        completed: AtomicUsize,
    }

    #[async_trait]
    impl RootDataApi for SlowRootData {
        async fn call(&self, endpoint: Endpoint, params: Value) -> Result<Value, AppError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            sample_universe(endpoint, &params)
        }
    }

    #[tokio::test]
    async fn disconnect_abandons_in_flight_tool_call() {
        let api = Arc::new(SlowRootData {
            delay: Duration::from_millis(100),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        });
        let state = AppState::new(api.clone(), FanOutLimits::default(), None);
        let (id, rx) = state.sessions.open();

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": "investigateEntity",
                "arguments": {"entity_name": "Ethereum", "investigation_scope": "all"}
            }
        });
        let response = post_message(
            State(state.clone()),
            Query(MessageQuery {
                session_id: id.clone(),
            }),
            Bytes::from(body.to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(api.started.load(Ordering::SeqCst), 1);

        drop(rx);
        state.sessions.close(&id);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(api.completed.load(Ordering::SeqCst), 0);
        assert_eq!(api.started.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sessions_open_and_close() {
        let sessions = SseSessions::default();
        let (first, _rx1) = sessions.open();
        let (second, _rx2) = sessions.open();

        assert_ne!(first, second);
        assert_eq!(sessions.len(), 2);
        assert!(sessions.sender(&first).is_some());

        sessions.close(&first);
        assert!(sessions.sender(&first).is_none());
        assert_eq!(sessions.len(), 1);
    }
}
