//! HTTP-stream transport: MCP streamable HTTP with JSON or SSE responses.

use crate::connection::{
    domain::{
        HttpStreamEndpoint, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ServerName,
        TransportKind,
    },
    ports::{Transport, TransportError, TransportResult},
};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Session header assigned by the server during `initialize`.
const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Accept header required by streamable HTTP servers.
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// JSON-RPC transport that POSTs each message to one HTTP endpoint.
pub struct StreamableHttpTransport {
    server_name: ServerName,
    client: reqwest::Client,
    url: String,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl std::fmt::Debug for StreamableHttpTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StreamableHttpTransport")
            .field("server_name", &self.server_name)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl StreamableHttpTransport {
    /// Creates a transport for `endpoint` sharing `client`'s connection pool.
    #[must_use]
    pub fn new(
        server_name: ServerName,
        client: reqwest::Client,
        endpoint: &HttpStreamEndpoint,
        request_timeout: Duration,
    ) -> Self {
        Self {
            server_name,
            client,
            url: endpoint.url.clone(),
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
            request_timeout,
        }
    }

    fn current_session(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remember_session(&self, headers: &HeaderMap) {
        let Some(assigned) = headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        else {
            return;
        };
        *self.session_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(assigned.to_owned());
    }

    async fn post<T: Serialize + Sync>(
        &self,
        method: &str,
        message: &T,
    ) -> TransportResult<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(ACCEPT, ACCEPT_BOTH)
            .timeout(self.request_timeout)
            .json(message);
        if let Some(session) = self.current_session() {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout {
                    method: method.to_owned(),
                }
            } else {
                TransportError::io(err)
            }
        })?;
        self.remember_session(response.headers());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::HttpStream
    }

    async fn request(&self, method: &str, params: Value) -> TransportResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .post(method, &JsonRpcRequest::new(id, method, params))
            .await?;

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout {
                    method: method.to_owned(),
                }
            } else {
                TransportError::io(err)
            }
        })?;

        let messages = if is_event_stream {
            parse_sse_messages(&body)
        } else {
            vec![serde_json::from_str::<Value>(&body).map_err(|err| {
                TransportError::Protocol(format!("response to '{method}' is not JSON: {err}"))
            })?]
        };

        select_response(messages, id)
            .ok_or_else(|| {
                TransportError::Protocol(format!("no JSON-RPC response to '{method}'"))
            })?
            .into_result()
            .map_err(TransportError::Remote)
    }

    async fn notify(&self, method: &str, params: Value) -> TransportResult<()> {
        self.post(method, &JsonRpcNotification::new(method, params))
            .await
            .map(drop)
    }

    async fn close(&self) -> TransportResult<()> {
        let Some(session) = self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return Ok(());
        };

        let response = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, session)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(TransportError::io)?;
        debug!(
            server = %self.server_name,
            status = response.status().as_u16(),
            "MCP HTTP session closed"
        );
        Ok(())
    }
}

/// Extracts the JSON payloads of every `data:` event in an SSE body.
///
/// Multi-line data fields are joined with newlines; events whose data is not
/// JSON are skipped.
#[must_use]
pub fn parse_sse_messages(body: &str) -> Vec<Value> {
    let mut messages = Vec::new();
    let mut data = String::new();

    for line in body.lines().chain(std::iter::once("")) {
        let trimmed = line.trim_end_matches('\r');
        if trimmed.is_empty() {
            if !data.is_empty() {
                if let Ok(value) = serde_json::from_str(&data) {
                    messages.push(value);
                }
                data.clear();
            }
        } else if let Some(payload) = trimmed.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(payload.strip_prefix(' ').unwrap_or(payload));
        }
    }

    messages
}

/// Picks the response answering `id`, or the last response when none
/// carries a matching id.
fn select_response(messages: Vec<Value>, id: u64) -> Option<JsonRpcResponse> {
    let responses: Vec<JsonRpcResponse> = messages
        .into_iter()
        .filter_map(JsonRpcResponse::parse)
        .collect();
    let matching = responses
        .iter()
        .rposition(|response| response.request_id() == Some(id));
    let mut remaining = responses;
    match matching {
        Some(index) => Some(remaining.swap_remove(index)),
        None => remaining.pop(),
    }
}
