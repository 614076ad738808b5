use super::{BackendError, CallToolResult, RemoteTool, ToolBackend};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "Mcp-Session-Id";
const EVENT_STREAM: &str = "text/event-stream";

/// MCP client over streamable HTTP: JSON-RPC requests are POSTed to a single
/// endpoint and answered with either a JSON body or a short event stream.
///
/// One session is opened lazily and reused. When the connection is lost or
/// the server no longer knows the session, it is released and the next call
/// starts over with a fresh `initialize`.
pub struct McpHttpBackend {
    client: reqwest::Client,
    url: String,
    session: Mutex<Option<Session>>,
    next_id: AtomicU64,
}

#[derive(Debug, Clone)]
struct Session {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Option<Value>,
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListToolsPage {
    tools: Vec<RemoteTool>,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl McpHttpBackend {
    pub fn new(url: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("toolchat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, BackendError> {
        let result = self.try_request(method, params).await;
        if result.as_ref().is_err_and(BackendError::is_connection_lost) {
            let stale = self.session.lock().await.take();
            if let Some(session) = stale {
                self.discard(session).await;
            }
        }
        result
    }

    async fn try_request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, BackendError> {
        let session = self.ensure_session().await?;
        let value = self.call(session.id.as_deref(), method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn ensure_session(&self) -> Result<Session, BackendError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }
        });
        let (headers, response) = self.post(None, &body).await?;
        let session = Session {
            id: headers
                .get(SESSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        };
        // the server may already hold the session even if the handshake fails
        if let Err(err) = self.handshake(&session, response, id).await {
            self.discard(session).await;
            return Err(err);
        }

        *guard = Some(session.clone());
        Ok(session)
    }

    async fn handshake(
        &self,
        session: &Session,
        response: Option<RpcResponse>,
        id: u64,
    ) -> Result<(), BackendError> {
        let response = response.ok_or(BackendError::Malformed(
            "no response to initialize".to_string(),
        ))?;
        let init = rpc_result(response, id)?;
        let server = init.get("serverInfo").cloned().unwrap_or_default();
        info!(
            url = %self.url,
            session = session.id.as_deref().unwrap_or("-"),
            %server,
            "connected to tool server"
        );

        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
        });
        self.post(session.id.as_deref(), &notification).await?;
        Ok(())
    }

    /// Asks the server to end a session. Servers that do not let clients end
    /// sessions answer 405, and one that already forgot it answers 404.
    async fn end_session(&self, session: Session) -> Result<(), BackendError> {
        let Some(id) = session.id else {
            return Ok(());
        };
        let response = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, &id)
            .send()
            .await?;
        let status = response.status().as_u16();
        if !response.status().is_success() && status != 404 && status != 405 {
            return Err(BackendError::Status {
                status,
                body: response.text().await.unwrap_or_default(),
            });
        }
        debug!(session = %id, "closed tool server session");
        Ok(())
    }

    async fn discard(&self, session: Session) {
        if let Err(err) = self.end_session(session).await {
            warn!(error = %err, "could not release tool server session");
        }
    }

    async fn call(
        &self,
        session_id: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let (_, response) = self.post(session_id, &body).await?;
        let response =
            response.ok_or_else(|| BackendError::Malformed(format!("no response to {method}")))?;
        rpc_result(response, id)
    }

    async fn post(
        &self,
        session_id: Option<&str>,
        body: &Value,
    ) -> Result<(HeaderMap, Option<RpcResponse>), BackendError> {
        debug!(url = %self.url, %body, "mcp request");
        let mut request = self
            .client
            .post(&self.url)
            .header(ACCEPT, format!("application/json, {EVENT_STREAM}"))
            .json(body);
        if let Some(session_id) = session_id {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let is_stream = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with(EVENT_STREAM));
        let wanted = body.get("id");
        let response = if is_stream {
            parse_event_stream(&text, wanted)?
        } else if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text)?)
        };
        Ok((headers, response))
    }
}

fn rpc_result(response: RpcResponse, id: u64) -> Result<Value, BackendError> {
    if response.id.as_ref().and_then(Value::as_u64) != Some(id) {
        warn!(expected = id, got = ?response.id, "response id mismatch");
    }
    if let Some(error) = response.error {
        return Err(BackendError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    response
        .result
        .ok_or_else(|| BackendError::Malformed("response has neither result nor error".to_string()))
}

/// Picks the JSON-RPC response out of an event stream body. Server
/// notifications that share the stream are skipped.
fn parse_event_stream(
    text: &str,
    wanted: Option<&Value>,
) -> Result<Option<RpcResponse>, BackendError> {
    let normalized = text.replace("\r\n", "\n");
    for event in normalized.split("\n\n") {
        let data = event
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| data.strip_prefix(' ').unwrap_or(data))
            .collect::<Vec<_>>()
            .join("\n");
        if data.is_empty() {
            continue;
        }
        let message: Value = serde_json::from_str(&data)?;
        if wanted.is_some() && message.get("id") == wanted {
            return Ok(Some(serde_json::from_value(message)?));
        }
        debug!(%message, "skipping server message");
    }
    Ok(None)
}

#[async_trait]
impl ToolBackend for McpHttpBackend {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, BackendError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let page: ListToolsPage = self.request("tools/list", params).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, BackendError> {
        self.request(
            "tools/call",
            json!({
                "name": name,
                "arguments": arguments,
            }),
        )
        .await
    }

    async fn close(&self) -> Result<(), BackendError> {
        let session = self.session.lock().await.take();
        match session {
            Some(session) => self.end_session(session).await,
            None => Ok(()),
        }
    }
}
