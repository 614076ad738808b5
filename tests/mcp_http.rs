mod common;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use common::{ScriptedModel, call};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use toolchat::backend::BackendError;
use toolchat::catalog::ToolCatalog;
use toolchat::model::ModelReply;
use toolchat::{ConversationState, LoopConfig, McpHttpBackend, OrchestrationLoop, ToolBackend};

const SESSION: &str = "session-1";

#[derive(Clone, Default)]
struct ServerState {
    requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
    opened: Arc<AtomicUsize>,
    deleted: Arc<Mutex<Vec<String>>>,
    /// Next request on an open session is answered 404.
    expire: Arc<AtomicBool>,
    reject_initialized: Arc<AtomicBool>,
}

impl ServerState {
    fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }
}

async fn post_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let id = body.get("id").cloned().unwrap_or(Value::Null);
    let session = headers
        .get("mcp-session-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let has_session = session.is_some();
    state.requests.lock().unwrap().push((method.clone(), session));
    if has_session && state.expire.swap(false, Ordering::SeqCst) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match method.as_str() {
        "initialize" => (
            StatusCode::OK,
            [(
                "Mcp-Session-Id",
                format!("session-{}", state.opened.fetch_add(1, Ordering::SeqCst) + 1),
            )],
            Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {"name": "weather", "version": "1.0.0"}
                }
            })),
        )
            .into_response(),
        "notifications/initialized" if state.reject_initialized.load(Ordering::SeqCst) => {
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
        "tools/list" => {
            let result = match body["params"]["cursor"].as_str() {
                None => json!({
                    "tools": [{
                        "name": "calculate_bmi",
                        "description": "Calculate the body mass index.",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "weight_kg": {"type": "number"},
                                "height_m": {"type": "number"}
                            },
                            "required": ["weight_kg", "height_m"]
                        }
                    }],
                    "nextCursor": "page-2"
                }),
                Some(_) => json!({
                    "tools": [{
                        "name": "get_today",
                        "inputSchema": {"type": "object", "properties": {}}
                    }]
                }),
            };
            Json(json!({"jsonrpc": "2.0", "id": id, "result": result})).into_response()
        }
        "tools/call" => match body["params"]["name"].as_str() {
            Some("calculate_bmi") => {
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "content": [{"type": "text", "text": "22.857142857142858"}],
                        "isError": false
                    }
                });
                let stream = format!(
                    "event: message\ndata: {}\n\nevent: message\ndata: {}\n\n",
                    json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {}}),
                    response
                );
                ([(CONTENT_TYPE, "text/event-stream")], stream).into_response()
            }
            Some(name) => Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32602, "message": format!("Unknown tool: {name}")}
            }))
            .into_response(),
            None => StatusCode::BAD_REQUEST.into_response(),
        },
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_handler(State(state): State<ServerState>, headers: HeaderMap) -> StatusCode {
    match headers
        .get("mcp-session-id")
        .and_then(|value| value.to_str().ok())
    {
        Some(session) => {
            state.deleted.lock().unwrap().push(session.to_string());
            StatusCode::OK
        }
        None => StatusCode::BAD_REQUEST,
    }
}

async fn spawn_server(state: ServerState) -> String {
    let app = Router::new()
        .route("/mcp", post(post_handler).delete(delete_handler))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/mcp")
}

#[tokio::test]
async fn lists_every_page_over_one_session() {
    let state = ServerState::default();
    let backend = McpHttpBackend::new(spawn_server(state.clone()).await).unwrap();

    let tools = backend.list_tools().await.unwrap();
    let names: Vec<_> = tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, vec!["calculate_bmi", "get_today"]);
    assert_eq!(tools[1].description, None);

    backend.list_tools().await.unwrap();
    assert_eq!(
        state.methods(),
        vec![
            "initialize",
            "notifications/initialized",
            "tools/list",
            "tools/list",
            "tools/list",
            "tools/list",
        ]
    );
    let requests = state.requests.lock().unwrap();
    assert_eq!(requests[0].1, None);
    assert!(
        requests[1..]
            .iter()
            .all(|(_, session)| session.as_deref() == Some(SESSION))
    );
}

#[tokio::test]
async fn catalog_normalizes_the_listing() {
    let state = ServerState::default();
    let backend = McpHttpBackend::new(spawn_server(state).await).unwrap();
    let tools = ToolCatalog::new(Arc::new(backend)).fetch().await.unwrap();
    assert_eq!(tools[0].description, "Calculate the body mass index.");
    assert_eq!(tools[1].description, "");
}

#[tokio::test]
async fn tool_result_is_read_from_an_event_stream() {
    let state = ServerState::default();
    let backend = McpHttpBackend::new(spawn_server(state).await).unwrap();
    let result = backend
        .call_tool("calculate_bmi", json!({"weight_kg": 70, "height_m": 1.75}))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.first_text(), Some("22.857142857142858"));
}

#[tokio::test]
async fn rpc_error_keeps_the_session() {
    let state = ServerState::default();
    let backend = McpHttpBackend::new(spawn_server(state.clone()).await).unwrap();

    backend.list_tools().await.unwrap();
    let err = backend.call_tool("teleport", json!({})).await.unwrap_err();
    assert!(matches!(err, BackendError::Rpc { code: -32602, .. }));
    backend.list_tools().await.unwrap();
    backend.close().await.unwrap();

    assert_eq!(state.opened.load(Ordering::SeqCst), 1);
    assert_eq!(state.deleted(), vec!["session-1"]);
}

#[tokio::test]
async fn expired_session_is_released_and_reopened() {
    let state = ServerState::default();
    let backend = McpHttpBackend::new(spawn_server(state.clone()).await).unwrap();

    backend.list_tools().await.unwrap();
    state.expire.store(true, Ordering::SeqCst);
    let err = backend.list_tools().await.unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 404, .. }));
    assert_eq!(state.deleted(), vec!["session-1"]);

    backend.list_tools().await.unwrap();
    backend.close().await.unwrap();
    assert_eq!(state.opened.load(Ordering::SeqCst), 2);
    assert_eq!(state.deleted(), vec!["session-1", "session-2"]);
}

#[tokio::test]
async fn failed_handshake_releases_the_new_session() {
    let state = ServerState::default();
    state.reject_initialized.store(true, Ordering::SeqCst);
    let backend = McpHttpBackend::new(spawn_server(state.clone()).await).unwrap();

    let err = backend.list_tools().await.unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 500, .. }));
    assert_eq!(state.opened.load(Ordering::SeqCst), 1);
    assert_eq!(state.deleted(), vec!["session-1"]);

    state.reject_initialized.store(false, Ordering::SeqCst);
    backend.list_tools().await.unwrap();
    backend.close().await.unwrap();
    assert_eq!(state.deleted(), vec!["session-1", "session-2"]);
}

#[tokio::test]
async fn close_ends_the_session() {
    let state = ServerState::default();
    let backend = McpHttpBackend::new(spawn_server(state.clone()).await).unwrap();
    backend.list_tools().await.unwrap();
    backend.close().await.unwrap();
    assert_eq!(state.deleted(), vec![SESSION]);

    // nothing left to release
    backend.close().await.unwrap();
    assert_eq!(state.deleted().len(), 1);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let backend = McpHttpBackend::new(format!("http://{addr}/mcp")).unwrap();
    let err = backend.list_tools().await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)));
}

#[tokio::test]
async fn full_query_over_http() {
    let state = ServerState::default();
    let backend = Arc::new(McpHttpBackend::new(spawn_server(state.clone()).await).unwrap());
    let model = ScriptedModel::new(vec![
        ModelReply::tool_calls(vec![call(
            "call_1",
            "calculate_bmi",
            r#"{"weight_kg": 70, "height_m": 1.75}"#,
        )]),
        ModelReply::text("Your BMI is 22.86."),
    ]);
    let mut lp = OrchestrationLoop::new(model, backend.clone(), LoopConfig::default());

    let outcome = lp
        .process_query(
            &mut ConversationState::default(),
            "what is BMI for 70kg and 1.75m",
        )
        .await
        .unwrap();
    backend.close().await.unwrap();

    assert_eq!(outcome.answer, "Your BMI is 22.86.");
    assert_eq!(outcome.cycles, 2);
    assert_eq!(outcome.transcript[2].content(), Some("22.857142857142858"));
    assert!(state.methods().contains(&"tools/call".to_string()));
    assert_eq!(state.deleted(), vec![SESSION]);
}
