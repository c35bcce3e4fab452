//! In-process dashboard server for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::broadcast;

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "alice-token";

/// Frame queued for every connected push socket
#[derive(Debug, Clone)]
pub enum Outbound {
    Text(String),
    Close,
}

pub struct ServerState {
    pub private: Mutex<Value>,
    pub public: Mutex<Value>,
    pub saves: Mutex<Vec<Value>>,
    pub session_ids: Mutex<Vec<String>>,
    pub push_messages: Mutex<Vec<Value>>,
    pub connections: AtomicUsize,
    outbound: broadcast::Sender<Outbound>,
}

impl ServerState {
    fn new() -> Arc<Self> {
        let (outbound, _) = broadcast::channel(64);
        Arc::new(Self {
            private: Mutex::new(json!({"groups": [], "widgets": []})),
            public: Mutex::new(json!({"groups": [], "widgets": []})),
            saves: Mutex::new(Vec::new()),
            session_ids: Mutex::new(Vec::new()),
            push_messages: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            outbound,
        })
    }

    /// Send a JSON message to every push socket
    pub fn push(&self, message: Value) {
        let _ = self.outbound.send(Outbound::Text(message.to_string()));
    }

    /// Close every push socket
    pub fn kick(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Push messages received so far with the given `type`
    pub fn received(&self, kind: &str) -> Vec<Value> {
        self.push_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m["type"] == kind)
            .cloned()
            .collect()
    }

    pub fn private_has_group(&self, id: &str) -> bool {
        self.private.lock().unwrap()["groups"]
            .as_array()
            .is_some_and(|groups| groups.iter().any(|g| g["id"] == id))
    }
}

pub struct TestServer {
    pub base_url: String,
    pub ws_url: String,
    pub state: Arc<ServerState>,
}

/// Start a server on an ephemeral port
pub async fn spawn() -> TestServer {
    let state = ServerState::new();
    let router = Router::new()
        .route("/api/data", get(get_data))
        .route("/api/save", post(save))
        .route("/api/login", post(login))
        .route("/api/register", post(register))
        .route("/api/ws", get(ws_upgrade))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        ws_url: format!("ws://{}/api/ws", addr),
        state,
    }
}

/// Poll `condition` until it holds, failing after five seconds
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Condition not met within 5s");
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn record_session(state: &ServerState, headers: &HeaderMap) {
    if let Some(id) = headers.get("x-session-id").and_then(|v| v.to_str().ok()) {
        state.session_ids.lock().unwrap().push(id.to_string());
    }
}

async fn get_data(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    record_session(&state, &headers);
    let signed_in = bearer(&headers) == Some(TOKEN);

    let mut body = if signed_in {
        state.private.lock().unwrap().clone()
    } else {
        state.public.lock().unwrap().clone()
    };
    if let Some(object) = body.as_object_mut() {
        if signed_in {
            object.insert("username".to_string(), json!(USERNAME));
        }
        object.insert("isAdmin".to_string(), json!(false));
        object.insert("mode".to_string(), json!("multi"));
    }
    Json(body).into_response()
}

async fn save(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record_session(&state, &headers);
    if bearer(&headers) != Some(TOKEN) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    state.saves.lock().unwrap().push(body.clone());
    let mut snapshot = body;
    if let Some(object) = snapshot.as_object_mut() {
        object.remove("newPassword");
    }
    *state.private.lock().unwrap() = snapshot;

    state.push(json!({"type": "data_changed", "username": USERNAME}));
    Json(json!({"success": true})).into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["username"] == USERNAME && body["password"] == PASSWORD {
        Json(json!({"token": TOKEN, "username": USERNAME, "isAdmin": false})).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response()
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    if username == USERNAME {
        return (StatusCode::CONFLICT, "Username taken").into_response();
    }
    Json(json!({
        "token": format!("{}-token", username),
        "username": username,
        "isAdmin": false,
    }))
    .into_response()
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut outbound = state.outbound.subscribe();
    state.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let Ok(value) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let is_ping = value["type"] == "ping";
                    state.push_messages.lock().unwrap().push(value);
                    if is_ping {
                        let pong = json!({"type": "pong"}).to_string();
                        if socket.send(Message::Text(pong)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(_)) => {}
                _ => break,
            },
            message = outbound.recv() => match message {
                Ok(Outbound::Text(text)) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(Outbound::Close) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
