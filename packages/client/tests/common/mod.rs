//! In-process fake backend speaking the command/control protocol.

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::mpsc};

use headcon_client::{
    dispatcher::ConsoleLine,
    reconciler::{SessionView, ViewSection},
    session::Presenter,
    transport::ConnectionState,
};

pub struct BackendState {
    /// Every text frame any client sent, in arrival order
    frames: mpsc::UnboundedSender<String>,
    pub config: Mutex<Value>,
    pub world_properties: Mutex<Vec<Value>>,
    pub restarts: AtomicUsize,
    pub friend_requests: Mutex<Vec<String>>,
}

pub struct FakeBackend {
    pub port: u16,
    pub state: Arc<BackendState>,
    pub frames: mpsc::UnboundedReceiver<String>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let state = Arc::new(BackendState {
            frames: frames_tx,
            config: Mutex::new(json!({"worlds": [], "tickRate": 30})),
            world_properties: Mutex::new(Vec::new()),
            restarts: AtomicUsize::new(0),
            friend_requests: Mutex::new(vec![
                "alice".to_string(),
                "bob".to_string(),
                "carol".to_string(),
            ]),
        });

        let app = Router::new()
            .route("/ws", get(websocket_handler))
            .route("/config", get(get_config).post(post_config))
            .route("/api/world-properties", post(post_world_properties))
            .route("/api/restart-container", post(post_restart_container))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            port,
            state,
            frames,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    pub fn http_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Next frame a client sent, as JSON
    pub async fn next_frame(&mut self) -> Value {
        let frame = tokio::time::timeout(std::time::Duration::from_secs(5), self.frames.recv())
            .await
            .expect("Timed out waiting for a client frame")
            .expect("Backend stopped");
        serde_json::from_str(&frame).unwrap()
    }

    /// Skip frames until a command with exactly `text` arrives
    pub async fn wait_for_command(&mut self, text: &str) -> Vec<Value> {
        let mut seen = Vec::new();
        loop {
            let frame = self.next_frame().await;
            let done = frame["type"] == "command" && frame["command"] == text;
            seen.push(frame);
            if done {
                return seen;
            }
        }
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BackendState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<BackendState>) {
    let (mut sender, mut receiver) = socket.split();

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let text = text.to_string();
        let _ = state.frames.send(text.clone());

        let request: Value = serde_json::from_str(&text).unwrap_or_default();
        let replies = match request["type"].as_str() {
            Some("get_status") => vec![json!({
                "type": "status_update",
                "status": {"status": "running", "name": "headless", "cpu_usage": 3.5}
            })],
            Some("get_worlds") => vec![json!({
                "type": "worlds_update",
                "output": [{
                    "sessionId": "S-hub",
                    "name": "Hub",
                    "users": 1,
                    "maxUsers": 16,
                    "users_list": [{"username": "bob", "role": "Guest", "present": true}]
                }]
            })],
            Some("command") => {
                let command = request["command"].as_str().unwrap_or_default().to_string();
                if command == "disconnect" {
                    let _ = sender.send(Message::Close(None)).await;
                    return;
                }
                command_replies(&state, &command)
            }
            _ => vec![json!({"type": "error", "message": "Unknown request"})],
        };

        for reply in replies {
            if sender
                .send(Message::Text(reply.to_string().into()))
                .await
                .is_err()
            {
                return;
            }
        }
    }
}

fn command_replies(state: &BackendState, command: &str) -> Vec<Value> {
    let (verb, argument) = command.split_once(' ').unwrap_or((command, ""));
    match verb {
        "focus" => vec![json!({"type": "focus_ack", "world": argument.parse::<usize>().unwrap_or(0)})],
        "friendRequests" => {
            let requests = state.friend_requests.lock().unwrap();
            let mut output = String::from("Pending friend requests:\n");
            for name in requests.iter() {
                output.push_str(name);
                output.push('\n');
            }
            output.push('>');
            vec![json!({"type": "command_response", "command": "friendRequests", "output": output})]
        }
        "listbans" => vec![json!({
            "type": "bans_update",
            "output": [{"username": "eve", "userId": "U-eve"}]
        })],
        // A denied request stays listed by the host
        "acceptFriendRequest" => {
            state
                .friend_requests
                .lock()
                .unwrap()
                .retain(|name| name != argument);
            vec![json!({"type": "command_response", "command": command, "output": "OK"})]
        }
        _ => vec![json!({"type": "command_response", "command": command, "output": format!("ran {}", command)})],
    }
}

async fn get_config(State(state): State<Arc<BackendState>>) -> Json<Value> {
    Json(state.config.lock().unwrap().clone())
}

async fn post_config(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    if body.get("locked").is_some() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Config is locked"})),
        ));
    }
    *state.config.lock().unwrap() = body;
    Ok(StatusCode::OK)
}

async fn post_world_properties(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> StatusCode {
    state.world_properties.lock().unwrap().push(body);
    StatusCode::OK
}

async fn post_restart_container(State(state): State<Arc<BackendState>>) -> StatusCode {
    state.restarts.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

/// What a presenter was asked to show
#[derive(Debug, Clone, PartialEq)]
pub enum Shown {
    Console(ConsoleLine),
    View(ViewSection, SessionView),
    State(ConnectionState),
}

pub struct ChannelPresenter(pub mpsc::UnboundedSender<Shown>);

impl Presenter for ChannelPresenter {
    fn console(&self, line: &ConsoleLine) {
        let _ = self.0.send(Shown::Console(line.clone()));
    }

    fn view_changed(&self, section: ViewSection, view: &SessionView) {
        let _ = self.0.send(Shown::View(section, view.clone()));
    }

    fn connection_changed(&self, state: ConnectionState) {
        let _ = self.0.send(Shown::State(state));
    }
}

/// Wait until `section` is shown and return that view
pub async fn wait_for_view(
    shown: &mut mpsc::UnboundedReceiver<Shown>,
    section: ViewSection,
) -> SessionView {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while let Some(item) = shown.recv().await {
            if let Shown::View(s, view) = item
                && s == section
            {
                return view;
            }
        }
        panic!("Presenter channel closed");
    })
    .await
    .expect("Timed out waiting for a view update")
}
