//! Stub completion endpoint: an axum app on its own tokio runtime that
//! records every request and answers with the same canned status and body.

#![allow(dead_code)]

use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

pub const COMPLETIONS_PATH: &str = "/api/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct Captured {
    pub headers: HeaderMap,
    pub body: Value,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    body: Arc<str>,
    requests: Arc<Mutex<Vec<Captured>>>,
}

async fn chat_completions(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.requests.lock().unwrap().push(Captured { headers, body });
    (
        state.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.body.to_string(),
    )
}

pub struct Stub {
    pub base_uri: String,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl Stub {
    /// Serves the stub on an ephemeral port. Usable from both plain and
    /// `#[tokio::test]` tests since it never touches the caller's runtime.
    pub fn start(status: u16, body: &str) -> Stub {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            status: StatusCode::from_u16(status).expect("valid status code"),
            body: Arc::from(body),
            requests: Arc::clone(&requests),
        };
        let app = Router::new()
            .route(COMPLETIONS_PATH, post(chat_completions))
            .with_state(state);

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("build stub runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind stub listener");
                tx.send(listener.local_addr().expect("stub address"))
                    .expect("report stub address");
                axum::serve(listener, app).await.expect("serve stub");
            });
        });

        let addr = rx.recv().expect("stub started");
        Stub {
            base_uri: format!("http://{}/api/v1", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}
