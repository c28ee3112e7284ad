//! Mock detection backend served over real HTTP
//!
//! Binds 127.0.0.1 on an ephemeral port and serves the four endpoints the
//! client uses. The event stream replays a fixed script of messages on every
//! connection and then closes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted stream message: optional event name and raw data
#[derive(Debug, Clone)]
pub struct ScriptedMessage {
    pub event: Option<String>,
    pub data: String,
}

impl ScriptedMessage {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    pub fn named(event: &str, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.to_string()),
            data: data.into(),
        }
    }
}

#[derive(Default)]
struct MockState {
    cases: Mutex<HashMap<String, Value>>,
    intakes: Mutex<Vec<Value>>,
    script: Mutex<Vec<ScriptedMessage>>,
    stream_status: Mutex<Option<StatusCode>>,
    stream_hits: AtomicUsize,
}

/// Handle to a running mock backend
#[derive(Clone)]
pub struct MockBackend {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockBackend {
    pub fn put_case(&self, case: Value) {
        let id = case["intake_id"].as_str().unwrap_or_default().to_string();
        self.state.cases.lock().unwrap().insert(id, case);
    }

    pub fn set_script(&self, script: Vec<ScriptedMessage>) {
        *self.state.script.lock().unwrap() = script;
    }

    /// Answer the stream endpoint with this status instead of events
    pub fn fail_stream_with(&self, status: StatusCode) {
        *self.state.stream_status.lock().unwrap() = Some(status);
    }

    pub fn intakes(&self) -> Vec<Value> {
        self.state.intakes.lock().unwrap().clone()
    }

    pub fn stream_hits(&self) -> usize {
        self.state.stream_hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_mock_backend() -> MockBackend {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/v1/intake", post(intake))
        .route("/api/v1/cases/:intake_id", get(case))
        .route("/api/v1/share", post(share))
        .route("/api/v1/events/stream", get(stream))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("mock backend address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend {
        base_url: format!("http://{}", addr),
        state,
    }
}

async fn intake(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    state.intakes.lock().unwrap().push(body);

    if text.contains("reject") {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Narrative rejected").into_response();
    }
    if text.contains("anonymous") {
        return Json(json!({"classification": "low"})).into_response();
    }

    Json(json!({
        "intake_id": "abc123",
        "submitted_at": "2024-03-01T10:00:00Z",
        "classification": "high",
        "composite_score": 0.82,
        "summary": "Coordinated amplification"
    }))
    .into_response()
}

async fn case(State(state): State<Arc<MockState>>, Path(intake_id): Path<String>) -> Response {
    match state.cases.lock().unwrap().get(&intake_id) {
        Some(case) => Json(case.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn share(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "package_id": "pkg-1",
        "created_at": "2024-03-01T10:05:00Z",
        "destination": body["destination"],
        "policy_tags": body["policy_tags"],
        "payload": {"intake_id": body["intake_id"]},
        "signature": "sig"
    }))
}

async fn stream(State(state): State<Arc<MockState>>) -> Response {
    state.stream_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(status) = *state.stream_status.lock().unwrap() {
        return status.into_response();
    }

    let script = state.script.lock().unwrap().clone();
    let events = async_stream::stream! {
        for message in script {
            let mut event = Event::default().data(message.data);
            if let Some(name) = message.event {
                event = event.event(name);
            }
            yield Ok::<_, Infallible>(event);
        }
    };

    Sse::new(events).into_response()
}
