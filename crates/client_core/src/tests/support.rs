//! In-process mock of the speak and auth backend.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

pub(crate) struct Scripted {
    path: String,
    text: Option<String>,
    status: StatusCode,
    body: Value,
    hold: Option<oneshot::Receiver<()>>,
}

impl Scripted {
    pub fn ok(path: &str, body: Value) -> Self {
        Self::status(path, StatusCode::OK, body)
    }

    pub fn status(path: &str, status: StatusCode, body: Value) -> Self {
        Self {
            path: path.to_string(),
            text: None,
            status,
            body,
            hold: None,
        }
    }

    /// Only answer requests whose JSON `text` field equals `text`.
    pub fn for_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    /// Keeps the response back until the returned sender fires.
    pub fn held(mut self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        self.hold = Some(rx);
        (self, tx)
    }

    fn matches(&self, path: &str, body: &Value) -> bool {
        if self.path != path {
            return false;
        }
        match &self.text {
            Some(text) => body.get("text").and_then(Value::as_str) == Some(text.as_str()),
            None => true,
        }
    }
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    scripts: Arc<Mutex<VecDeque<Scripted>>>,
}

pub(crate) struct MockBackend {
    pub url: String,
    state: MockState,
}

impl MockBackend {
    pub async fn spawn(scripts: Vec<Scripted>) -> Result<Self> {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = MockState::default();
        state.scripts.lock().await.extend(scripts);

        let app = Router::new().fallback(handle).with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            url: format!("http://{addr}"),
            state,
        })
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().await.clone()
    }

    pub async fn wait_for_requests(&self, count: usize) -> Vec<RecordedRequest> {
        for _ in 0..200 {
            let requests = self.requests().await;
            if requests.len() >= count {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("backend never received {count} request(s)");
    }
}

async fn handle(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state.requests.lock().await.push(RecordedRequest {
        path: path.clone(),
        authorization,
        body: body.clone(),
    });

    let scripted = {
        let mut scripts = state.scripts.lock().await;
        scripts
            .iter()
            .position(|s| s.matches(&path, &body))
            .and_then(|idx| scripts.remove(idx))
    };

    let Some(scripted) = scripted else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": format!("no script for {path}")})),
        )
            .into_response();
    };

    if let Some(hold) = scripted.hold {
        let _ = hold.await;
    }

    (scripted.status, Json(scripted.body)).into_response()
}

/// A base URL nothing listens on.
pub(crate) async fn unreachable_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}
