use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};

use axum::http::StatusCode as MockStatus;
use serde_json::{json, Value};

use crate::{
    test_support::{unreachable_url, MockBackend, Scripted},
    token_store::{MemoryTokenStore, TokenStoreError},
};

/// Holds a token it can never delete.
struct StickyStore {
    inner: MemoryTokenStore,
}

impl TokenStore for StickyStore {
    fn load(&self) -> Option<String> {
        self.inner.load()
    }

    fn store(&self, token: &str) -> Result<(), TokenStoreError> {
        self.inner.store(token)
    }

    fn remove(&self) -> Result<(), TokenStoreError> {
        Err(TokenStoreError::Io {
            path: "token".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

#[derive(Default)]
struct CountingGate {
    locks: AtomicUsize,
    unlocks: AtomicUsize,
    notices: Mutex<Vec<String>>,
}

impl ChatGate for CountingGate {
    fn lock(&self) {
        self.locks.fetch_add(1, Ordering::SeqCst);
    }

    fn unlock(&self) {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
    }

    fn notify(&self, text: &str) {
        self.notices.lock().expect("notices").push(text.to_string());
    }
}

fn logged_in(base_url: &str) -> Arc<SessionManager> {
    SessionManager::new(base_url, Arc::new(MemoryTokenStore::with_token("tok-123")))
}

#[tokio::test]
async fn initial_state_follows_stored_token() {
    let out = SessionManager::new("http://localhost:8000", Arc::new(MemoryTokenStore::new()));
    assert_eq!(out.state(), SessionState::LoggedOut);
    assert!(!out.is_logged_in());

    let blank = SessionManager::new(
        "http://localhost:8000",
        Arc::new(MemoryTokenStore::with_token("")),
    );
    assert!(!blank.is_logged_in());

    let session = logged_in("http://localhost:8000");
    assert_eq!(session.state(), SessionState::LoggedIn);
    assert_eq!(session.token().as_deref(), Some("tok-123"));
}

#[tokio::test]
async fn set_token_unlocks_and_publishes() {
    let session = SessionManager::new("http://localhost:8000", Arc::new(MemoryTokenStore::new()));
    let gate = Arc::new(CountingGate::default());
    session.attach_gate(Arc::downgrade(&gate) as Weak<dyn ChatGate>);
    assert_eq!(gate.locks.load(Ordering::SeqCst), 1);

    let mut events = session.subscribe_events();
    session.set_token("fresh").expect("store");

    assert!(session.is_logged_in());
    assert_eq!(gate.unlocks.load(Ordering::SeqCst), 1);
    assert_eq!(events.recv().await.expect("event"), SessionEvent::LoggedIn);
}

#[tokio::test]
async fn blank_token_is_rejected_without_unlocking() {
    let session = SessionManager::new("http://localhost:8000", Arc::new(MemoryTokenStore::new()));
    let gate = Arc::new(CountingGate::default());
    session.attach_gate(Arc::downgrade(&gate) as Weak<dyn ChatGate>);
    let mut events = session.subscribe_events();

    for blank in ["", "  \n"] {
        let err = session.set_token(blank).expect_err("blank token");
        assert_eq!(err, ClientError::validation(EMPTY_TOKEN_MESSAGE));
    }

    assert!(!session.is_logged_in());
    assert_eq!(gate.unlocks.load(Ordering::SeqCst), 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn clear_session_logs_out_even_if_token_cannot_be_removed() {
    let session = SessionManager::new(
        "http://localhost:8000",
        Arc::new(StickyStore {
            inner: MemoryTokenStore::with_token("stale"),
        }),
    );
    let gate = Arc::new(CountingGate::default());
    session.attach_gate(Arc::downgrade(&gate) as Weak<dyn ChatGate>);

    session.clear_session();

    assert!(!session.is_logged_in());
    assert_eq!(session.token(), None);
    assert_eq!(gate.locks.load(Ordering::SeqCst), 1);
    let err = session
        .authorized_request::<Value, Value>(Method::GET, "/me", None)
        .await
        .expect_err("no token");
    assert_eq!(err, ClientError::auth(NO_TOKEN_MESSAGE));

    session.set_token("fresh").expect("store");
    assert_eq!(session.token().as_deref(), Some("fresh"));
    assert_eq!(gate.unlocks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn logout_notifies_then_resets() {
    let session = logged_in("http://localhost:8000");
    let gate = Arc::new(CountingGate::default());
    session.attach_gate(Arc::downgrade(&gate) as Weak<dyn ChatGate>);
    let mut events = session.subscribe_events();

    session.logout();

    assert!(!session.is_logged_in());
    assert_eq!(
        gate.notices.lock().expect("notices").as_slice(),
        [LOGGED_OUT_NOTICE.to_string()]
    );
    assert_eq!(gate.locks.load(Ordering::SeqCst), 1);
    assert_eq!(events.recv().await.expect("event"), SessionEvent::LoggedOut);
    assert_eq!(events.recv().await.expect("event"), SessionEvent::Reset);
}

#[tokio::test]
async fn authorized_request_without_token_sends_nothing() {
    let backend = MockBackend::spawn(vec![]).await.expect("spawn backend");
    let session = SessionManager::new(backend.url.clone(), Arc::new(MemoryTokenStore::new()));

    let err = session
        .authorized_request::<Value, Value>(Method::GET, "/me", None)
        .await
        .expect_err("must fail fast");

    assert_eq!(err, ClientError::auth(NO_TOKEN_MESSAGE));
    assert!(backend.requests().await.is_empty());
}

#[tokio::test]
async fn authorized_request_attaches_bearer_and_parses_json() {
    let backend = MockBackend::spawn(vec![Scripted::ok("/me", json!({"email": "a@b.c"}))])
        .await
        .expect("spawn backend");
    let session = logged_in(&backend.url);

    let body: Value = session
        .authorized_request(Method::POST, "/me", Some(&json!({"ping": true})))
        .await
        .expect("request");

    assert_eq!(body["email"], "a@b.c");
    let requests = backend.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer tok-123"));
    assert_eq!(requests[0].body, json!({"ping": true}));
}

#[tokio::test]
async fn unauthorized_response_clears_session() {
    let backend = MockBackend::spawn(vec![Scripted::status(
        "/me",
        MockStatus::UNAUTHORIZED,
        json!({"detail": "Invalid token"}),
    )])
    .await
    .expect("spawn backend");
    let session = logged_in(&backend.url);
    let gate = Arc::new(CountingGate::default());
    session.attach_gate(Arc::downgrade(&gate) as Weak<dyn ChatGate>);
    let mut events = session.subscribe_events();

    let err = session
        .authorized_request::<Value, Value>(Method::GET, "/me", None)
        .await
        .expect_err("must fail");

    assert!(err.requires_reauth());
    assert_eq!(err.to_string(), SESSION_EXPIRED_MESSAGE);
    assert!(!session.is_logged_in());
    assert_eq!(gate.locks.load(Ordering::SeqCst), 1);
    assert_eq!(events.recv().await.expect("event"), SessionEvent::LoggedOut);
    assert_eq!(events.recv().await.expect("event"), SessionEvent::Reset);
}

#[tokio::test]
async fn server_errors_keep_the_session() {
    let backend = MockBackend::spawn(vec![Scripted::status(
        "/speak",
        MockStatus::INTERNAL_SERVER_ERROR,
        json!({"error": "tts failed"}),
    )])
    .await
    .expect("spawn backend");
    let session = logged_in(&backend.url);

    let err = session
        .authorized_request::<Value, Value>(Method::POST, "/speak", Some(&json!({"text": "x"})))
        .await
        .expect_err("must fail");

    assert_eq!(
        err,
        ClientError::Http {
            status: 500,
            message: "tts failed".into()
        }
    );
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn connection_failure_is_a_transport_error() {
    let url = unreachable_url().await.expect("port");
    let session = logged_in(&url);

    let err = session
        .authorized_request::<Value, Value>(Method::GET, "/me", None)
        .await
        .expect_err("must fail");

    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn absolute_endpoints_bypass_the_auth_base() {
    let backend = MockBackend::spawn(vec![Scripted::ok("/speak", json!({"reply": "ok"}))])
        .await
        .expect("spawn backend");
    let session = logged_in("http://auth.invalid");

    let body: Value = session
        .authorized_request(
            Method::POST,
            &format!("{}/speak", backend.url),
            Some(&json!({"text": "hi"})),
        )
        .await
        .expect("request");

    assert_eq!(body["reply"], "ok");
}

#[test]
fn http_error_falls_back_to_reason_phrase() {
    assert_eq!(
        http_error(StatusCode::BAD_GATEWAY, "<html>"),
        ClientError::Http {
            status: 502,
            message: "Bad Gateway".into()
        }
    );
}
