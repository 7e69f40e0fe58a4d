//! Bearer-token session lifecycle and authorized requests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, Weak,
};

use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{error::ClientError, protocol::ErrorBody};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::token_store::TokenStore;

pub const NO_TOKEN_MESSAGE: &str = "No token found. Please login first.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";
pub const LOGGED_OUT_NOTICE: &str = "Logged out!";
pub const EMPTY_TOKEN_MESSAGE: &str = "Refusing to store an empty token.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
    /// In-memory chat state must be discarded, as after a page reload.
    Reset,
}

/// Input controls that follow the session state.
pub trait ChatGate: Send + Sync {
    fn lock(&self);
    fn unlock(&self);
    fn notify(&self, _text: &str) {}
}

pub struct SessionManager {
    http: Client,
    auth_base_url: String,
    store: Arc<dyn TokenStore>,
    /// Set by `clear_session`; hides a token the store failed to remove.
    revoked: AtomicBool,
    gates: Mutex<Vec<Weak<dyn ChatGate>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(auth_base_url: impl Into<String>, store: Arc<dyn TokenStore>) -> Arc<Self> {
        Self::with_client(Client::new(), auth_base_url, store)
    }

    pub fn with_client(
        http: Client,
        auth_base_url: impl Into<String>,
        store: Arc<dyn TokenStore>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            http,
            auth_base_url: auth_base_url.into(),
            store,
            revoked: AtomicBool::new(false),
            gates: Mutex::new(Vec::new()),
            events,
        })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn auth_base_url(&self) -> &str {
        &self.auth_base_url
    }

    /// Registers a gate and immediately applies the current state to it.
    pub fn attach_gate(&self, gate: Weak<dyn ChatGate>) {
        if let Some(live) = gate.upgrade() {
            if self.is_logged_in() {
                live.unlock();
            } else {
                live.lock();
            }
        }
        if let Ok(mut gates) = self.gates.lock() {
            gates.retain(|g| g.strong_count() > 0);
            gates.push(gate);
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn token(&self) -> Option<String> {
        if self.revoked.load(Ordering::SeqCst) {
            return None;
        }
        self.store.load().filter(|token| !token.trim().is_empty())
    }

    pub fn is_logged_in(&self) -> bool {
        self.token().is_some()
    }

    pub fn state(&self) -> SessionState {
        if self.is_logged_in() {
            SessionState::LoggedIn
        } else {
            SessionState::LoggedOut
        }
    }

    /// Stores `token` and unlocks every gate. Blank tokens are rejected
    /// without touching the store.
    pub fn set_token(&self, token: &str) -> Result<(), ClientError> {
        if token.trim().is_empty() {
            return Err(ClientError::validation(EMPTY_TOKEN_MESSAGE));
        }
        self.store
            .store(token)
            .map_err(|err| ClientError::Storage(err.to_string()))?;
        self.revoked.store(false, Ordering::SeqCst);
        info!("session token stored");
        self.for_each_gate(|gate| gate.unlock());
        let _ = self.events.send(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Drops the token, locks every gate and asks hosts to reset their state.
    pub fn clear_session(&self) {
        self.revoked.store(true, Ordering::SeqCst);
        if let Err(err) = self.store.remove() {
            error!(error = %err, "failed to remove stored token; ignoring it until next login");
        }
        info!("session cleared");
        self.for_each_gate(|gate| gate.lock());
        let _ = self.events.send(SessionEvent::LoggedOut);
        let _ = self.events.send(SessionEvent::Reset);
    }

    pub fn logout(&self) {
        self.for_each_gate(|gate| gate.notify(LOGGED_OUT_NOTICE));
        self.clear_session();
    }

    /// Sends `body` as JSON with the stored bearer token. `endpoint` is either
    /// an absolute URL or a path under the auth base URL.
    ///
    /// A 401 clears the session before the error is returned.
    pub async fn authorized_request<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.token().ok_or_else(|| ClientError::auth(NO_TOKEN_MESSAGE))?;
        let url = self.resolve(endpoint);
        debug!(%method, url = %url, "sending authorized request");

        let mut request = self.http.request(method, &url).bearer_auth(&token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ClientError::transport(err.to_string()))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %url, "server rejected bearer token; clearing session");
            self.clear_session();
            return Err(ClientError::auth(SESSION_EXPIRED_MESSAGE));
        }

        let raw = response
            .text()
            .await
            .map_err(|err| ClientError::transport(err.to_string()))?;

        if !status.is_success() {
            return Err(http_error(status, &raw));
        }

        serde_json::from_str(&raw).map_err(|err| ClientError::transport(err.to_string()))
    }

    fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}{}", self.auth_base_url, endpoint)
        }
    }

    fn for_each_gate(&self, f: impl Fn(&dyn ChatGate)) {
        let live: Vec<Arc<dyn ChatGate>> = match self.gates.lock() {
            Ok(gates) => gates.iter().filter_map(Weak::upgrade).collect(),
            Err(_) => return,
        };
        for gate in live {
            f(gate.as_ref());
        }
    }
}

pub(crate) fn http_error(status: StatusCode, raw: &str) -> ClientError {
    let message = ErrorBody::parse(raw).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    ClientError::Http {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
