//! Chat send/response lifecycle: user message, placeholder, reply.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, RwLock, Weak,
};

use reqwest::Method;
use shared::{
    domain::{MessageId, Persona, Sender},
    error::{ClientError, ErrorCode},
    protocol::{SpeakReply, SpeakRequest, SpeakResponse},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    config::Settings,
    session::{ChatGate, SessionManager, SESSION_EXPIRED_MESSAGE},
    view::ChatView,
};

pub const THINKING_TEXT: &str = "Thinking...";
pub const AUDIO_LABEL: &str = "Yuna says:";
pub const NO_RESPONSE_NOTICE: &str = "No response from backend.";
pub const REQUEST_FAILED_NOTICE: &str = "Error: Could not process request.";
pub const BACKEND_ERROR_NOTICE: &str = "Backend error. Try again.";
pub const LOGIN_REQUIRED_NOTICE: &str = "Please login first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOrigin {
    Typed,
    /// The transcript was already echoed as a user message.
    Voice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed(SpeakReply),
    Failed(ClientError),
    /// The chat was reset before the reply arrived; nothing was rendered.
    Cancelled,
}

/// One in-flight dispatch and the placeholder it owns.
pub struct DispatchHandle {
    pub user_message: Option<MessageId>,
    pub placeholder: MessageId,
    task: JoinHandle<DispatchOutcome>,
}

impl DispatchHandle {
    pub async fn finished(self) -> DispatchOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "dispatch task did not complete");
                DispatchOutcome::Cancelled
            }
        }
    }
}

/// Posts `request` to `{backend_base_url}/speak` with the session's token.
pub async fn speak(
    session: &SessionManager,
    backend_base_url: &str,
    request: &SpeakRequest,
) -> Result<SpeakReply, ClientError> {
    let response: SpeakResponse = session
        .authorized_request(
            Method::POST,
            &format!("{backend_base_url}/speak"),
            Some(request),
        )
        .await?;
    Ok(response.into())
}

pub struct ChatDispatcher {
    session: Arc<SessionManager>,
    view: Arc<dyn ChatView>,
    backend_base_url: String,
    persona: RwLock<Persona>,
    locked: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl ChatDispatcher {
    /// Builds the dispatcher and registers it as a gate on `session`, which
    /// immediately locks or unlocks it according to the current state.
    pub fn new(
        session: Arc<SessionManager>,
        view: Arc<dyn ChatView>,
        backend_base_url: impl Into<String>,
        persona: Persona,
    ) -> Arc<Self> {
        let dispatcher = Arc::new(Self {
            session: Arc::clone(&session),
            view,
            backend_base_url: backend_base_url.into(),
            persona: RwLock::new(persona),
            locked: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        });
        session.attach_gate(Arc::downgrade(&dispatcher) as Weak<dyn ChatGate>);
        dispatcher
    }

    pub fn from_settings(
        session: Arc<SessionManager>,
        view: Arc<dyn ChatView>,
        settings: &Settings,
    ) -> Arc<Self> {
        Self::new(
            session,
            view,
            settings.backend_base_url.clone(),
            settings.default_persona.clone(),
        )
    }

    pub fn persona(&self) -> Persona {
        match self.persona.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn select_persona(&self, name: &str) -> Persona {
        let persona = Persona::new(name);
        if !persona.is_known() {
            debug!(persona = %persona, "persona not in the known list; backend will fall back");
        }
        match self.persona.write() {
            Ok(mut guard) => *guard = persona.clone(),
            Err(poisoned) => *poisoned.into_inner() = persona.clone(),
        }
        persona
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn dispatch(&self, text: &str, origin: DispatchOrigin) -> Option<DispatchHandle> {
        self.dispatch_with_persona(text, origin, None)
    }

    /// Renders the user message and placeholder synchronously, then sends the
    /// request on a spawned task. Returns `None` when nothing was sent.
    ///
    /// Must be called from within a Tokio runtime; the request runs on
    /// `tokio::spawn`. The same holds for [`dispatch`](Self::dispatch) and
    /// [`on_transcript`](Self::on_transcript).
    pub fn dispatch_with_persona(
        &self,
        text: &str,
        origin: DispatchOrigin,
        persona: Option<Persona>,
    ) -> Option<DispatchHandle> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if !self.session.is_logged_in() {
            self.view.notify(LOGIN_REQUIRED_NOTICE);
            return None;
        }

        let user_message = match origin {
            DispatchOrigin::Typed => Some(self.view.append_message(Sender::User, text)),
            DispatchOrigin::Voice => None,
        };
        let placeholder = self.view.append_message(Sender::Bot, THINKING_TEXT);

        let request = SpeakRequest {
            text: text.to_string(),
            persona: persona.unwrap_or_else(|| self.persona()),
        };
        let cancel = self.child_token();
        let session = Arc::clone(&self.session);
        let view = Arc::clone(&self.view);
        let base_url = self.backend_base_url.clone();

        debug!(placeholder = placeholder.0, persona = %request.persona, "dispatching chat message");
        let task = tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => None,
                result = speak(&session, &base_url, &request) => Some(result),
            };
            match result {
                Some(result) if !cancel.is_cancelled() => {
                    render_result(view.as_ref(), placeholder, &base_url, result)
                }
                _ => {
                    debug!(placeholder = placeholder.0, "dispatch cancelled by chat reset");
                    DispatchOutcome::Cancelled
                }
            }
        });

        Some(DispatchHandle {
            user_message,
            placeholder,
            task,
        })
    }

    /// A speech result: echoed as a user message, then sent.
    pub fn on_transcript(&self, transcript: &str) -> Option<DispatchHandle> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return None;
        }
        if !self.session.is_logged_in() {
            self.view.notify(LOGIN_REQUIRED_NOTICE);
            return None;
        }
        self.view.append_message(Sender::User, transcript);
        self.dispatch(transcript, DispatchOrigin::Voice)
    }

    /// Clears the chat log and cancels every in-flight dispatch so a late
    /// reply cannot touch a removed placeholder.
    pub fn reset(&self) {
        let previous = match self.cancel.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, CancellationToken::new()),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), CancellationToken::new()),
        };
        previous.cancel();
        self.view.clear();
    }

    fn child_token(&self) -> CancellationToken {
        match self.cancel.lock() {
            Ok(guard) => guard.child_token(),
            Err(poisoned) => poisoned.into_inner().child_token(),
        }
    }
}

impl ChatGate for ChatDispatcher {
    fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
        self.view.set_controls_enabled(false);
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
        self.view.set_controls_enabled(true);
    }

    fn notify(&self, text: &str) {
        self.view.notify(text);
    }
}

fn render_result(
    view: &dyn ChatView,
    placeholder: MessageId,
    base_url: &str,
    result: Result<SpeakReply, ClientError>,
) -> DispatchOutcome {
    match result {
        Ok(reply) => {
            match &reply {
                SpeakReply::Audio { audio_url, .. } => {
                    view.update_message(placeholder, AUDIO_LABEL);
                    view.append_audio(&format!("{base_url}{audio_url}"));
                }
                SpeakReply::Text(text) => view.update_message(placeholder, text),
                SpeakReply::Unrecognized => view.update_message(placeholder, NO_RESPONSE_NOTICE),
            }
            DispatchOutcome::Completed(reply)
        }
        Err(err) => {
            let code = err.code();
            let notice = if err.requires_reauth() {
                warn!(?code, error = %err, "chat request rejected; session was reset");
                SESSION_EXPIRED_MESSAGE
            } else if code == ErrorCode::Http {
                error!(?code, error = %err, "chat request failed");
                REQUEST_FAILED_NOTICE
            } else {
                error!(?code, error = %err, "chat error");
                BACKEND_ERROR_NOTICE
            };
            view.update_message(placeholder, notice);
            DispatchOutcome::Failed(err)
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
