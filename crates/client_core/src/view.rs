//! Rendering surface for the chat log and its controls.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use shared::domain::{ChatMessage, MessageId, Sender};

pub const RECORD_IDLE_LABEL: &str = "Start Recording";
pub const RECORD_LISTENING_LABEL: &str = "Listening...";

/// What the dispatcher and session manager need from a front end.
///
/// Implementations must hand out ids that are never reused, including
/// after `clear`, so that an update aimed at a removed entry is a no-op.
pub trait ChatView: Send + Sync {
    fn append_message(&self, sender: Sender, text: &str) -> MessageId;
    /// Replaces the text of an existing entry. Unknown ids are ignored.
    fn update_message(&self, id: MessageId, text: &str);
    fn append_audio(&self, source: &str) -> MessageId;
    /// Blocking-alert equivalent for validation and session notices.
    fn notify(&self, text: &str);
    /// Enables or disables input, send and record controls together.
    fn set_controls_enabled(&self, enabled: bool);
    fn set_record_label(&self, _label: &str) {}
    fn clear(&self);
}

#[derive(Debug)]
struct TranscriptState {
    messages: Vec<ChatMessage>,
    notices: Vec<String>,
    controls_enabled: bool,
    record_label: String,
}

/// In-memory chat log. Used directly by the terminal front end and tests.
#[derive(Debug)]
pub struct Transcript {
    next_id: AtomicU64,
    state: Mutex<TranscriptState>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state: Mutex::new(TranscriptState {
                messages: Vec::new(),
                notices: Vec::new(),
                controls_enabled: true,
                record_label: RECORD_IDLE_LABEL.to_string(),
            }),
        }
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.with_state(|state| state.messages.clone())
    }

    pub fn message(&self, id: MessageId) -> Option<ChatMessage> {
        self.with_state(|state| state.messages.iter().find(|m| m.id == id).cloned())
    }

    pub fn notices(&self) -> Vec<String> {
        self.with_state(|state| state.notices.clone())
    }

    pub fn controls_enabled(&self) -> bool {
        self.with_state(|state| state.controls_enabled)
    }

    pub fn record_label(&self) -> String {
        self.with_state(|state| state.record_label.clone())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut TranscriptState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn allocate_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl ChatView for Transcript {
    fn append_message(&self, sender: Sender, text: &str) -> MessageId {
        let id = self.allocate_id();
        self.with_state(|state| state.messages.push(ChatMessage::new(id, sender, text)));
        id
    }

    fn update_message(&self, id: MessageId, text: &str) {
        self.with_state(|state| {
            if let Some(message) = state.messages.iter_mut().find(|m| m.id == id) {
                message.text = text.to_string();
            }
        });
    }

    fn append_audio(&self, source: &str) -> MessageId {
        let id = self.allocate_id();
        self.with_state(|state| state.messages.push(ChatMessage::audio(id, source)));
        id
    }

    fn notify(&self, text: &str) {
        self.with_state(|state| state.notices.push(text.to_string()));
    }

    fn set_controls_enabled(&self, enabled: bool) {
        self.with_state(|state| state.controls_enabled = enabled);
    }

    fn set_record_label(&self, label: &str) {
        self.with_state(|state| state.record_label = label.to_string());
    }

    fn clear(&self) {
        self.with_state(|state| state.messages.clear());
    }
}
