//! `ChatView` that keeps a transcript and echoes every change to stdout.

use client_core::{ChatView, Transcript};
use shared::domain::{MessageId, Sender};

#[derive(Default)]
pub struct TerminalView {
    transcript: Transcript,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }
}

fn speaker(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "you",
        Sender::Bot => "yuna",
    }
}

impl ChatView for TerminalView {
    fn append_message(&self, sender: Sender, text: &str) -> MessageId {
        let id = self.transcript.append_message(sender, text);
        // The user's own line is already on screen.
        if sender == Sender::Bot {
            println!("[{}] {}: {text}", id.0, speaker(sender));
        }
        id
    }

    fn update_message(&self, id: MessageId, text: &str) {
        if self.transcript.message(id).is_none() {
            return;
        }
        self.transcript.update_message(id, text);
        println!("[{}] yuna: {text}", id.0);
    }

    fn append_audio(&self, source: &str) -> MessageId {
        let id = self.transcript.append_audio(source);
        println!("[{}] yuna: (audio) {source}", id.0);
        id
    }

    fn notify(&self, text: &str) {
        self.transcript.notify(text);
        println!("** {text}");
    }

    fn set_controls_enabled(&self, enabled: bool) {
        self.transcript.set_controls_enabled(enabled);
    }

    fn set_record_label(&self, label: &str) {
        self.transcript.set_record_label(label);
        println!("-- {label}");
    }

    fn clear(&self) {
        self.transcript.clear();
        println!("-- chat cleared");
    }
}
