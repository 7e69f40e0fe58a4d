//! Glue between an external speech recognizer and the chat dispatcher.
//!
//! Recognition itself (grammars, continuous mode, audio capture) belongs to
//! the engine. This side starts it, relabels the record control and turns
//! the final transcript into a dispatch.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{debug, error};

use crate::{
    dispatcher::{ChatDispatcher, DispatchHandle},
    view::{ChatView, RECORD_IDLE_LABEL, RECORD_LISTENING_LABEL},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Best transcript of a finished utterance.
    Result(String),
    Error(String),
    End,
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

pub struct SpeechBridge {
    engine: Option<Arc<dyn SpeechEngine>>,
    dispatcher: Arc<ChatDispatcher>,
    view: Arc<dyn ChatView>,
}

impl SpeechBridge {
    /// `engine` is `None` when the platform has no recognizer; recording
    /// requests are then ignored.
    pub fn new(
        engine: Option<Arc<dyn SpeechEngine>>,
        dispatcher: Arc<ChatDispatcher>,
        view: Arc<dyn ChatView>,
    ) -> Self {
        Self {
            engine,
            dispatcher,
            view,
        }
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    /// Returns whether the engine was started.
    pub async fn start_recording(&self) -> Result<bool> {
        let Some(engine) = &self.engine else {
            return Ok(false);
        };
        if self.dispatcher.is_locked() {
            debug!("record requested while chat is locked");
            return Ok(false);
        }
        engine.start().await?;
        self.view.set_record_label(RECORD_LISTENING_LABEL);
        Ok(true)
    }

    pub async fn stop_recording(&self) -> Result<()> {
        if let Some(engine) = &self.engine {
            engine.stop().await?;
        }
        Ok(())
    }

    pub fn handle_event(&self, event: SpeechEvent) -> Option<DispatchHandle> {
        match event {
            SpeechEvent::Result(transcript) => self.dispatcher.on_transcript(&transcript),
            SpeechEvent::Error(reason) => {
                error!(reason = %reason, "voice error");
                None
            }
            SpeechEvent::End => {
                self.view.set_record_label(RECORD_IDLE_LABEL);
                None
            }
        }
    }

    /// Consumes engine events until the stream ends.
    pub async fn run<S>(&self, mut events: S)
    where
        S: Stream<Item = SpeechEvent> + Unpin,
    {
        while let Some(event) = events.next().await {
            self.handle_event(event);
        }
    }
}

#[cfg(test)]
#[path = "tests/speech_tests.rs"]
mod tests;
