use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);
    };
}

id_newtype!(MessageId);

pub const DEFAULT_PERSONA: &str = "default";

/// Personas the backend ships prompts for. Anything else is passed through
/// and the backend falls back to its generic assistant prompt.
pub const KNOWN_PERSONAS: &[&str] = &[DEFAULT_PERSONA, "tutor", "friend", "motivator"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Persona(String);

impl Persona {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        KNOWN_PERSONAS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(&self.0))
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self(DEFAULT_PERSONA.to_string())
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(id: MessageId, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id,
            sender,
            text: text.into(),
            audio_ref: None,
            created_at: Utc::now(),
        }
    }

    pub fn audio(id: MessageId, source: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::Bot,
            text: String::new(),
            audio_ref: Some(source.into()),
            created_at: Utc::now(),
        }
    }
}
