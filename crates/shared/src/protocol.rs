use serde::{Deserialize, Serialize};

use crate::domain::Persona;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    pub persona: Persona,
}

/// Body returned by `POST /speak`. The backend sends `audio_url` (usually
/// together with the generated `text`) or a plain `reply`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakReply {
    Audio {
        audio_url: String,
        transcript: Option<String>,
    },
    Text(String),
    Unrecognized,
}

impl From<SpeakResponse> for SpeakReply {
    fn from(value: SpeakResponse) -> Self {
        let non_empty = |field: Option<String>| field.filter(|v| !v.is_empty());

        if let Some(audio_url) = non_empty(value.audio_url) {
            return SpeakReply::Audio {
                audio_url,
                transcript: non_empty(value.text),
            };
        }
        match non_empty(value.reply) {
            Some(reply) => SpeakReply::Text(reply),
            None => SpeakReply::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// Error payloads use either FastAPI's `detail` or the speak route's `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn parse(raw: &str) -> Option<String> {
        let body: ErrorBody = serde_json::from_str(raw).ok()?;
        body.detail
            .or(body.error)
            .filter(|message| !message.trim().is_empty())
    }
}
