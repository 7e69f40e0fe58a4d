//! Client side of the Yuna voice/text chat: session handling, the chat
//! send/response lifecycle, the auth form and speech input glue.
//!
//! Front ends provide a [`ChatView`] and wire things together roughly as:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use client_core::{
//!     ChatDispatcher, DispatchOrigin, FileTokenStore, SessionManager, Settings, Transcript,
//! };
//!
//! # async fn example() {
//! let settings = Settings::default();
//! let session = SessionManager::new(
//!     settings.auth_base_url.clone(),
//!     Arc::new(FileTokenStore::new(&settings.token_path)),
//! );
//! let view = Arc::new(Transcript::new());
//! let chat = ChatDispatcher::from_settings(session, view, &settings);
//! if let Some(pending) = chat.dispatch("hello", DispatchOrigin::Typed) {
//!     pending.finished().await;
//! }
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod session;
pub mod speech;
pub mod token_store;
pub mod view;

pub use auth::{AuthClient, AuthForm, AuthMode, AuthOutcome};
pub use config::{load_settings, Settings};
pub use dispatcher::{ChatDispatcher, DispatchHandle, DispatchOrigin, DispatchOutcome};
pub use session::{ChatGate, SessionEvent, SessionManager, SessionState};
pub use speech::{SpeechBridge, SpeechEngine, SpeechEvent};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use view::{ChatView, Transcript};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
