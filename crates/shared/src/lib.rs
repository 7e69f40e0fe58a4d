//! Types shared between the chat client and its front ends.

pub mod domain;
pub mod error;
pub mod protocol;
