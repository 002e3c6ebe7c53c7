//! Application-wide error types.
//!
//! `AppError` covers startup and channel lifecycle. Per-message failures never
//! surface here; the session controller turns them into replies.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("content error: {0}")]
    Content(String),

    #[error("comms error: {0}")]
    Comms(String),
}
