//! Error types for turberfield-audio
//!
//! Every failure of a loop load ends up in one of these variants, so a
//! caller waiting on a `LoopHandle` always receives a concrete reason.

use thiserror::Error;

/// Main error type for turberfield-audio
///
/// Payloads are plain strings so the error can be cloned into the status
/// channel of every handle that observes it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Settings file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request never produced a response (connect failure, timeout)
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status
    #[error("Request for {url} failed with status {status}")]
    Transport { status: u16, url: String },

    /// The payload could not be decoded into audio
    #[error("Error with decoding audio data: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// No usable audio host or async runtime is available
    #[error("Unsupported environment: {0}")]
    Unsupported(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The load was cancelled before it completed
    #[error("Load cancelled")]
    Cancelled,

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Error::Transport {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => Error::Request(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Convenience Result type using the crate Error
pub type Result<T> = std::result::Result<T, Error>;
