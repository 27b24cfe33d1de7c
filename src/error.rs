//! Error handling types for the tlog relay.
//!
//! Decode failures live next to the codec (`protocol::DecodeError`); this
//! module covers interception and process-level failures.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::protocol::DecodeError;

/// Failure of one interception attempt.
///
/// These abort only the current attempt; the relay keeps running.
#[derive(Debug, Error)]
pub enum InterceptError {
    /// Companion resource unreachable or answered with a non-2xx status
    #[error("failed to fetch {uri}: {reason}")]
    Fetch { uri: String, reason: String },

    /// External verifier exited non-zero (or could not be started)
    #[error("verification of {path} failed: {output}")]
    Verification { path: String, output: String },

    /// The acquired URI cannot be mapped to a companion resource
    #[error("cannot derive companion URI for {uri}: {reason}")]
    CompanionUri { uri: String, reason: String },

    /// Required field missing from the intercepted message
    #[error("message has no {field} field")]
    MissingField { field: &'static str },

    /// Writing the companion artifact failed
    #[error("failed to write {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InterceptError {
    pub fn fetch(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        InterceptError::Fetch {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn verification(path: impl Into<String>, output: impl Into<String>) -> Self {
        InterceptError::Verification {
            path: path.into(),
            output: output.into(),
        }
    }

    pub fn companion_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        InterceptError::CompanionUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}

/// Process-level failures: configuration, child spawn, stdio plumbing.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration file unreadable or invalid
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Child transport could not be started
    #[error("failed to spawn child transport {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Child transport started without a piped stream
    #[error("child transport {stream} was not captured")]
    ChildStream { stream: &'static str },
}

impl RelayError {
    pub fn config(message: impl Into<String>) -> Self {
        RelayError::Config {
            message: message.into(),
        }
    }
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_mentions_uri_and_reason() {
        let error = InterceptError::fetch("https://sigs/debian/stable/InRelease.spicy", "HTTP 404");
        let text = error.to_string();
        assert!(text.contains("InRelease.spicy"), "got: {}", text);
        assert!(text.contains("HTTP 404"), "got: {}", text);
    }

    #[test]
    fn spawn_error_mentions_path() {
        let error = RelayError::Spawn {
            path: PathBuf::from("/usr/lib/apt/methods/https"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(error.to_string().contains("/usr/lib/apt/methods/https"));
    }
}
