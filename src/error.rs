//! Error types for l10n-sync
//!
//! This module provides the error handling for the library, including:
//! - A single crate-wide [`Error`] enum with contextual variants
//! - Decoding of the REST API's JSON:API error envelope into [`ApiErrorItem`]s
//! - Classification of transport failures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for l10n-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for l10n-sync
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "file_filter")
        key: Option<String>,
    },

    /// Resource identifier could not be parsed
    #[error("invalid resource id '{id}': {reason}")]
    InvalidResourceId {
        /// The identifier as written in the configuration
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// Network error (connection, timeout, TLS, body decoding)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with an error status and (possibly) a JSON:API error envelope
    #[error("API error (HTTP {status}): {}", format_api_errors(.errors))]
    Api {
        /// HTTP status code returned by the server
        status: u16,
        /// Decoded error objects; a single synthetic entry when the body was not decodable
        errors: Vec<ApiErrorItem>,
    },

    /// I/O error with the affected path attached
    #[error("I/O error at {path}: {source}")]
    File {
        /// Path that was being read or written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The selected timestamp source could not produce a time for a local file
    #[error("cannot determine local timestamp for {path}: {reason}")]
    TimestampUnavailable {
        /// The local file in question
        path: PathBuf,
        /// What went wrong (stat failure, no commit history, ...)
        reason: String,
    },

    /// External tool execution failed (git)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Convenience constructor for [`Error::Config`]
    pub fn config(message: impl Into<String>, key: Option<&str>) -> Self {
        Error::Config {
            message: message.into(),
            key: key.map(str::to_string),
        }
    }

    /// Convenience constructor for [`Error::File`]
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }

    /// Whether this error originates from talking to the server
    ///
    /// Transport errors at mapping granularity are subject to the orchestrator's
    /// [`FailurePolicy`](crate::config::FailurePolicy).
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Api { .. })
    }
}

/// One entry of a JSON:API `errors` array
///
/// Used both for HTTP error envelopes and for the per-item errors carried by
/// failed async jobs.
///
/// # Example JSON
///
/// ```json
/// {
///   "status": "404",
///   "code": "not_found",
///   "title": "Object not found",
///   "detail": "Resource o:acme:p:web:r:app does not exist",
///   "source": { "pointer": "/data/relationships/resource" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorItem {
    /// Machine-readable error code (e.g., "not_found", "parse_error")
    #[serde(default)]
    pub code: String,

    /// Human-readable explanation
    #[serde(default)]
    pub detail: String,

    /// HTTP status as a string, when the server provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Short summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Pointer into the request document that caused the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ApiErrorSource>,
}

/// Location of an error inside the request document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorSource {
    /// JSON pointer (e.g., "/data/attributes/content")
    #[serde(default)]
    pub pointer: Option<String>,
}

impl std::fmt::Display for ApiErrorItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code.is_empty(), self.detail.is_empty()) {
            (false, false) => write!(f, "{}: {}", self.code, self.detail),
            (false, true) => write!(f, "{}", self.code),
            (true, false) => write!(f, "{}", self.detail),
            (true, true) => write!(f, "{}", self.title.as_deref().unwrap_or("unknown error")),
        }
    }
}

/// Join API error items into a single line for display
pub(crate) fn format_api_errors(errors: &[ApiErrorItem]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
