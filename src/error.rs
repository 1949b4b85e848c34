//! Error types for the openapi-intent crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by schema loading and intent resolution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IntentError {
    #[error("failed to load API schema from {}: {reason}", path.display())]
    SchemaLoad { path: PathBuf, reason: String },

    #[error("failed to parse API schema {}", path.display())]
    SchemaParse {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("malformed API schema: {reason}")]
    SchemaShape { reason: String },

    #[error("user input is empty")]
    InvalidInput,

    #[error("text completion failed")]
    Completion(#[source] CompletionError),

    #[error("could not decode completion into an intent match: {raw}")]
    ResponseDecode {
        raw: String,
        #[source]
        source: DecodeError,
    },

    #[error("intent resolution was cancelled")]
    Cancelled,

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("failed to render intent match")]
    Render(#[source] serde_json::Error),
}

impl IntentError {
    /// Whether this error belongs to the schema-loading family.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::SchemaLoad { .. } | Self::SchemaParse { .. } | Self::SchemaShape { .. }
        )
    }
}

/// Failures of the external text-completion service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to read response body")]
    ResponseRead(#[source] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),

    #[error("completion contained no text")]
    EmptyResponse,

    #[error("completion was cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Why a completion's text could not become an `IntentMatch`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("invalid JSON")]
    Json(#[from] serde_json::Error),

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}
