//! Error types for the interception transport, mode switches and cassettes.

use std::path::PathBuf;

/// Failure of a single round trip. None of these are fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("gmeter is not initialized, please call /gmeter/record or /gmeter/play first")]
    NotInitialized,

    #[error("track not found for request: {dump}")]
    UnmatchedPlayback {
        method: http::Method,
        url: String,
        dump: String,
    },

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error(transparent)]
    Cassette(#[from] CassetteError),

    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Whether the upstream call ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Upstream(e) if e.is_timeout())
    }
}

/// Failure of a mode switch. The active mode is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    #[error("bad switch request: {0}")]
    BadSwitchRequest(String),

    #[error(transparent)]
    Cassette(#[from] CassetteError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Cassette persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum CassetteError {
    #[error("failed to access cassette {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cassette {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode cassette {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored interaction is invalid: {0}")]
    InvalidInteraction(String),
}
