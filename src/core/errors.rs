//! RFH-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, RfhError>;

/// Top-level error type for the fault-tolerance harness.
#[derive(Debug, Error)]
pub enum RfhError {
    #[error("[RFH-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[RFH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[RFH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[RFH-2001] unknown node: {id}")]
    UnknownNode { id: String },

    #[error("[RFH-2002] transport failure talking to {endpoint}: {details}")]
    Transport { endpoint: String, details: String },

    #[error("[RFH-2003] malformed response from {endpoint}: {details}")]
    MalformedResponse { endpoint: String, details: String },

    #[error("[RFH-2004] launcher failed to {action}: {details}")]
    Launcher {
        action: String,
        details: String,
    },

    #[error("[RFH-2005] unexpected HTTP {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("[RFH-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[RFH-2201] test case {name} already finished")]
    AlreadyFinished { name: String },

    #[error("[RFH-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[RFH-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl RfhError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "RFH-1001",
            Self::MissingConfig { .. } => "RFH-1002",
            Self::ConfigParse { .. } => "RFH-1003",
            Self::UnknownNode { .. } => "RFH-2001",
            Self::Transport { .. } => "RFH-2002",
            Self::MalformedResponse { .. } => "RFH-2003",
            Self::Launcher { .. } => "RFH-2004",
            Self::UnexpectedStatus { .. } => "RFH-2005",
            Self::Serialization { .. } => "RFH-2101",
            Self::AlreadyFinished { .. } => "RFH-2201",
            Self::Io { .. } => "RFH-3001",
            Self::Runtime { .. } => "RFH-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Launcher { .. } | Self::Io { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for a malformed response body.
    #[must_use]
    pub fn malformed(endpoint: impl Into<String>, details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for RfhError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for RfhError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
