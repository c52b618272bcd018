use crate::session::SessionState;

/// Local state machine violations. Rejected operations leave the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("{op} is not allowed while the session is {state}")]
    InvalidTransition {
        op: &'static str,
        state: SessionState,
    },
    #[error("session already holds {cap} shots")]
    CapacityExceeded { cap: usize },
}

/// Failures from the persistence collaborator
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare storage directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },
    #[error("unrecognized {field} value '{value}'")]
    Corrupt { field: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("report is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A config file that exists but cannot be used
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },
}
