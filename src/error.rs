use thiserror::Error;

use crate::tms::mapping::ValidationIssues;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Descriptor error: {0}")]
    Descriptor(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("unexpected positive HTTP status code {got}, while it was expected {expected}")]
    UnexpectedStatus { got: u16, expected: u16 },

    #[error("Remote operation failed: {0}")]
    RemoteOperation(String),

    #[error("Remote operation timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Validation(ValidationIssues),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Descriptor(_) => "DESCRIPTOR_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            Error::RemoteOperation(_) => "REMOTE_OPERATION_FAILED",
            Error::Timeout(_) => "TIMEOUT",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
        }
    }

    /// True for the poller's distinct timeout outcome, which callers may
    /// treat as possibly-still-in-progress rather than failed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_status_mentions_both_codes() {
        let err = Error::UnexpectedStatus {
            got: 202,
            expected: 201,
        };
        let msg = err.to_string();
        assert!(msg.contains("202"));
        assert!(msg.contains("201"));
        assert_eq!(err.code(), "UNEXPECTED_STATUS");
    }

    #[test]
    fn timeout_is_distinguishable_from_remote_failure() {
        assert!(Error::Timeout("tag".into()).is_timeout());
        assert!(!Error::RemoteOperation("tag".into()).is_timeout());
    }
}
