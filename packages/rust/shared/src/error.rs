//! Error types for evalcorpus.
//!
//! Library crates use [`EvalCorpusError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all evalcorpus operations.
///
/// Every variant is terminal for a run: nothing retries or recovers
/// partially, and no artifact is considered valid after one is raised.
#[derive(Debug, thiserror::Error)]
pub enum EvalCorpusError {
    /// Corpus selector not offered by the external source.
    #[error("unknown corpus '{corpus}' (supported: {supported})")]
    UnknownCorpus { corpus: String, supported: String },

    /// The external document source could not be reached or answered badly.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// A delimited row with the wrong shape.
    #[error("malformed record in {input} at row {row}: {message}")]
    MalformedRecord {
        input: String,
        row: usize,
        message: String,
    },

    /// A key that must be unique appeared twice.
    #[error("duplicate key '{key}' in {input} at row {row}")]
    DuplicateKey {
        input: String,
        key: String,
        row: usize,
    },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Artifact validation or serialization error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EvalCorpusError>;

impl EvalCorpusError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a malformed-record error for `row` of `input`.
    pub fn malformed(input: impl Into<String>, row: usize, msg: impl Into<String>) -> Self {
        Self::MalformedRecord {
            input: input.into(),
            row,
            message: msg.into(),
        }
    }

    /// Create a duplicate-key error for `key` at `row` of `input`.
    pub fn duplicate(input: impl Into<String>, key: impl Into<String>, row: usize) -> Self {
        Self::DuplicateKey {
            input: input.into(),
            key: key.into(),
            row,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = EvalCorpusError::config("missing [source] section");
        assert_eq!(err.to_string(), "config error: missing [source] section");

        let err = EvalCorpusError::malformed("topics.tsv", 7, "expected 2 fields, got 3");
        assert_eq!(
            err.to_string(),
            "malformed record in topics.tsv at row 7: expected 2 fields, got 3"
        );
    }

    #[test]
    fn duplicate_key_names_identifier() {
        let err = EvalCorpusError::duplicate("dataset.tsv", "doc#12", 40);
        let msg = err.to_string();
        assert!(msg.contains("doc#12"));
        assert!(msg.contains("row 40"));
    }
}
