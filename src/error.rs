//! Error types for trigport.

use thiserror::Error;

/// The main error type for trigport operations.
///
/// Only [`TriggerError::Parse`] aborts the processing of a trigger; every
/// other degradation in the pipeline is reported as a
/// [`Diagnostic`](crate::diagnostics::Diagnostic) instead.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The trigger text could not be structurally parsed.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A mapping table file could not be read or decoded.
    #[error("Failed to load mapping tables from '{path}': {message}")]
    MappingLoad { path: String, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Re-parsing the Oracle rendering produced a different IR.
    #[error("Round-trip mismatch: {0}")]
    RoundTrip(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A conversion stage panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TriggerError {
    /// Create a parse error at the given line.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create a mapping load error for the given file.
    pub fn mapping(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MappingLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Line number for parse errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Parse { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Result type alias for trigport operations.
pub type TriggerResult<T> = Result<T, TriggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TriggerError::parse(12, "missing END IF");
        assert_eq!(err.to_string(), "Parse error at line 12: missing END IF");
        assert_eq!(err.line(), Some(12));
    }

    #[test]
    fn test_mapping_error_display() {
        let err = TriggerError::mapping("maps.toml", "expected table");
        assert_eq!(
            err.to_string(),
            "Failed to load mapping tables from 'maps.toml': expected table"
        );
        assert_eq!(err.line(), None);
    }
}
