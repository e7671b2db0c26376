//! Error taxonomy for the sink.
//!
//! Each stage of the per-element protocol has its own error type so callers
//! can decide on retries without string matching. [`SinkError::is_retryable`]
//! is the single place that encodes which failures are safe to retry.

use thiserror::Error;

/// An element's fields could not be turned into parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Field {field} has unsupported type: expected {expected}, found {found}")]
    InvalidType {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Element is not convertible: {0}")]
    Invalid(String),
}

/// Template and binding are inconsistent. Indicates a configuration bug.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Template {template_id} references unbound placeholders: {}", missing.join(", "))]
    MissingParameter {
        template_id: String,
        missing: Vec<String>,
    },

    #[error("Query template is empty")]
    EmptyTemplate,
}

/// A session could not be obtained.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Timed out after {waited_ms}ms waiting for a pooled session")]
    Timeout { waited_ms: u64 },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Session transport failure: {0}")]
    Transport(String),
}

/// The database rejected or failed a statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// Malformed query. Fatal: retrying the same text fails the same way.
    #[error("Query syntax error: {0}")]
    Syntax(String),

    /// Connectivity loss, deadlock, leader switch.
    #[error("Transient execution failure: {0}")]
    Transient(String),

    /// Any other refusal (constraint violation, missing parameter, ...).
    #[error("Query rejected by database: {0}")]
    Rejected(String),
}

impl ExecutionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Failure while opening or closing the connection manager.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("Invalid connection configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot connect to {uri}: {reason}")]
    Connect { uri: String, reason: String },

    #[error("Error while shutting down connections: {0}")]
    Shutdown(String),
}

/// Top-level error type for sink operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Cannot {operation} a sink in state {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

impl SinkError {
    /// Whether repeating the same operation may succeed.
    ///
    /// Session acquisition failures and transient execution failures are
    /// retryable; everything caused by the element or the configuration is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Session(SessionError::PoolClosed) => false,
            Self::Session(_) => true,
            Self::Execution(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// A failed invocation, with enough context for a caller-level retry decision.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Element #{sequence} (template {template_id}): {source}")]
pub struct InvokeError {
    /// 0-based delivery ordinal of the element within its sink instance.
    pub sequence: u64,
    pub template_id: String,
    #[source]
    pub source: SinkError,
}

impl InvokeError {
    pub fn new(sequence: u64, template_id: impl Into<String>, source: impl Into<SinkError>) -> Self {
        Self {
            sequence,
            template_id: template_id.into(),
            source: source.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(SinkError::from(SessionError::Timeout { waited_ms: 10 }).is_retryable());
        assert!(SinkError::from(SessionError::Transport("reset".into())).is_retryable());
        assert!(!SinkError::from(SessionError::PoolClosed).is_retryable());
        assert!(SinkError::from(ExecutionError::Transient("deadlock".into())).is_retryable());
        assert!(!SinkError::from(ExecutionError::Syntax("bad".into())).is_retryable());
        assert!(!SinkError::from(ExecutionError::Rejected("constraint".into())).is_retryable());
        assert!(!SinkError::from(ConversionError::MissingField { field: "name".into() })
            .is_retryable());
        assert!(!SinkError::from(MappingError::EmptyTemplate).is_retryable());
    }

    #[test]
    fn test_invoke_error_display() {
        let err = InvokeError::new(
            7,
            "create-person",
            ConversionError::MissingField { field: "name".into() },
        );
        assert_eq!(
            err.to_string(),
            "Element #7 (template create-person): Conversion error: Missing required field: name"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_parameter_display() {
        let err = MappingError::MissingParameter {
            template_id: "t".into(),
            missing: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "Template t references unbound placeholders: a, b"
        );
    }
}
