//! Error types for value operations, marshalling and dispatch.

use sciter_sys::{HV_BAD_PARAMETER, HV_INCOMPATIBLE_TYPE, HV_OK, HV_OK_TRUE, VALUE_RESULT};
use thiserror::Error;

/// Result type alias for sciter operations
pub type SciterResult<T> = Result<T, SciterError>;

/// Errors raised by the bindings
#[derive(Debug, Error)]
pub enum SciterError {
    /// The engine rejected an argument (`HV_BAD_PARAMETER`)
    #[error("Bad parameter in {operation}")]
    BadParameter { operation: &'static str },

    /// The operation does not apply to the value's type (`HV_INCOMPATIBLE_TYPE`)
    #[error("Incompatible type in {operation}")]
    IncompatibleType { operation: &'static str },

    /// Array index outside `0..len` after negative-index normalization
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: isize, len: usize },

    /// Map lookup found nothing
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Host-side type mismatch
    #[error("Type error: expected {expected}, got {actual}")]
    TypeError { expected: String, actual: String },

    /// The engine failed while running a script
    #[error("ScriptError: {message}")]
    ScriptError {
        message: String,
        script: Option<String>,
    },

    /// The script itself threw or returned an error value
    #[error("ScriptException: {message}")]
    ScriptException {
        message: String,
        script: Option<String>,
    },

    /// A host handler failed while serving a script call
    #[error("Handler '{handler}' failed: {message}")]
    HandlerException { handler: String, message: String },

    /// A host callable or handler reported a failure
    #[error("{0}")]
    Host(String),

    /// The engine invoked a functor after releasing it
    #[error("Native functor {0} has been released")]
    FunctorReleased(u64),

    /// A different value function table was installed first
    #[error("A different value API table is already installed")]
    ApiAlreadyInstalled,

    /// Loading the engine library failed
    #[error("Library error: {0}")]
    Library(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Normalize engine error text: carriage returns become newlines and
/// trailing whitespace is dropped.
fn normalize_message(message: &str) -> String {
    message.replace('\r', "\n").trim_end().to_string()
}

impl SciterError {
    /// Create an engine-side script failure
    pub fn script_error(message: impl AsRef<str>, script: Option<String>) -> Self {
        Self::ScriptError {
            message: normalize_message(message.as_ref()),
            script,
        }
    }

    /// Create a script exception
    pub fn script_exception(message: impl AsRef<str>, script: Option<String>) -> Self {
        Self::ScriptException {
            message: normalize_message(message.as_ref()),
            script,
        }
    }

    /// Create a handler failure
    pub fn handler(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerException {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Create a host failure, for use in callables and handlers
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    /// Create a type error
    pub fn type_error(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Map a non-success result code to an error
    pub fn from_code(code: VALUE_RESULT, operation: &'static str) -> Option<Self> {
        match code {
            HV_OK | HV_OK_TRUE => None,
            HV_INCOMPATIBLE_TYPE => Some(Self::IncompatibleType { operation }),
            HV_BAD_PARAMETER => Some(Self::BadParameter { operation }),
            // unknown failure codes are treated as bad parameters
            _ => Some(Self::BadParameter { operation }),
        }
    }

    /// Check if this error came from script code
    pub fn is_script_error(&self) -> bool {
        matches!(
            self,
            Self::ScriptError { .. } | Self::ScriptException { .. }
        )
    }

    /// The message without the kind prefix
    pub fn message(&self) -> String {
        match self {
            Self::ScriptError { message, .. }
            | Self::ScriptException { message, .. }
            | Self::HandlerException { message, .. }
            | Self::Host(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Get the error kind name (e.g., "ScriptError", "KeyError")
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BadParameter { .. } => "BadParameter",
            Self::IncompatibleType { .. } => "IncompatibleType",
            Self::IndexOutOfRange { .. } => "IndexError",
            Self::KeyNotFound(_) => "KeyError",
            Self::TypeError { .. } => "TypeError",
            Self::ScriptError { .. } => "ScriptError",
            Self::ScriptException { .. } => "ScriptException",
            Self::HandlerException { .. } => "HandlerException",
            Self::Host(_) => "Error",
            Self::FunctorReleased(_) => "FunctorReleased",
            Self::ApiAlreadyInstalled => "ApiError",
            Self::Library(_) => "LibraryError",
            Self::Config(_) => "ConfigError",
            Self::Json(_) => "JsonError",
            Self::Io(_) => "IoError",
        }
    }
}

/// Turn a table result code into a `Result`
pub(crate) fn check(code: VALUE_RESULT, operation: &'static str) -> SciterResult<()> {
    match SciterError::from_code(code, operation) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_codes() {
        assert!(check(HV_OK, "op").is_ok());
        assert!(check(HV_OK_TRUE, "op").is_ok());
        assert!(matches!(
            check(HV_INCOMPATIBLE_TYPE, "ValueIntData"),
            Err(SciterError::IncompatibleType { operation: "ValueIntData" })
        ));
        assert!(matches!(
            check(HV_BAD_PARAMETER, "ValueCopy"),
            Err(SciterError::BadParameter { .. })
        ));
    }

    #[test]
    fn test_script_error_message_is_normalized() {
        let err = SciterError::script_error("line one\rline two\r\n  ", Some("f".into()));
        assert_eq!(err.message(), "line one\nline two");
        assert!(err.is_script_error());
        assert_eq!(err.error_type(), "ScriptError");
        assert_eq!(err.to_string(), "ScriptError: line one\nline two");
    }

    #[test]
    fn test_handler_error_display() {
        let err = SciterError::handler("sumall", "boom");
        assert_eq!(err.to_string(), "Handler 'sumall' failed: boom");
        assert_eq!(err.message(), "boom");
        assert!(!err.is_script_error());
    }

    #[test]
    fn test_type_error() {
        let err = SciterError::type_error("array", "int");
        assert!(err.to_string().contains("expected array"));
        assert_eq!(err.error_type(), "TypeError");
    }
}
