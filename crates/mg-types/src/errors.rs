use thiserror::Error;

/// Main error type for the ModelGrid system
#[derive(Error, Debug)]
pub enum MgError {
    #[error("Missing parameter: {model} requires `{parameter}`")]
    MissingParameter { model: String, parameter: String },

    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Stale reference: path {path:?} no longer resolves in the live model graph")]
    StaleReference { path: Vec<String> },

    #[error("Cycle detected: submodel at {path:?} is one of its own ancestors")]
    CycleDetected { path: Vec<String> },

    #[error("Objective evaluation failed for run {label}: {message}")]
    Objective { label: String, message: String },

    #[error("Model invocation failed: {model}: {message}")]
    Invocation { model: String, message: String },

    #[error("Output location already exists: {path}")]
    AlreadyExists { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl MgError {
    pub fn missing_parameter(model: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::MissingParameter {
            model: model.into(),
            parameter: parameter.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn invocation(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invocation {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Unknown attribute name passed to a concrete model's parameter setter.
    pub fn unknown_parameter(model: &str, parameter: &str) -> Self {
        Self::Validation(format!("{model} has no parameter `{parameter}`"))
    }
}

/// Result type alias for ModelGrid operations
pub type MgResult<T> = Result<T, MgError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::MgError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::MgError::Internal(format!($($arg)*))
    };
}
