//! Error types for component-session operations.

/// Failure reported by a component runtime collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
    /// The configuration could not be applied to the component.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The component raised an error while consuming rows.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The component failed to release its resources or produce a result.
    #[error("close failed: {0}")]
    Close(String),
}

/// Error type for session cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad creation input, unknown component name or unusable timeout.
    /// No session is stored when this is returned.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Session id unknown, owned by another tenant, or expired.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Lazy construction of the component failed; the session is gone.
    #[error("Failed to initialize component '{component}': {source}")]
    SessionInitializationFailed {
        component: String,
        #[source]
        source: ComponentError,
    },

    /// The component failed while running a batch; the session is gone.
    #[error("Component '{component}' failed: {source}")]
    RuntimeProcessing {
        component: String,
        #[source]
        source: ComponentError,
    },

    /// The row batch exceeds the configured maximum. The session is untouched.
    #[error("Batch of {size} rows exceeds the maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

impl Error {
    /// Stable machine-readable kind, used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "invalid_configuration",
            Error::SessionNotFound(_) => "session_not_found",
            Error::SessionInitializationFailed { .. } => "session_initialization_failed",
            Error::RuntimeProcessing { .. } => "runtime_processing_error",
            Error::BatchTooLarge { .. } => "batch_too_large",
        }
    }
}

/// Result type for session cache operations.
pub type Result<T> = std::result::Result<T, Error>;
