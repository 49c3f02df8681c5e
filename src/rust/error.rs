use std::io;

/// Represents the different types of errors that can occur across the pipeline.
///
/// Every batch stage reports the first fatal error it hits; the inference
/// service maps `ValidationError` to a client error and everything else to a
/// server error for the request that caused it.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// A dataset or artifact file is missing or cannot be parsed
    #[error("Input error: {0}")]
    InputError(String),
    /// Input was rejected before any computation started
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Reading or writing a file failed
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    /// A model artifact is corrupt or was written by an incompatible version
    #[error("Model state error: {0}")]
    ModelStateError(String),
}

impl ClassifierError {
    /// Returns true when the caller can fix the problem by changing its input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ValidationError(_))
    }

    /// Short machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputError(_) => "input_error",
            Self::ValidationError(_) => "validation_error",
            Self::IoError(_) => "io_error",
            Self::ModelStateError(_) => "model_state_error",
        }
    }
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::InputError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ClassifierError {
    fn from(err: serde_yaml::Error) -> Self {
        ClassifierError::InputError(err.to_string())
    }
}

impl From<tempfile::PersistError> for ClassifierError {
    fn from(err: tempfile::PersistError) -> Self {
        ClassifierError::IoError(err.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_validation_is_client_error() {
        assert!(ClassifierError::ValidationError("empty".into()).is_client_error());
        assert!(!ClassifierError::InputError("missing".into()).is_client_error());
        assert!(!ClassifierError::ModelStateError("corrupt".into()).is_client_error());
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(!ClassifierError::from(io_err).is_client_error());
    }

    #[test]
    fn test_display_prefixes() {
        let err = ClassifierError::ValidationError("Input text cannot be empty".into());
        assert_eq!(err.to_string(), "Validation error: Input text cannot be empty");
        assert_eq!(err.kind(), "validation_error");
    }
}
