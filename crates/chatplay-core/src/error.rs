use thiserror::Error;

/// Top-level error type for the chatplay system.
///
/// Covers everything that can go wrong before the dispatch loop starts:
/// reading, parsing, validating and writing configuration. Per-message
/// outcomes never surface through this type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatPlayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ChatPlayError {
    /// Shorthand for a validation failure on a named config field.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ChatPlayError::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for ChatPlayError {
    fn from(err: toml::de::Error) -> Self {
        ChatPlayError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ChatPlayError {
    fn from(err: toml::ser::Error) -> Self {
        ChatPlayError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ChatPlayError {
    fn from(err: serde_json::Error) -> Self {
        ChatPlayError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for chatplay operations.
pub type Result<T> = std::result::Result<T, ChatPlayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChatPlayError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_invalid_config_display() {
        let err = ChatPlayError::invalid("engine.max_concurrent_tasks", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: engine.max_concurrent_tasks: must be at least 1"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ChatPlayError = io_err.into();
        assert!(matches!(err, ChatPlayError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let err: ChatPlayError = err.unwrap_err().into();
        assert!(matches!(err, ChatPlayError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: ChatPlayError = err.unwrap_err().into();
        assert!(matches!(err, ChatPlayError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
