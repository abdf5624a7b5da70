use thiserror::Error;

/// Top-level error type for the DocuChat system.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for DocuChatError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocuChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for DocuChatError {
    fn from(err: toml::de::Error) -> Self {
        DocuChatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DocuChatError {
    fn from(err: toml::ser::Error) -> Self {
        DocuChatError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DocuChatError {
    fn from(err: serde_json::Error) -> Self {
        DocuChatError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for DocuChat operations.
pub type Result<T> = std::result::Result<T, DocuChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DocuChatError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = DocuChatError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");

        let err = DocuChatError::Gateway("connection refused".to_string());
        assert_eq!(err.to_string(), "Gateway error: connection refused");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DocuChatError = io_err.into();
        assert!(matches!(err, DocuChatError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let parsed: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let err: DocuChatError = parsed.unwrap_err().into();
        assert!(matches!(err, DocuChatError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        let err: DocuChatError = parsed.unwrap_err().into();
        assert!(matches!(err, DocuChatError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }
}
