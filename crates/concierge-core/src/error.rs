use thiserror::Error;

/// Top-level error type for the concierge system.
///
/// Subsystem crates define their own error types and implement
/// `From<ConciergeError>` so that the `?` operator works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConciergeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Registry error: {0}")]
    Registry(String),
}

impl From<toml::de::Error> for ConciergeError {
    fn from(err: toml::de::Error) -> Self {
        ConciergeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ConciergeError {
    fn from(err: toml::ser::Error) -> Self {
        ConciergeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ConciergeError {
    fn from(err: serde_json::Error) -> Self {
        ConciergeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for concierge operations.
pub type Result<T> = std::result::Result<T, ConciergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConciergeError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = ConciergeError::Registry("duplicate cottage 7".to_string());
        assert_eq!(err.to_string(), "Registry error: duplicate cottage 7");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ConciergeError = io_err.into();
        assert!(matches!(err, ConciergeError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse_err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let err: ConciergeError = parse_err.into();
        assert!(matches!(err, ConciergeError::Config(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let err: ConciergeError = parse_err.into();
        assert!(matches!(err, ConciergeError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error:"));
    }
}
