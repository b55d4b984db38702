//! Error types for agentmeter.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Malformed invocation or task input, rejected before any mutation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("Non-finite number for {0}")]
    NonFinite(&'static str),
}

/// Backing store unreadable, unwritable, or corrupt.
///
/// A corrupt document is recovered locally by reinitializing to an empty
/// valid structure; only genuine I/O failures reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error on {doc}: {source}")]
    Io {
        doc: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to acquire lock on {doc}: {source}")]
    Lock {
        doc: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {doc}: {source}")]
    Serialize {
        doc: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration-related errors.
///
/// Invalid configuration never blocks scoring or selection; callers fall
/// back to documented defaults and log a warning.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = ValidationError::MissingField("agent_name");
        assert!(err.to_string().contains("agent_name"));

        let err = ValidationError::InvalidValue {
            field: "duration_seconds",
            message: "must be non-negative".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("duration_seconds"), "{msg}");
        assert!(msg.contains("non-negative"), "{msg}");
    }

    #[test]
    fn storage_error_display() {
        let err = StorageError::Io {
            doc: "cost_tracking".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("cost_tracking"), "{msg}");
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "routing.premium_min".to_string(),
            message: "must exceed economy_max".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("routing.premium_min"), "{msg}");
    }

    #[test]
    fn top_level_error_from_conversions() {
        let err: Error = ValidationError::MissingField("model").into();
        assert!(matches!(err, Error::Validation(_)));

        let err: Error = ConfigError::ParseError("bad toml".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
    }
}
