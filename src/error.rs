//! Configuration error types.
//!
//! Errors from chip loading and generation live in
//! [`crate::interconnect::error`].

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or validating the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON or has unknown fields.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// A layout value is out of range.
    #[error("invalid layout.{field}: {message}")]
    InvalidLayout {
        /// Field name under `layout`.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// An explicit diagonal pair names the same pin twice.
    #[error("layout.diagonal_pairs pairs '{pin}' with itself")]
    SelfPairedPin {
        /// The repeated pin.
        pin: String,
    },

    /// Unknown log level.
    #[error("invalid log level '{level}', expected one of: trace, debug, info, warn, error")]
    InvalidLogLevel {
        /// The level as written.
        level: String,
    },
}

impl ConfigError {
    /// Creates a layout range error.
    pub fn invalid_layout(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidLayout {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn layout_error_names_field() {
        let error = ConfigError::invalid_layout("test_pad_pitch", "must be positive, got 0");
        assert_eq!(
            error.to_string(),
            "invalid layout.test_pad_pitch: must be positive, got 0"
        );
    }

    #[test]
    fn parse_error_keeps_source() {
        use std::error::Error as _;

        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = ConfigError::ParseError {
            path: PathBuf::from("config.json"),
            source,
        };
        assert!(error.source().is_some());
    }
}
