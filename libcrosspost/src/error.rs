//! Error types for Crosspost

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{MediaKind, SocialPlatform};

pub type Result<T> = std::result::Result<T, CrosspostError>;

#[derive(Error, Debug)]
pub enum CrosspostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Content validation failed: {0}")]
    Validation(#[from] ContentValidationError),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosspostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosspostError::InvalidInput(_) => 3,
            CrosspostError::Validation(_) => 3,
            CrosspostError::MissingCredential(_) => 2,
            CrosspostError::Platform(PlatformError::Authentication(_)) => 2,
            CrosspostError::Platform(_) => 1,
            CrosspostError::Config(_) => 1,
            CrosspostError::Store(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Failed to load platform limits: {0}")]
    Limits(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt token document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Not supported: {0}")]
    NotImplemented(String),

    #[error("{platform} {context} failed (HTTP {status}): {body}")]
    Api {
        platform: SocialPlatform,
        context: String,
        status: u16,
        body: String,
    },
}

/// Raised when content does not meet a platform's requirements
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentValidationError {
    #[error("{platform} content exceeds the maximum length of {max} characters (current: {actual})")]
    TextTooLong {
        platform: SocialPlatform,
        max: usize,
        actual: usize,
    },

    #[error("{kind} file not found: {}", .path.display())]
    FileNotFound { kind: MediaKind, path: PathBuf },

    #[error("Invalid {kind} format for {platform}. Only {allowed} are allowed.")]
    UnsupportedFormat {
        platform: SocialPlatform,
        kind: MediaKind,
        allowed: String,
    },

    #[error("{platform} {kind} exceeds the maximum size of {} MB", megabytes(.max_bytes))]
    FileTooLarge {
        platform: SocialPlatform,
        kind: MediaKind,
        max_bytes: u64,
        actual: u64,
    },
}

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = CrosspostError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = CrosspostError::Platform(PlatformError::Authentication(
            "Token expired".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_missing_credential() {
        let error = CrosspostError::MissingCredential("No token found for user u1".to_string());
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_api_error() {
        let error = CrosspostError::Platform(PlatformError::Api {
            platform: SocialPlatform::LinkedIn,
            context: "ugcPosts".to_string(),
            status: 422,
            body: "{\"message\":\"bad\"}".to_string(),
        });
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_validation_error() {
        let error = CrosspostError::Validation(ContentValidationError::TextTooLong {
            platform: SocialPlatform::X,
            max: 280,
            actual: 300,
        });
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_api_error_includes_vendor_text() {
        let error = PlatformError::Api {
            platform: SocialPlatform::Facebook,
            context: "page feed".to_string(),
            status: 400,
            body: "(#200) Permissions error".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("facebook page feed failed"));
        assert!(message.contains("HTTP 400"));
        assert!(message.contains("Permissions error"));
    }

    #[test]
    fn test_text_too_long_message() {
        let error = ContentValidationError::TextTooLong {
            platform: SocialPlatform::X,
            max: 280,
            actual: 281,
        };
        assert_eq!(
            error.to_string(),
            "x content exceeds the maximum length of 280 characters (current: 281)"
        );
    }

    #[test]
    fn test_file_too_large_reports_megabytes() {
        let error = ContentValidationError::FileTooLarge {
            platform: SocialPlatform::Instagram,
            kind: MediaKind::Image,
            max_bytes: 8 * 1024 * 1024,
            actual: 9 * 1024 * 1024,
        };
        assert_eq!(
            error.to_string(),
            "instagram image exceeds the maximum size of 8 MB"
        );
    }

    #[test]
    fn test_error_conversion_from_validation_error() {
        let error: CrosspostError = ContentValidationError::FileNotFound {
            kind: MediaKind::Video,
            path: PathBuf::from("/nope.mp4"),
        }
        .into();

        match error {
            CrosspostError::Validation(ContentValidationError::FileNotFound { .. }) => {}
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();

        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
