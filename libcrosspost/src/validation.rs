//! Content validation against platform limits
//!
//! Every publisher runs its content through a [`ContentValidator`] before
//! touching the network. Text length is counted in Unicode scalar values.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ContentValidationError, Result};
use crate::types::{MediaKind, SocialPlatform};

const MB: u64 = 1024 * 1024;

/// Size and length limits for one platform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformLimits {
    pub max_text_length: usize,
    pub max_image_size: u64,
    pub max_video_size: u64,
    pub max_document_size: u64,
}

impl PlatformLimits {
    /// Built-in limits, taken from each vendor's published constraints
    pub fn builtin(platform: SocialPlatform) -> Self {
        match platform {
            SocialPlatform::Facebook => Self {
                max_text_length: 63_206,
                max_image_size: 10 * MB,
                max_video_size: 1024 * MB,
                max_document_size: 10 * MB,
            },
            SocialPlatform::Instagram => Self {
                max_text_length: 2_200,
                max_image_size: 8 * MB,
                max_video_size: 100 * MB,
                max_document_size: 0,
            },
            SocialPlatform::LinkedIn => Self {
                max_text_length: 3_000,
                max_image_size: 10 * MB,
                max_video_size: 200 * MB,
                max_document_size: 100 * MB,
            },
            SocialPlatform::X => Self {
                max_text_length: 280,
                max_image_size: 5 * MB,
                max_video_size: 512 * MB,
                max_document_size: 0,
            },
            SocialPlatform::YouTube => Self {
                max_text_length: 5_000,
                max_image_size: 2 * MB,
                max_video_size: 256 * 1024 * MB,
                max_document_size: 0,
            },
        }
    }

    fn max_size(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Image => self.max_image_size,
            MediaKind::Video => self.max_video_size,
            MediaKind::Document => self.max_document_size,
        }
    }
}

/// Load a limits table from JSON, keyed by platform name
///
/// Platforms missing from the file keep their built-in limits.
pub fn load_limits(path: &Path) -> Result<HashMap<SocialPlatform, PlatformLimits>> {
    let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
    let table: HashMap<SocialPlatform, PlatformLimits> = serde_json::from_str(&content)
        .map_err(|e| ConfigError::Limits(format!("{}: {}", path.display(), e)))?;
    Ok(table)
}

/// Validates content for a single platform
#[derive(Debug, Clone)]
pub struct ContentValidator {
    platform: SocialPlatform,
    limits: PlatformLimits,
}

impl ContentValidator {
    pub fn for_platform(platform: SocialPlatform) -> Self {
        Self::with_limits(platform, PlatformLimits::builtin(platform))
    }

    pub fn with_limits(platform: SocialPlatform, limits: PlatformLimits) -> Self {
        Self { platform, limits }
    }

    /// Use the entry from a loaded table, falling back to the built-in limits
    pub fn from_table(
        platform: SocialPlatform,
        table: &HashMap<SocialPlatform, PlatformLimits>,
    ) -> Self {
        let limits = table
            .get(&platform)
            .copied()
            .unwrap_or_else(|| PlatformLimits::builtin(platform));
        Self::with_limits(platform, limits)
    }

    pub fn platform(&self) -> SocialPlatform {
        self.platform
    }

    pub fn limits(&self) -> &PlatformLimits {
        &self.limits
    }

    pub fn validate_text(&self, content: &str) -> Result<()> {
        let length = content.chars().count();
        if length > self.limits.max_text_length {
            return Err(ContentValidationError::TextTooLong {
                platform: self.platform,
                max: self.limits.max_text_length,
                actual: length,
            }
            .into());
        }
        Ok(())
    }

    pub fn validate_image(&self, path: &Path) -> Result<()> {
        self.validate_file(path, MediaKind::Image)
    }

    pub fn validate_video(&self, path: &Path) -> Result<()> {
        self.validate_file(path, MediaKind::Video)
    }

    pub fn validate_document(&self, path: &Path) -> Result<()> {
        self.validate_file(path, MediaKind::Document)
    }

    /// Existence, then extension, then size
    pub fn validate_file(&self, path: &Path, kind: MediaKind) -> Result<()> {
        if !path.is_file() {
            return Err(ContentValidationError::FileNotFound {
                kind,
                path: path.to_path_buf(),
            }
            .into());
        }

        if MediaKind::from_path(path) != Some(kind) {
            return Err(ContentValidationError::UnsupportedFormat {
                platform: self.platform,
                kind,
                allowed: kind
                    .allowed_extensions()
                    .iter()
                    .map(|e| e.to_uppercase())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
            .into());
        }

        let size = std::fs::metadata(path)
            .map_err(|e| {
                crate::CrosspostError::InvalidInput(format!(
                    "Failed to read metadata for {}: {}",
                    path.display(),
                    e
                ))
            })?
            .len();
        let max = self.limits.max_size(kind);
        if size > max {
            return Err(ContentValidationError::FileTooLarge {
                platform: self.platform,
                kind,
                max_bytes: max,
                actual: size,
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CrosspostError;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, size: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; size]).unwrap();
        path
    }

    fn small_limits() -> PlatformLimits {
        PlatformLimits {
            max_text_length: 10,
            max_image_size: 100,
            max_video_size: 200,
            max_document_size: 300,
        }
    }

    #[test]
    fn test_validate_text_limit() {
        let validator = ContentValidator::for_platform(SocialPlatform::X);
        assert!(validator.validate_text(&"a".repeat(280)).is_ok());

        match validator.validate_text(&"a".repeat(281)) {
            Err(CrosspostError::Validation(ContentValidationError::TextTooLong {
                max,
                actual,
                ..
            })) => {
                assert_eq!(max, 280);
                assert_eq!(actual, 281);
            }
            other => panic!("Expected TextTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_text_counts_characters_not_bytes() {
        let validator = ContentValidator::with_limits(SocialPlatform::X, small_limits());
        // 10 characters, 30 bytes
        assert!(validator.validate_text(&"é".repeat(5).repeat(2)).is_ok());
        assert!(validator.validate_text(&"日本語日本語日本語日".to_string()).is_ok());
        assert!(validator.validate_text(&"日本語日本語日本語日本".to_string()).is_err());
    }

    #[test]
    fn test_missing_file_reported_before_format() {
        let validator = ContentValidator::for_platform(SocialPlatform::Facebook);
        let result = validator.validate_image(Path::new("/no/such/file.txt"));
        assert!(matches!(
            result,
            Err(CrosspostError::Validation(ContentValidationError::FileNotFound {
                kind: MediaKind::Image,
                ..
            }))
        ));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "photo.webp", 10);
        let validator = ContentValidator::for_platform(SocialPlatform::Instagram);

        match validator.validate_image(&path) {
            Err(CrosspostError::Validation(
                err @ ContentValidationError::UnsupportedFormat { .. },
            )) => {
                assert_eq!(
                    err.to_string(),
                    "Invalid image format for instagram. Only PNG, JPG, JPEG, GIF are allowed."
                );
            }
            other => panic!("Expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_video_passed_as_image_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "clip.mp4", 10);
        let validator = ContentValidator::for_platform(SocialPlatform::LinkedIn);
        assert!(validator.validate_image(&path).is_err());
        assert!(validator.validate_video(&path).is_ok());
    }

    #[test]
    fn test_file_size_limits() {
        let dir = TempDir::new().unwrap();
        let validator = ContentValidator::with_limits(SocialPlatform::LinkedIn, small_limits());

        let ok = write_file(&dir, "ok.PNG", 100);
        assert!(validator.validate_image(&ok).is_ok());

        let big = write_file(&dir, "big.png", 101);
        assert!(matches!(
            validator.validate_image(&big),
            Err(CrosspostError::Validation(ContentValidationError::FileTooLarge {
                max_bytes: 100,
                actual: 101,
                ..
            }))
        ));

        let doc = write_file(&dir, "deck.pdf", 301);
        assert!(validator.validate_document(&doc).is_err());
        let doc = write_file(&dir, "deck.docx", 300);
        assert!(validator.validate_document(&doc).is_ok());
    }

    #[test]
    fn test_load_limits_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("limits.json");
        std::fs::write(
            &path,
            r#"{"x": {"max_text_length": 25000, "max_image_size": 1, "max_video_size": 2, "max_document_size": 0}}"#,
        )
        .unwrap();

        let table = load_limits(&path).unwrap();
        let x = ContentValidator::from_table(SocialPlatform::X, &table);
        assert_eq!(x.limits().max_text_length, 25_000);

        let fb = ContentValidator::from_table(SocialPlatform::Facebook, &table);
        assert_eq!(fb.limits(), &PlatformLimits::builtin(SocialPlatform::Facebook));
    }

    #[test]
    fn test_load_limits_rejects_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("limits.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_limits(&path),
            Err(CrosspostError::Config(ConfigError::Limits(_)))
        ));
    }
}
