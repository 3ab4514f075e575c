//! Core types for Crosspost

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CrosspostError;

/// The platforms Crosspost can authorize against and publish to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Facebook,
    Instagram,
    #[serde(rename = "linkedin")]
    LinkedIn,
    X,
    #[serde(rename = "youtube")]
    YouTube,
}

impl SocialPlatform {
    pub const ALL: [SocialPlatform; 5] = [
        SocialPlatform::Facebook,
        SocialPlatform::Instagram,
        SocialPlatform::LinkedIn,
        SocialPlatform::X,
        SocialPlatform::YouTube,
    ];

    /// Lowercase identifier used in config sections, store keys and CLI args
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::LinkedIn => "linkedin",
            Self::X => "x",
            Self::YouTube => "youtube",
        }
    }

    /// Human-facing name, as the vendor spells it
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Facebook => "Facebook",
            Self::Instagram => "Instagram",
            Self::LinkedIn => "LinkedIn",
            Self::X => "X",
            Self::YouTube => "YouTube",
        }
    }
}

impl std::fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SocialPlatform {
    type Err = CrosspostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "facebook" | "fb" => Ok(Self::Facebook),
            "instagram" | "ig" => Ok(Self::Instagram),
            "linkedin" => Ok(Self::LinkedIn),
            "x" | "twitter" => Ok(Self::X),
            "youtube" | "yt" => Ok(Self::YouTube),
            other => Err(CrosspostError::InvalidInput(format!(
                "Unknown platform '{}'. Valid options: facebook, instagram, linkedin, x, youtube",
                other
            ))),
        }
    }
}

/// Kind of file attached to a post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

impl MediaKind {
    /// Extensions accepted for this kind (lowercase, without dot)
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Image => &["png", "jpg", "jpeg", "gif"],
            Self::Video => &["mp4", "mov", "avi"],
            Self::Document => &["pdf", "docx", "pptx"],
        }
    }

    /// Detect the kind from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        [Self::Image, Self::Video, Self::Document]
            .into_iter()
            .find(|kind| kind.allowed_extensions().contains(&ext.as_str()))
    }

    /// Detect the kind from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Document => write!(f, "document"),
        }
    }
}

/// A local file to publish alongside the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl Attachment {
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Build an attachment, detecting the kind from the file extension
    pub fn detect(path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        let kind = MediaKind::from_path(&path).ok_or_else(|| {
            CrosspostError::InvalidInput(format!(
                "Cannot determine media kind of {}",
                path.display()
            ))
        })?;
        Ok(Self { path, kind })
    }
}

/// Content payload: text plus at most one attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_image(text: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::with_attachment(text, Attachment::new(path, MediaKind::Image))
    }

    pub fn with_video(text: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::with_attachment(text, Attachment::new(path, MediaKind::Video))
    }

    pub fn with_document(text: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::with_attachment(text, Attachment::new(path, MediaKind::Document))
    }

    pub fn with_attachment(text: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            text: text.into(),
            attachment: Some(attachment),
        }
    }
}

/// A Facebook page the authorized user manages
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagedPage {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl std::fmt::Debug for ManagedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedPage")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("access_token", &self.access_token.as_ref().map(|_| REDACTED))
            .field("category", &self.category)
            .finish()
    }
}

const REDACTED: &str = "[REDACTED]";

/// Stored OAuth result for one user on one platform
///
/// Persisted as a JSON document and overwritten wholesale on save.
/// Fields the vendor returns that have no dedicated slot land in `extra`.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenRecord {
    pub platform: SocialPlatform,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// OAuth 1.0a token secret (X only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Platform user identifier (LinkedIn `sub`, X user id, Instagram user id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<ManagedPage>,
    pub obtained_at: i64,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenRecord {
    pub fn new(platform: SocialPlatform, access_token: impl Into<String>) -> Self {
        Self {
            platform,
            access_token: access_token.into(),
            refresh_token: None,
            token_secret: None,
            expires_in: None,
            scope: None,
            subject: None,
            pages: Vec::new(),
            obtained_at: chrono::Utc::now().timestamp(),
            extra: serde_json::Map::new(),
        }
    }

    /// Build a record from an OAuth 2.0 token endpoint response
    ///
    /// Known fields are lifted into their slots; everything else is kept in `extra`.
    pub fn from_oauth2_response(
        platform: SocialPlatform,
        response: serde_json::Value,
    ) -> crate::Result<Self> {
        let mut fields = match response {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(crate::error::PlatformError::Authentication(format!(
                    "{} token response is not a JSON object: {}",
                    platform.display_name(),
                    other
                ))
                .into())
            }
        };

        let access_token = match fields.remove("access_token") {
            Some(serde_json::Value::String(token)) if !token.is_empty() => token,
            _ => {
                return Err(CrosspostError::MissingCredential(format!(
                    "Access token not found in the {} response",
                    platform.display_name()
                )))
            }
        };

        let mut record = Self::new(platform, access_token);
        record.refresh_token = take_string(&mut fields, "refresh_token");
        record.scope = take_string(&mut fields, "scope");
        record.expires_in = fields.remove("expires_in").and_then(|v| v.as_i64());
        record.subject = fields.remove("user_id").and_then(|v| match v {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        record.extra = fields;
        Ok(record)
    }
}

impl TokenRecord {
    /// JSON view with every secret replaced, for display
    pub fn redacted_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        for key in ["access_token", "refresh_token", "token_secret"] {
            if let Some(field) = value.get_mut(key) {
                *field = serde_json::Value::String(REDACTED.to_string());
            }
        }
        if let Some(pages) = value.get_mut("pages").and_then(|p| p.as_array_mut()) {
            for page in pages {
                if let Some(token) = page.get_mut("access_token") {
                    *token = serde_json::Value::String(REDACTED.to_string());
                }
            }
        }
        value
    }
}

fn take_string(
    fields: &mut serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<String> {
    match fields.remove(key) {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => {
            fields.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("platform", &self.platform)
            .field("access_token", &REDACTED)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| REDACTED))
            .field("token_secret", &self.token_secret.as_ref().map(|_| REDACTED))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("subject", &self.subject)
            .field("pages", &self.pages)
            .field("obtained_at", &self.obtained_at)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// OAuth 1.0a request token awaiting the user's approval
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub platform: SocialPlatform,
    /// The request token, echoed back by the vendor in the callback
    pub state: String,
    pub token_secret: String,
    pub created_at: i64,
}

impl std::fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("platform", &self.platform)
            .field("state", &self.state)
            .field("token_secret", &REDACTED)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// What a publisher returns after a successful post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishReceipt {
    pub platform: SocialPlatform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub response: serde_json::Value,
}

impl PublishReceipt {
    /// Build a receipt, reading the post id from the usual `id` / `post_id` fields
    pub fn from_response(platform: SocialPlatform, response: serde_json::Value) -> Self {
        let post_id = ["post_id", "id", "id_str"]
            .iter()
            .find_map(|key| response.get(*key))
            .and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        Self {
            platform,
            post_id,
            response,
        }
    }
}
