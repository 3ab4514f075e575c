//! Publishers
//!
//! A publisher turns a [`Content`] payload into the API calls of one
//! platform. Content is validated before any request is made; combinations a
//! platform cannot represent fail with [`PlatformError::NotImplemented`].

use std::path::Path;

use async_trait::async_trait;

use crate::error::{CrosspostError, PlatformError, Result};
use crate::types::{Content, MediaKind, PublishReceipt, SocialPlatform};
use crate::validation::ContentValidator;

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod x;
pub mod youtube;

pub use facebook::FacebookPublisher;
pub use instagram::InstagramPublisher;
pub use linkedin::LinkedInPublisher;
pub use x::XPublisher;
pub use youtube::YouTubePublisher;

/// Posting interface shared by every platform
#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> SocialPlatform;

    fn validator(&self) -> &ContentValidator;

    async fn post_text(&self, _user_id: &str, _text: &str) -> Result<PublishReceipt> {
        Err(unsupported(self.platform(), "text-only posts"))
    }

    async fn post_image(
        &self,
        _user_id: &str,
        _text: &str,
        _path: &Path,
    ) -> Result<PublishReceipt> {
        Err(unsupported(self.platform(), "image posts"))
    }

    async fn post_video(
        &self,
        _user_id: &str,
        _text: &str,
        _path: &Path,
    ) -> Result<PublishReceipt> {
        Err(unsupported(self.platform(), "video posts"))
    }

    async fn post_document(
        &self,
        _user_id: &str,
        _text: &str,
        _path: &Path,
    ) -> Result<PublishReceipt> {
        Err(unsupported(self.platform(), "document uploads"))
    }

    /// Share a URL with accompanying text
    async fn post_link(&self, _user_id: &str, _text: &str, _link: &str) -> Result<PublishReceipt> {
        Err(unsupported(self.platform(), "link posts"))
    }

    /// Dispatch on the attachment kind
    async fn publish(&self, user_id: &str, content: &Content) -> Result<PublishReceipt> {
        let receipt = match &content.attachment {
            None => self.post_text(user_id, &content.text).await?,
            Some(attachment) => match attachment.kind {
                MediaKind::Image => {
                    self.post_image(user_id, &content.text, &attachment.path)
                        .await?
                }
                MediaKind::Video => {
                    self.post_video(user_id, &content.text, &attachment.path)
                        .await?
                }
                MediaKind::Document => {
                    self.post_document(user_id, &content.text, &attachment.path)
                        .await?
                }
            },
        };

        tracing::info!(
            platform = %self.platform(),
            user_id,
            post_id = receipt.post_id.as_deref().unwrap_or(""),
            "Published"
        );
        Ok(receipt)
    }
}

pub(crate) fn unsupported(platform: SocialPlatform, what: &str) -> CrosspostError {
    PlatformError::NotImplemented(format!(
        "{} does not support {}",
        platform.display_name(),
        what
    ))
    .into()
}

/// Read a string field from a vendor response
pub(crate) fn json_str(value: &serde_json::Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(|v| match v {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Read a required string field, failing with a `Posting` error that names the call
pub(crate) fn require_str(
    platform: SocialPlatform,
    context: &str,
    value: &serde_json::Value,
    pointer: &str,
) -> Result<String> {
    json_str(value, pointer).ok_or_else(|| {
        PlatformError::Posting(format!(
            "{} {} response is missing {}: {}",
            platform.display_name(),
            context,
            pointer,
            value
        ))
        .into()
    })
}
