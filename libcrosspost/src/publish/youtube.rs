//! YouTube publisher
//!
//! YouTube only takes videos. The metadata and the file travel together in a
//! single `multipart/related` upload, streamed from disk.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Body;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

use crate::error::Result;
use crate::http::{mime_for, open_media};
use crate::oauth::{OAuthHelper, YouTubeOAuth};
use crate::publish::{unsupported, Publisher};
use crate::types::{MediaKind, PublishReceipt, SocialPlatform};
use crate::validation::ContentValidator;

/// YouTube rejects titles longer than this
const MAX_TITLE_CHARS: usize = 100;

pub struct YouTubePublisher {
    helper: Arc<YouTubeOAuth>,
    validator: ContentValidator,
}

impl YouTubePublisher {
    pub fn new(helper: Arc<YouTubeOAuth>) -> Self {
        Self {
            helper,
            validator: ContentValidator::for_platform(SocialPlatform::YouTube),
        }
    }

    pub fn with_validator(mut self, validator: ContentValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Video resource sent as the first part of the upload
    pub fn video_metadata(&self, text: &str, path: &Path) -> serde_json::Value {
        let config = self.helper.config();

        let mut snippet = json!({
            "title": video_title(text, path),
            "description": config.description.as_deref().unwrap_or(text),
        });
        if !config.tags.is_empty() {
            snippet["tags"] = json!(config.tags);
        }
        if let Some(category) = &config.category_id {
            snippet["categoryId"] = json!(category);
        }

        json!({
            "snippet": snippet,
            "status": { "privacyStatus": config.privacy_status },
        })
    }
}

/// Post text cut to the title limit, or the file stem when there is no text
fn video_title(text: &str, path: &Path) -> String {
    let text = text.trim();
    if text.is_empty() {
        return path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Untitled")
            .to_string();
    }
    text.chars().take(MAX_TITLE_CHARS).collect()
}

/// The parts of a `multipart/related` body before and after the media bytes
fn related_frame(
    boundary: &str,
    metadata: &serde_json::Value,
    media_type: &str,
) -> (Vec<u8>, Vec<u8>) {
    let head = format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n\
         --{b}\r\nContent-Type: {t}\r\n\r\n",
        b = boundary,
        m = metadata,
        t = media_type
    );
    let tail = format!("\r\n--{}--\r\n", boundary);
    (head.into_bytes(), tail.into_bytes())
}

#[async_trait]
impl Publisher for YouTubePublisher {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::YouTube
    }

    fn validator(&self) -> &ContentValidator {
        &self.validator
    }

    async fn post_text(&self, _user_id: &str, _text: &str) -> Result<PublishReceipt> {
        Err(unsupported(SocialPlatform::YouTube, "text-only posts. Attach a video"))
    }

    async fn post_image(
        &self,
        _user_id: &str,
        _text: &str,
        _path: &Path,
    ) -> Result<PublishReceipt> {
        Err(unsupported(SocialPlatform::YouTube, "image posts"))
    }

    async fn post_video(&self, user_id: &str, text: &str, path: &Path) -> Result<PublishReceipt> {
        self.validator.validate_video(path)?;
        self.validator.validate_text(text)?;

        let grant = self.helper.refresh_token(user_id).await?;
        let (file, media_len) = open_media(path, MediaKind::Video).await?;
        let metadata = self.video_metadata(text, path);
        let boundary = format!("crosspost-{}", uuid::Uuid::new_v4().simple());

        let (head, tail) = related_frame(&boundary, &metadata, &mime_for(path));
        let length = head.len() as u64 + media_len + tail.len() as u64;
        let reader = Cursor::new(head).chain(file).chain(Cursor::new(tail));
        let body = Body::wrap_stream(ReaderStream::new(reader));

        tracing::debug!(
            bytes = media_len,
            title = %metadata["snippet"]["title"],
            "Uploading YouTube video"
        );

        let api = self.helper.api();
        let request = api
            .inner()
            .post(&self.helper.endpoints().upload)
            .query(&[("uploadType", "multipart"), ("part", "snippet,status")])
            .bearer_auth(grant.access_token())
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .header(CONTENT_LENGTH, length)
            .body(body);
        let response = api
            .send_json(SocialPlatform::YouTube, "video upload", request)
            .await?;
        Ok(PublishReceipt::from_response(SocialPlatform::YouTube, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpConfig, OAuthClientConfig, YouTubeConfig};
    use crate::error::{CrosspostError, PlatformError};
    use crate::http::ApiClient;
    use crate::oauth::youtube::YouTubeEndpoints;
    use crate::store::MemoryTokenStore;
    use crate::types::{Content, TokenRecord};
    use tempfile::TempDir;
    use wiremock::matchers::{body_string_contains, header, header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> YouTubeConfig {
        YouTubeConfig {
            client: OAuthClientConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "https://app.example/cb".to_string(),
                scopes: None,
            },
            privacy_status: "unlisted".to_string(),
            description: None,
            tags: vec!["rust".to_string()],
            category_id: Some("28".to_string()),
        }
    }

    async fn publisher(base: &str) -> YouTubePublisher {
        let helper = YouTubeOAuth::new(
            config(),
            ApiClient::new(&HttpConfig::default()).unwrap(),
            Arc::new(MemoryTokenStore::new()),
        )
        .with_endpoints(YouTubeEndpoints::with_base(base));
        let mut record = TokenRecord::new(SocialPlatform::YouTube, "stale-token");
        record.refresh_token = Some("yt-refresh".to_string());
        helper.save_token("u", &record).await.unwrap();
        YouTubePublisher::new(Arc::new(helper))
    }

    #[test]
    fn test_video_title() {
        assert_eq!(video_title("  Launch day  ", Path::new("a.mp4")), "Launch day");
        assert_eq!(video_title("", Path::new("/tmp/holiday-2024.mp4")), "holiday-2024");
        let long = "é".repeat(150);
        assert_eq!(video_title(&long, Path::new("a.mp4")).chars().count(), 100);
    }

    #[test]
    fn test_related_frame_layout() {
        let (head, tail) = related_frame("b", &json!({"k": 1}), "video/mp4");
        let body = [head, b"DATA".to_vec(), tail].concat();
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text,
            "--b\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"k\":1}\r\n\
             --b\r\nContent-Type: video/mp4\r\n\r\nDATA\r\n--b--\r\n"
        );
    }

    #[tokio::test]
    async fn test_metadata_uses_config() {
        let publisher = publisher("http://unused").await;
        let metadata = publisher.video_metadata("My video", Path::new("v.mp4"));
        assert_eq!(metadata["snippet"]["title"], "My video");
        assert_eq!(metadata["snippet"]["description"], "My video");
        assert_eq!(metadata["snippet"]["tags"], json!(["rust"]));
        assert_eq!(metadata["snippet"]["categoryId"], "28");
        assert_eq!(metadata["status"]["privacyStatus"], "unlisted");
    }

    #[tokio::test]
    async fn test_post_video_uploads_multipart_related() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=yt-refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "yt-token", "expires_in": 3599})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .and(query_param("uploadType", "multipart"))
            .and(query_param("part", "snippet,status"))
            .and(header("authorization", "Bearer yt-token"))
            .and(header_regex("content-type", "^multipart/related; boundary=crosspost-"))
            .and(body_string_contains("\"title\":\"Demo\""))
            .and(body_string_contains("FAKEVIDEO"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "dQw4w9WgXcQ"})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let video = dir.path().join("demo.mp4");
        std::fs::write(&video, b"FAKEVIDEO").unwrap();

        let receipt = publisher(&server.uri())
            .await
            .publish("u", &Content::with_video("Demo", &video))
            .await
            .unwrap();
        assert_eq!(receipt.post_id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[tokio::test]
    async fn test_only_video_supported() {
        let publisher = publisher("http://unused").await;
        for content in [
            Content::text("hi"),
            Content::with_image("hi", "a.png"),
            Content::with_document("hi", "a.pdf"),
        ] {
            assert!(matches!(
                publisher.publish("u", &content).await,
                Err(CrosspostError::Platform(PlatformError::NotImplemented(_)))
            ));
        }
    }
}
