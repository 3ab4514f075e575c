//! Instagram publisher
//!
//! Media goes through a server-side container: create it, wait until its
//! `status_code` is `FINISHED`, then publish it. Text-only posts and
//! documents have no Instagram equivalent.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::Form;

use crate::error::{PlatformError, Result};
use crate::http::file_part;
use crate::oauth::{InstagramOAuth, OAuthHelper};
use crate::publish::{json_str, require_str, unsupported, Publisher};
use crate::types::{MediaKind, PublishReceipt, SocialPlatform};
use crate::validation::ContentValidator;

pub struct InstagramPublisher {
    helper: Arc<InstagramOAuth>,
    validator: ContentValidator,
}

impl InstagramPublisher {
    pub fn new(helper: Arc<InstagramOAuth>) -> Self {
        Self {
            helper,
            validator: ContentValidator::for_platform(SocialPlatform::Instagram),
        }
    }

    pub fn with_validator(mut self, validator: ContentValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Upload the file and caption; returns the container id
    pub async fn create_media_container(
        &self,
        access_token: &str,
        path: &Path,
        kind: MediaKind,
        caption: &str,
    ) -> Result<String> {
        let form = Form::new()
            .text("access_token", access_token.to_string())
            .text("caption", caption.to_string())
            .part("file", file_part(path, kind).await?);

        let api = self.helper.api();
        let request = api
            .inner()
            .post(self.helper.endpoints().publish_url("me/media"))
            .multipart(form);
        let response: serde_json::Value = api
            .send_json(SocialPlatform::Instagram, "media container creation", request)
            .await?;

        let id =
            require_str(SocialPlatform::Instagram, "media container creation", &response, "/id")?;
        tracing::debug!("Instagram media container created: {}", id);
        Ok(id)
    }

    /// Poll the container until it is ready to publish
    ///
    /// A response without `status_code` counts as ready.
    pub async fn wait_for_container(&self, access_token: &str, container_id: &str) -> Result<()> {
        let config = self.helper.config();
        let api = self.helper.api();

        // At least one check, even when polling is configured off
        let attempts = config.max_poll_attempts.max(1);

        for attempt in 1..=attempts {
            let request = api
                .inner()
                .get(self.helper.endpoints().publish_url(container_id))
                .query(&[("fields", "status_code"), ("access_token", access_token)]);
            let status: serde_json::Value = api
                .send_json(SocialPlatform::Instagram, "container status", request)
                .await?;

            match json_str(&status, "/status_code").as_deref() {
                None | Some("FINISHED") | Some("PUBLISHED") => return Ok(()),
                Some(code @ ("ERROR" | "EXPIRED")) => {
                    return Err(PlatformError::Posting(format!(
                        "Instagram media container {} failed with status {}",
                        container_id, code
                    ))
                    .into())
                }
                Some(code) => {
                    tracing::debug!(attempt, status = code, "Instagram container not ready");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
            }
        }

        Err(PlatformError::Posting(format!(
            "Instagram media container {} was not ready after {} checks",
            container_id, attempts
        ))
        .into())
    }

    pub async fn publish_container(
        &self,
        access_token: &str,
        container_id: &str,
    ) -> Result<PublishReceipt> {
        let api = self.helper.api();
        let request = api
            .inner()
            .post(self.helper.endpoints().publish_url("me/media_publish"))
            .form(&[("creation_id", container_id), ("access_token", access_token)]);
        let response = api
            .send_json(SocialPlatform::Instagram, "media publish", request)
            .await?;
        Ok(PublishReceipt::from_response(SocialPlatform::Instagram, response))
    }

    async fn post_media(
        &self,
        user_id: &str,
        caption: &str,
        path: &Path,
        kind: MediaKind,
    ) -> Result<PublishReceipt> {
        let grant = self.helper.refresh_token(user_id).await?;
        let token = grant.access_token();

        let container = self.create_media_container(token, path, kind, caption).await?;
        self.wait_for_container(token, &container).await?;
        self.publish_container(token, &container).await
    }
}

#[async_trait]
impl Publisher for InstagramPublisher {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Instagram
    }

    fn validator(&self) -> &ContentValidator {
        &self.validator
    }

    async fn post_text(&self, _user_id: &str, _text: &str) -> Result<PublishReceipt> {
        Err(unsupported(
            SocialPlatform::Instagram,
            "plain text posts. Attach an image or video",
        ))
    }

    async fn post_image(&self, user_id: &str, text: &str, path: &Path) -> Result<PublishReceipt> {
        self.validator.validate_image(path)?;
        self.validator.validate_text(text)?;
        self.post_media(user_id, text, path, MediaKind::Image).await
    }

    async fn post_video(&self, user_id: &str, text: &str, path: &Path) -> Result<PublishReceipt> {
        self.validator.validate_video(path)?;
        self.validator.validate_text(text)?;
        self.post_media(user_id, text, path, MediaKind::Video).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpConfig, InstagramConfig, OAuthClientConfig};
    use crate::error::CrosspostError;
    use crate::http::ApiClient;
    use crate::oauth::instagram::InstagramEndpoints;
    use crate::store::MemoryTokenStore;
    use crate::types::{Content, TokenRecord};
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn publisher(base: &str) -> InstagramPublisher {
        publisher_with_polls(base, 3).await
    }

    async fn publisher_with_polls(base: &str, max_poll_attempts: u32) -> InstagramPublisher {
        let config = InstagramConfig {
            client: OAuthClientConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "https://app.example/cb".to_string(),
                scopes: None,
            },
            poll_interval_ms: 0,
            max_poll_attempts,
        };
        let helper = InstagramOAuth::new(
            config,
            ApiClient::new(&HttpConfig::default()).unwrap(),
            Arc::new(MemoryTokenStore::new()),
        )
        .with_endpoints(InstagramEndpoints::with_base(base));
        helper
            .save_token("u", &TokenRecord::new(SocialPlatform::Instagram, "ig-token"))
            .await
            .unwrap();
        InstagramPublisher::new(Arc::new(helper))
    }

    fn image_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"JFIF-photo").unwrap();
        path
    }

    async fn mount_container(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/me/media"))
            .and(body_string_contains("name=\"caption\""))
            .and(body_string_contains("Sunset"))
            .and(body_string_contains("JFIF-photo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1"})))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_post_image_polls_then_publishes() {
        let server = MockServer::start().await;
        mount_container(&server).await;
        Mock::given(method("GET"))
            .and(path("/c-1"))
            .and(query_param("fields", "status_code"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status_code": "IN_PROGRESS"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status_code": "FINISHED"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/me/media_publish"))
            .and(body_string_contains("creation_id=c-1"))
            .and(body_string_contains("access_token=ig-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "17895695668004550"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let publisher = publisher(&server.uri()).await;
        let receipt = publisher
            .publish("u", &Content::with_image("Sunset", image_file(&dir)))
            .await
            .unwrap();
        assert_eq!(receipt.post_id.as_deref(), Some("17895695668004550"));
    }

    #[tokio::test]
    async fn test_container_error_stops_publish() {
        let server = MockServer::start().await;
        mount_container(&server).await;
        Mock::given(method("GET"))
            .and(path("/c-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status_code": "ERROR"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/me/media_publish"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = publisher(&server.uri())
            .await
            .post_image("u", "Sunset", &image_file(&dir))
            .await;
        match result {
            Err(CrosspostError::Platform(PlatformError::Posting(msg))) => {
                assert!(msg.contains("ERROR"))
            }
            other => panic!("Expected Posting error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_container_poll_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/c-9"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status_code": "IN_PROGRESS"})),
            )
            .expect(3)
            .mount(&server)
            .await;

        let result = publisher(&server.uri())
            .await
            .wait_for_container("ig-token", "c-9")
            .await;
        match result {
            Err(CrosspostError::Platform(PlatformError::Posting(msg))) => {
                assert!(msg.contains("not ready after 3 checks"), "{}", msg)
            }
            other => panic!("Expected Posting error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_container_checked_once_when_polling_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/c-9"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status_code": "IN_PROGRESS"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = publisher_with_polls(&server.uri(), 0)
            .await
            .wait_for_container("ig-token", "c-9")
            .await;
        match result {
            Err(CrosspostError::Platform(PlatformError::Posting(msg))) => {
                assert!(msg.contains("not ready after 1 checks"), "{}", msg)
            }
            other => panic!("Expected Posting error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_text_and_document_unsupported() {
        let publisher = publisher("http://unused").await;
        assert!(matches!(
            publisher.publish("u", &Content::text("hello")).await,
            Err(CrosspostError::Platform(PlatformError::NotImplemented(_)))
        ));
        assert!(matches!(
            publisher
                .publish("u", &Content::with_document("hello", "deck.pdf"))
                .await,
            Err(CrosspostError::Platform(PlatformError::NotImplemented(_)))
        ));
    }
}
