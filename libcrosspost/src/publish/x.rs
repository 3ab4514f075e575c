//! X (Twitter) publisher
//!
//! Every call is OAuth 1.0a signed with the user's access token. Images go
//! through the simple `media/upload` endpoint; videos use the chunked
//! INIT / APPEND / FINALIZE sequence and wait for server-side processing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::Response;

use crate::error::{CrosspostError, PlatformError, Result};
use crate::http::{decode_json, file_part, mime_for, open_media, read_segment};
use crate::oauth::signature::OAuth1Signer;
use crate::oauth::{OAuthHelper, XOAuth};
use crate::publish::{json_str, require_str, unsupported, Publisher};
use crate::types::{MediaKind, PublishReceipt, SocialPlatform};
use crate::validation::ContentValidator;

const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Longest wait honoured from `check_after_secs`
const MAX_CHECK_AFTER_SECS: u64 = 60;

pub struct XPublisher {
    helper: Arc<XOAuth>,
    validator: ContentValidator,
}

type Params = Vec<(String, String)>;

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl XPublisher {
    pub fn new(helper: Arc<XOAuth>) -> Self {
        Self {
            helper,
            validator: ContentValidator::for_platform(SocialPlatform::X),
        }
    }

    pub fn with_validator(mut self, validator: ContentValidator) -> Self {
        self.validator = validator;
        self
    }

    async fn signer(&self, user_id: &str) -> Result<OAuth1Signer> {
        let grant = self.helper.refresh_token(user_id).await?;
        self.helper.user_signer(&grant)
    }

    fn upload_url(&self) -> String {
        format!("{}/media/upload.json", self.helper.endpoints().upload)
    }

    /// Form-encoded POST; the body parameters are part of the signature
    async fn signed_form(
        &self,
        signer: &OAuth1Signer,
        url: &str,
        form: Params,
        context: &str,
    ) -> Result<Response> {
        let header = signer.authorization_header("POST", url, &form, &[])?;
        let api = self.helper.api();
        let request = api.inner().post(url).header(AUTHORIZATION, header).form(&form);
        api.send(SocialPlatform::X, context, request).await
    }

    /// Multipart POST; multipart bodies are not signed
    async fn signed_multipart(
        &self,
        signer: &OAuth1Signer,
        url: &str,
        form: Form,
        context: &str,
    ) -> Result<Response> {
        let header = signer.authorization_header("POST", url, &[], &[])?;
        let api = self.helper.api();
        let request = api
            .inner()
            .post(url)
            .header(AUTHORIZATION, header)
            .multipart(form);
        api.send(SocialPlatform::X, context, request).await
    }

    async fn signed_get(
        &self,
        signer: &OAuth1Signer,
        url: &str,
        query: Params,
        context: &str,
    ) -> Result<serde_json::Value> {
        let header = signer.authorization_header("GET", url, &query, &[])?;
        let api = self.helper.api();
        let request = api.inner().get(url).header(AUTHORIZATION, header).query(&query);
        api.send_json(SocialPlatform::X, context, request).await
    }

    async fn post_status(
        &self,
        signer: &OAuth1Signer,
        text: &str,
        media_id: Option<&str>,
    ) -> Result<PublishReceipt> {
        let mut form = params(&[("status", text)]);
        if let Some(media_id) = media_id {
            form.push(("media_ids".to_string(), media_id.to_string()));
        }

        let url = format!("{}/statuses/update.json", self.helper.endpoints().api);
        let response = self
            .signed_form(signer, &url, form, "status update")
            .await?;
        let body = decode_json(SocialPlatform::X, "status update", response).await?;
        Ok(PublishReceipt::from_response(SocialPlatform::X, body))
    }

    /// Simple upload for images; returns the media id
    pub async fn upload_image(&self, signer: &OAuth1Signer, path: &Path) -> Result<String> {
        let form = Form::new().part("media", file_part(path, MediaKind::Image).await?);
        let url = self.upload_url();
        let response = self
            .signed_multipart(signer, &url, form, "media upload")
            .await?;
        let body = decode_json(SocialPlatform::X, "media upload", response).await?;
        require_str(SocialPlatform::X, "media upload", &body, "/media_id_string")
    }

    /// Chunked upload for videos; returns the media id once processing succeeded
    ///
    /// The file is read one segment at a time.
    pub async fn upload_video(&self, signer: &OAuth1Signer, path: &Path) -> Result<String> {
        let (mut file, total) = open_media(path, MediaKind::Video).await?;
        let url = self.upload_url();
        let total = total.to_string();
        let media_type = mime_for(path);

        let init = self
            .signed_form(
                signer,
                &url,
                params(&[
                    ("command", "INIT"),
                    ("total_bytes", total.as_str()),
                    ("media_type", media_type.as_str()),
                    ("media_category", "tweet_video"),
                ]),
                "media upload INIT",
            )
            .await?;
        let init = decode_json(SocialPlatform::X, "media upload INIT", init).await?;
        let media_id =
            require_str(SocialPlatform::X, "media upload INIT", &init, "/media_id_string")?;
        tracing::debug!("X video upload started: {} ({} bytes)", media_id, total);

        for index in 0.. {
            let segment = read_segment(&mut file, CHUNK_SIZE).await.map_err(|e| {
                CrosspostError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
            })?;
            if segment.is_empty() {
                break;
            }

            let form = Form::new()
                .text("command", "APPEND")
                .text("media_id", media_id.clone())
                .text("segment_index", index.to_string())
                .part("media", Part::bytes(segment));
            self.signed_multipart(signer, &url, form, "media upload APPEND")
                .await?;
        }

        let finalize = self
            .signed_form(
                signer,
                &url,
                params(&[("command", "FINALIZE"), ("media_id", media_id.as_str())]),
                "media upload FINALIZE",
            )
            .await?;
        let finalize = decode_json(SocialPlatform::X, "media upload FINALIZE", finalize).await?;
        self.wait_for_processing(signer, &media_id, finalize).await?;
        Ok(media_id)
    }

    /// Follow `processing_info` until the media is usable
    async fn wait_for_processing(
        &self,
        signer: &OAuth1Signer,
        media_id: &str,
        mut status: serde_json::Value,
    ) -> Result<()> {
        let url = self.upload_url();
        let max_attempts = self.helper.config().max_poll_attempts;

        let mut checks = 0;
        for attempt in 0..=max_attempts {
            checks += 1;
            let Some(info) = status.get("processing_info") else {
                return Ok(());
            };

            match json_str(info, "/state").as_deref() {
                Some("succeeded") | None => return Ok(()),
                Some("failed") => {
                    let reason = json_str(info, "/error/message")
                        .unwrap_or_else(|| "unknown error".to_string());
                    return Err(PlatformError::Posting(format!(
                        "X media {} processing failed: {}",
                        media_id, reason
                    ))
                    .into());
                }
                Some(state) => {
                    tracing::debug!(attempt, state, "X media still processing");
                }
            }

            if attempt == max_attempts {
                break;
            }

            let wait = info
                .get("check_after_secs")
                .and_then(|v| v.as_u64())
                .unwrap_or(1)
                .min(MAX_CHECK_AFTER_SECS);
            tokio::time::sleep(Duration::from_secs(wait)).await;

            status = self
                .signed_get(
                    signer,
                    &url,
                    params(&[("command", "STATUS"), ("media_id", media_id)]),
                    "media upload STATUS",
                )
                .await?;
        }

        Err(PlatformError::Posting(format!(
            "X media {} was still processing after {} checks",
            media_id, checks
        ))
        .into())
    }
}

#[async_trait]
impl Publisher for XPublisher {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::X
    }

    fn validator(&self) -> &ContentValidator {
        &self.validator
    }

    async fn post_text(&self, user_id: &str, text: &str) -> Result<PublishReceipt> {
        self.validator.validate_text(text)?;
        let signer = self.signer(user_id).await?;
        self.post_status(&signer, text, None).await
    }

    async fn post_image(&self, user_id: &str, text: &str, path: &Path) -> Result<PublishReceipt> {
        self.validator.validate_image(path)?;
        self.validator.validate_text(text)?;
        let signer = self.signer(user_id).await?;
        let media_id = self.upload_image(&signer, path).await?;
        self.post_status(&signer, text, Some(&media_id)).await
    }

    async fn post_video(&self, user_id: &str, text: &str, path: &Path) -> Result<PublishReceipt> {
        self.validator.validate_video(path)?;
        self.validator.validate_text(text)?;
        let signer = self.signer(user_id).await?;
        let media_id = self.upload_video(&signer, path).await?;
        self.post_status(&signer, text, Some(&media_id)).await
    }

    async fn post_document(
        &self,
        _user_id: &str,
        _text: &str,
        _path: &Path,
    ) -> Result<PublishReceipt> {
        Err(unsupported(SocialPlatform::X, "document uploads"))
    }
}
