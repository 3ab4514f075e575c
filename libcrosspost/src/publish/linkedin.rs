//! LinkedIn member publisher
//!
//! Text, image and video shares go through the v2 UGC API. Images and videos
//! are registered as assets first, then their bytes are PUT to the returned
//! upload URL. Documents use the versioned REST API (`rest/documents`,
//! `rest/posts`), which identifies the new post through the `x-restli-id`
//! response header.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};

use crate::error::{CrosspostError, PlatformError, Result};
use crate::http::{decode_json, file_name, media_body, mime_for, read_body};
use crate::oauth::linkedin::person_urn;
use crate::oauth::{LinkedInOAuth, OAuthHelper};
use crate::publish::{require_str, Publisher};
use crate::types::{MediaKind, PublishReceipt, SocialPlatform};
use crate::validation::ContentValidator;

const RESTLI_PROTOCOL: &str = "2.0.0";
const RESTLI_ID_HEADER: &str = "x-restli-id";
const UPLOAD_MECHANISM: &str =
    "/value/uploadMechanism/com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest/uploadUrl";

/// Access token and author URN for one posting session
struct Author {
    token: String,
    urn: String,
}

/// An asset whose bytes have been uploaded
struct UploadedAsset {
    asset: String,
    title: String,
}

pub struct LinkedInPublisher {
    helper: Arc<LinkedInOAuth>,
    validator: ContentValidator,
}

impl LinkedInPublisher {
    pub fn new(helper: Arc<LinkedInOAuth>) -> Self {
        Self {
            helper,
            validator: ContentValidator::for_platform(SocialPlatform::LinkedIn),
        }
    }

    pub fn with_validator(mut self, validator: ContentValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Stored token plus the member URN, fetched and remembered when missing
    async fn author(&self, user_id: &str) -> Result<Author> {
        let mut record = self.helper.require_token(user_id).await?;
        if record.access_token.is_empty() {
            return Err(CrosspostError::MissingCredential(
                "LinkedIn access token not found".to_string(),
            ));
        }

        let subject = match record.subject.clone() {
            Some(subject) => subject,
            None => {
                let subject = self.helper.get_user_urn(&record.access_token).await?;
                record.subject = Some(subject.clone());
                self.helper.save_token(user_id, &record).await?;
                subject
            }
        };

        Ok(Author {
            token: record.access_token,
            urn: person_urn(&subject),
        })
    }

    async fn send(&self, context: &str, request: RequestBuilder) -> Result<Response> {
        self.helper
            .api()
            .send(SocialPlatform::LinkedIn, context, request)
            .await
    }

    fn v2(&self, author: &Author, path: &str) -> RequestBuilder {
        self.helper
            .api()
            .inner()
            .post(self.helper.endpoints().api_url(path))
            .bearer_auth(&author.token)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL)
    }

    fn rest(&self, author: &Author, path: &str) -> RequestBuilder {
        self.v2(author, path)
            .header("LinkedIn-Version", &self.helper.config().api_version)
    }

    /// Register an asset for the given recipe and upload the file to it
    async fn upload_asset(
        &self,
        author: &Author,
        path: &Path,
        kind: MediaKind,
    ) -> Result<UploadedAsset> {
        let recipe = match kind {
            MediaKind::Video => "urn:li:digitalmediaRecipe:feedshare-video",
            _ => "urn:li:digitalmediaRecipe:feedshare-image",
        };
        let body = json!({
            "registerUploadRequest": {
                "owner": author.urn,
                "recipes": [recipe],
                "serviceRelationships": [{
                    "identifier": "urn:li:userGeneratedContent",
                    "relationshipType": "OWNER"
                }]
            }
        });

        let request = self
            .v2(author, "v2/assets")
            .query(&[("action", "registerUpload")])
            .json(&body);
        let response = self.send("register upload", request).await?;
        let registered: Value =
            decode_json(SocialPlatform::LinkedIn, "register upload", response).await?;

        let context = "register upload";
        let upload_url =
            require_str(SocialPlatform::LinkedIn, context, &registered, UPLOAD_MECHANISM)?;
        let asset = require_str(SocialPlatform::LinkedIn, context, &registered, "/value/asset")?;
        tracing::debug!("LinkedIn asset registered: {}", asset);

        self.put_binary(author, &upload_url, path, kind).await?;
        Ok(UploadedAsset {
            asset,
            title: file_name(path),
        })
    }

    /// PUT the file to an upload URL, streaming it from disk
    async fn put_binary(
        &self,
        author: &Author,
        upload_url: &str,
        path: &Path,
        kind: MediaKind,
    ) -> Result<()> {
        let (body, len) = media_body(path, kind).await?;
        let request = self
            .helper
            .api()
            .inner()
            .put(upload_url)
            .bearer_auth(&author.token)
            .header(CONTENT_TYPE, mime_for(path))
            .header(CONTENT_LENGTH, len)
            .body(body);
        self.send(&format!("{} upload", kind), request).await?;
        tracing::info!("LinkedIn {} uploaded", kind);
        Ok(())
    }

    async fn create_ugc_post(
        &self,
        author: &Author,
        text: &str,
        category: &str,
        media: Vec<Value>,
    ) -> Result<PublishReceipt> {
        let mut share = json!({
            "shareCommentary": { "text": text },
            "shareMediaCategory": category
        });
        if !media.is_empty() {
            share["media"] = Value::Array(media);
        }
        let body = json!({
            "author": author.urn,
            "lifecycleState": "PUBLISHED",
            "specificContent": { "com.linkedin.ugc.ShareContent": share },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" }
        });

        let response = self
            .send("share", self.v2(author, "v2/ugcPosts").json(&body))
            .await?;
        receipt_from(response).await
    }

    fn media_entry(text: &str, uploaded: &UploadedAsset, kind: MediaKind) -> Value {
        let mut entry = json!({
            "status": "READY",
            "description": { "text": text },
            "media": uploaded.asset
        });
        if kind == MediaKind::Video {
            entry["title"] = json!({ "text": uploaded.title });
        }
        entry
    }

    async fn post_media(
        &self,
        user_id: &str,
        text: &str,
        path: &Path,
        kind: MediaKind,
    ) -> Result<PublishReceipt> {
        let author = self.author(user_id).await?;
        let uploaded = self.upload_asset(&author, path, kind).await?;
        let category = match kind {
            MediaKind::Video => "VIDEO",
            _ => "IMAGE",
        };
        let media = vec![Self::media_entry(text, &uploaded, kind)];
        self.create_ugc_post(&author, text, category, media).await
    }

    /// Share several images in one post
    pub async fn post_images(
        &self,
        user_id: &str,
        text: &str,
        paths: &[PathBuf],
    ) -> Result<PublishReceipt> {
        if paths.is_empty() {
            return Err(CrosspostError::InvalidInput(
                "At least one image is required".to_string(),
            ));
        }
        for path in paths {
            self.validator.validate_image(path)?;
        }
        self.validator.validate_text(text)?;

        let author = self.author(user_id).await?;
        let mut media = Vec::with_capacity(paths.len());
        for path in paths {
            let uploaded = self.upload_asset(&author, path, MediaKind::Image).await?;
            media.push(Self::media_entry(text, &uploaded, MediaKind::Image));
        }
        self.create_ugc_post(&author, text, "IMAGE", media).await
    }
}

/// Receipt from a share response; the id may be in the body or the header
///
/// An empty body is normal for a 201. A body that is not JSON is only
/// tolerated when the header carries the post id.
async fn receipt_from(response: Response) -> Result<PublishReceipt> {
    let header_id = response
        .headers()
        .get(RESTLI_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = read_body(SocialPlatform::LinkedIn, "share", response).await?;

    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) if header_id.is_some() => {
                tracing::warn!("LinkedIn share body is not JSON ({}), using the header id", e);
                Value::Null
            }
            Err(e) => {
                return Err(PlatformError::Posting(format!(
                    "LinkedIn share returned an unexpected body ({}): {}",
                    e, text
                ))
                .into())
            }
        }
    };

    let mut receipt = PublishReceipt::from_response(SocialPlatform::LinkedIn, body);
    if receipt.post_id.is_none() {
        receipt.post_id = header_id;
    }
    Ok(receipt)
}

#[async_trait]
impl Publisher for LinkedInPublisher {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::LinkedIn
    }

    fn validator(&self) -> &ContentValidator {
        &self.validator
    }

    async fn post_text(&self, user_id: &str, text: &str) -> Result<PublishReceipt> {
        self.validator.validate_text(text)?;
        let author = self.author(user_id).await?;
        self.create_ugc_post(&author, text, "NONE", Vec::new()).await
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

    async fn post_document(
        &self,
        user_id: &str,
        text: &str,
        path: &Path,
    ) -> Result<PublishReceipt> {
        self.validator.validate_document(path)?;
        self.validator.validate_text(text)?;
        let author = self.author(user_id).await?;

        let request = self
            .rest(&author, "rest/documents")
            .query(&[("action", "initializeUpload")])
            .json(&json!({ "initializeUploadRequest": { "owner": author.urn } }));
        let response = self.send("document initialization", request).await?;
        let initialized: Value =
            decode_json(SocialPlatform::LinkedIn, "document initialization", response)
                .await?;
        let context = "document initialization";
        let upload_url =
            require_str(SocialPlatform::LinkedIn, context, &initialized, "/value/uploadUrl")?;
        let document =
            require_str(SocialPlatform::LinkedIn, context, &initialized, "/value/document")?;
        tracing::info!("LinkedIn document initialized: {}", document);

        self.put_binary(&author, &upload_url, path, MediaKind::Document)
            .await?;

        let body = json!({
            "author": author.urn,
            "commentary": text,
            "visibility": "PUBLIC",
            "distribution": {
                "feedDistribution": "MAIN_FEED",
                "targetEntities": [],
                "thirdPartyDistributionChannels": []
            },
            "content": { "media": { "title": file_name(path), "id": document } },
            "lifecycleState": "PUBLISHED",
            "isReshareDisabledByAuthor": false
        });
        let response = self
            .send("document post", self.rest(&author, "rest/posts").json(&body))
            .await?;

        if response.status() != StatusCode::CREATED {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PlatformError::Posting(format!(
                "LinkedIn document post was not created (HTTP {}): {}",
                status.as_u16(),
                text
            ))
            .into());
        }

        let post_id = response
            .headers()
            .get(RESTLI_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Posting(
                    "LinkedIn post creation failed: post id missing in response headers"
                        .to_string(),
                )
            })?;
        tracing::info!("LinkedIn document post created: {}", post_id);

        Ok(PublishReceipt {
            platform: SocialPlatform::LinkedIn,
            post_id: Some(post_id.clone()),
            response: json!({ "post_id": post_id }),
        })
    }
}
