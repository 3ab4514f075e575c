//! Facebook page publisher
//!
//! Posts always go to a page, using that page's own access token.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::Form;

use crate::error::{CrosspostError, Result};
use crate::http::file_part;
use crate::oauth::{FacebookOAuth, OAuthHelper};
use crate::publish::Publisher;
use crate::types::{ManagedPage, MediaKind, PublishReceipt, SocialPlatform};
use crate::validation::ContentValidator;

pub struct FacebookPublisher {
    helper: Arc<FacebookOAuth>,
    validator: ContentValidator,
}

impl FacebookPublisher {
    pub fn new(helper: Arc<FacebookOAuth>) -> Self {
        Self {
            helper,
            validator: ContentValidator::for_platform(SocialPlatform::Facebook),
        }
    }

    pub fn with_validator(mut self, validator: ContentValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Pick the page to post to and attach its access token
    ///
    /// One managed page is used automatically. With several, `facebook.page`
    /// in the config must name one by id or name.
    pub async fn select_page(&self, user_id: &str) -> Result<ManagedPage> {
        let grant = self.helper.refresh_token(user_id).await?;
        let user_token = grant.access_token();

        let pages = self.helper.fetch_user_pages(user_token).await?;
        let mut page = choose_page(pages, self.helper.config().page.as_deref())?;
        tracing::info!("Posting to Facebook page: {}", page.name);

        page.access_token = Some(self.get_page_access_token(&page.id, user_token).await?);
        Ok(page)
    }

    pub async fn get_page_access_token(&self, page_id: &str, user_token: &str) -> Result<String> {
        let api = self.helper.api();
        let request = api
            .inner()
            .get(self.helper.endpoints().graph_url(page_id))
            .query(&[("fields", "access_token"), ("access_token", user_token)]);
        let page: serde_json::Value = api
            .send_json(SocialPlatform::Facebook, "page token lookup", request)
            .await?;

        page.get("access_token")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                CrosspostError::MissingCredential(format!(
                    "Unable to fetch page access token for page {}",
                    page_id
                ))
            })
    }

    async fn post_form(
        &self,
        page: &ManagedPage,
        edge: &str,
        context: &str,
        fields: &[(&str, &str)],
    ) -> Result<PublishReceipt> {
        let api = self.helper.api();
        let mut form: Vec<(&str, &str)> = fields.to_vec();
        form.push(("access_token", page.access_token.as_deref().unwrap_or_default()));

        let request = api
            .inner()
            .post(self.helper.endpoints().graph_url(&format!("{}/{}", page.id, edge)))
            .form(&form);
        let response = api
            .send_json(SocialPlatform::Facebook, context, request)
            .await?;
        Ok(PublishReceipt::from_response(SocialPlatform::Facebook, response))
    }

    async fn post_file(
        &self,
        user_id: &str,
        edge: &str,
        text_field: &str,
        text: &str,
        path: &Path,
        kind: MediaKind,
    ) -> Result<PublishReceipt> {
        let page = self.select_page(user_id).await?;

        let form = Form::new()
            .text(text_field.to_string(), text.to_string())
            .text(
                "access_token",
                page.access_token.clone().unwrap_or_default(),
            )
            .part("source", file_part(path, kind).await?);

        let api = self.helper.api();
        let request = api
            .inner()
            .post(self.helper.endpoints().graph_url(&format!("{}/{}", page.id, edge)))
            .multipart(form);
        let response = api
            .send_json(SocialPlatform::Facebook, &format!("{} upload", kind), request)
            .await?;
        Ok(PublishReceipt::from_response(SocialPlatform::Facebook, response))
    }
}

fn choose_page(pages: Vec<ManagedPage>, wanted: Option<&str>) -> Result<ManagedPage> {
    if pages.is_empty() {
        return Err(CrosspostError::MissingCredential(
            "User does not manage any Facebook pages".to_string(),
        ));
    }

    let names = || {
        pages
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    match wanted {
        Some(wanted) => {
            let found = pages
                .iter()
                .position(|p| p.id == wanted || p.name.eq_ignore_ascii_case(wanted));
            match found {
                Some(index) => Ok(pages[index].clone()),
                None => Err(CrosspostError::InvalidInput(format!(
                    "Configured Facebook page '{}' not found. Available pages: {}",
                    wanted,
                    names()
                ))),
            }
        }
        None if pages.len() == 1 => Ok(pages[0].clone()),
        None => Err(CrosspostError::InvalidInput(format!(
            "Multiple Facebook pages found ({}). Set `page` in the [facebook] config section",
            names()
        ))),
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Facebook
    }

    fn validator(&self) -> &ContentValidator {
        &self.validator
    }

    async fn post_text(&self, user_id: &str, text: &str) -> Result<PublishReceipt> {
        self.validator.validate_text(text)?;
        let page = self.select_page(user_id).await?;
        self.post_form(&page, "feed", "text post", &[("message", text)])
            .await
    }

    async fn post_image(&self, user_id: &str, text: &str, path: &Path) -> Result<PublishReceipt> {
        self.validator.validate_image(path)?;
        self.validator.validate_text(text)?;
        self.post_file(user_id, "photos", "message", text, path, MediaKind::Image)
            .await
    }

    async fn post_video(&self, user_id: &str, text: &str, path: &Path) -> Result<PublishReceipt> {
        self.validator.validate_video(path)?;
        self.validator.validate_text(text)?;
        self.post_file(user_id, "videos", "description", text, path, MediaKind::Video)
            .await
    }

    /// Uploaded through the photos edge; the Graph API has no document edge for pages
    async fn post_document(
        &self,
        user_id: &str,
        text: &str,
        path: &Path,
    ) -> Result<PublishReceipt> {
        self.validator.validate_document(path)?;
        self.validator.validate_text(text)?;
        self.post_file(user_id, "photos", "message", text, path, MediaKind::Document)
            .await
    }

    async fn post_link(&self, user_id: &str, text: &str, link: &str) -> Result<PublishReceipt> {
        self.validator.validate_text(text)?;
        url::Url::parse(link)
            .map_err(|e| CrosspostError::InvalidInput(format!("Invalid link '{}': {}", link, e)))?;

        let page = self.select_page(user_id).await?;
        self.post_form(&page, "feed", "link post", &[("message", text), ("link", link)])
            .await
    }
}
