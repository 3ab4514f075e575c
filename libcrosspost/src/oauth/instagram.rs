//! Instagram OAuth helper

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::InstagramConfig;
use crate::error::Result;
use crate::http::ApiClient;
use crate::oauth::{
    build_authorize_url, request_token, resolve_redirect, stored_bearer, AccessGrant,
    AuthorizationCallback, AuthorizationRequest, OAuthHelper,
};
use crate::store::TokenStore;
use crate::types::{SocialPlatform, TokenRecord};

const DEFAULT_SCOPES: &str = "instagram_business_basic,instagram_business_manage_messages,instagram_business_manage_comments,instagram_business_content_publish";

const MEDIA_FIELDS: &str = "id,caption,media_type,media_url,timestamp";

#[derive(Debug, Clone)]
pub struct InstagramEndpoints {
    pub authorize: String,
    pub token: String,
    /// Instagram Graph root, used for reading the user's media
    pub graph: String,
    /// Facebook Graph root (versioned), used for the content publishing calls
    pub publish: String,
}

impl Default for InstagramEndpoints {
    fn default() -> Self {
        Self {
            authorize: "https://api.instagram.com/oauth/authorize".to_string(),
            token: "https://api.instagram.com/oauth/access_token".to_string(),
            graph: "https://graph.instagram.com".to_string(),
            publish: "https://graph.facebook.com/v12.0".to_string(),
        }
    }
}

impl InstagramEndpoints {
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize: format!("{}/oauth/authorize", base),
            token: format!("{}/oauth/access_token", base),
            graph: base.to_string(),
            publish: base.to_string(),
        }
    }

    pub fn publish_url(&self, path: &str) -> String {
        format!("{}/{}", self.publish, path.trim_start_matches('/'))
    }
}

#[derive(Deserialize)]
struct MediaResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

pub struct InstagramOAuth {
    config: InstagramConfig,
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    endpoints: InstagramEndpoints,
}

impl InstagramOAuth {
    pub fn new(config: InstagramConfig, api: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            config,
            api,
            store,
            endpoints: InstagramEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: InstagramEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints(&self) -> &InstagramEndpoints {
        &self.endpoints
    }

    pub fn config(&self) -> &InstagramConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The user's recent media objects, as returned by the Graph API
    pub async fn fetch_user_media(&self, access_token: &str) -> Result<Vec<serde_json::Value>> {
        let request = self
            .api
            .inner()
            .get(format!("{}/me/media", self.endpoints.graph))
            .query(&[("fields", MEDIA_FIELDS), ("access_token", access_token)]);
        let media: MediaResponse = self
            .api
            .send_json(SocialPlatform::Instagram, "media listing", request)
            .await?;
        Ok(media.data)
    }
}

#[async_trait]
impl OAuthHelper for InstagramOAuth {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Instagram
    }

    fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    async fn authorization_url(&self, redirect_uri: Option<&str>) -> Result<AuthorizationRequest> {
        let client = &self.config.client;
        let url = build_authorize_url(
            &self.endpoints.authorize,
            &[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", resolve_redirect(redirect_uri, client)),
                ("scope", client.scopes.as_deref().unwrap_or(DEFAULT_SCOPES)),
                ("response_type", "code"),
            ],
        )?;
        tracing::debug!("Instagram authorization URL: {}", url);
        Ok(AuthorizationRequest { url, state: None })
    }

    async fn exchange_code(
        &self,
        callback: &AuthorizationCallback,
        redirect_uri: Option<&str>,
    ) -> Result<TokenRecord> {
        let client = &self.config.client;
        let record = request_token(
            &self.api,
            SocialPlatform::Instagram,
            &self.endpoints.token,
            &[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", resolve_redirect(redirect_uri, client)),
                ("code", callback.code.as_str()),
            ],
        )
        .await?;
        tracing::info!("Instagram token exchange successful");
        Ok(record)
    }

    /// Snapshot of recent media; a failure here does not abort the authorization
    async fn enrich(&self, mut record: TokenRecord) -> Result<TokenRecord> {
        match self.fetch_user_media(&record.access_token).await {
            Ok(media) => {
                record
                    .extra
                    .insert("media".to_string(), serde_json::Value::Array(media));
            }
            Err(e) => tracing::warn!("Could not fetch Instagram media: {}", e),
        }
        Ok(record)
    }

    async fn refresh_token(&self, user_id: &str) -> Result<AccessGrant> {
        stored_bearer(self, user_id).await
    }
}
