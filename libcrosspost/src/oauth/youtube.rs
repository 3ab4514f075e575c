//! YouTube (Google) OAuth helper
//!
//! Requests offline access so Google issues a refresh token with the first
//! exchange. Google usually omits `refresh_token` from refresh responses; the
//! previous one is kept.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::YouTubeConfig;
use crate::error::Result;
use crate::http::ApiClient;
use crate::oauth::{
    build_authorize_url, refresh_with_grant, request_token, resolve_redirect, AccessGrant,
    AuthorizationCallback, AuthorizationRequest, OAuthHelper,
};
use crate::store::TokenStore;
use crate::types::{SocialPlatform, TokenRecord};

const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

#[derive(Debug, Clone)]
pub struct YouTubeEndpoints {
    pub authorize: String,
    pub token: String,
    /// Resumable/multipart video upload endpoint
    pub upload: String,
}

impl Default for YouTubeEndpoints {
    fn default() -> Self {
        Self {
            authorize: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token: "https://oauth2.googleapis.com/token".to_string(),
            upload: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
        }
    }
}

impl YouTubeEndpoints {
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize: format!("{}/o/oauth2/auth", base),
            token: format!("{}/token", base),
            upload: format!("{}/upload/youtube/v3/videos", base),
        }
    }
}

pub struct YouTubeOAuth {
    config: YouTubeConfig,
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    endpoints: YouTubeEndpoints,
}

impl YouTubeOAuth {
    pub fn new(config: YouTubeConfig, api: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            config,
            api,
            store,
            endpoints: YouTubeEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: YouTubeEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints(&self) -> &YouTubeEndpoints {
        &self.endpoints
    }

    pub fn config(&self) -> &YouTubeConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[async_trait]
impl OAuthHelper for YouTubeOAuth {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::YouTube
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
                ("scope", client.scopes.as_deref().unwrap_or(DEFAULT_SCOPE)),
                ("response_type", "code"),
                ("access_type", "offline"),
            ],
        )?;
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
            SocialPlatform::YouTube,
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

        if record.refresh_token.is_none() {
            tracing::warn!("Google did not return a refresh token; the grant cannot be refreshed");
        }
        Ok(record)
    }

    async fn refresh_token(&self, user_id: &str) -> Result<AccessGrant> {
        refresh_with_grant(
            self,
            &self.api,
            &self.config.client,
            &self.endpoints.token,
            user_id,
        )
        .await
    }
}
