//! LinkedIn OAuth helper
//!
//! Uses the OpenID Connect `userinfo` endpoint to learn the member id, which
//! becomes the author URN of every post.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::LinkedInConfig;
use crate::error::{CrosspostError, Result};
use crate::http::ApiClient;
use crate::oauth::{
    build_authorize_url, refresh_with_grant, request_token, resolve_redirect, AccessGrant,
    AuthorizationCallback, AuthorizationRequest, OAuthHelper,
};
use crate::store::TokenStore;
use crate::types::{SocialPlatform, TokenRecord};

const DEFAULT_SCOPES: &str = "w_member_social profile email openid";

#[derive(Debug, Clone)]
pub struct LinkedInEndpoints {
    pub authorize: String,
    pub token: String,
    /// API host; `v2/...` and `rest/...` paths are appended
    pub api: String,
}

impl Default for LinkedInEndpoints {
    fn default() -> Self {
        Self {
            authorize: "https://www.linkedin.com/oauth/v2/authorization".to_string(),
            token: "https://www.linkedin.com/oauth/v2/accessToken".to_string(),
            api: "https://api.linkedin.com".to_string(),
        }
    }
}

impl LinkedInEndpoints {
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize: format!("{}/oauth/v2/authorization", base),
            token: format!("{}/oauth/v2/accessToken", base),
            api: base.to_string(),
        }
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api, path.trim_start_matches('/'))
    }
}

/// Author URN for a member id
pub fn person_urn(subject: &str) -> String {
    format!("urn:li:person:{}", subject)
}

pub struct LinkedInOAuth {
    config: LinkedInConfig,
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    endpoints: LinkedInEndpoints,
}

impl LinkedInOAuth {
    pub fn new(config: LinkedInConfig, api: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            config,
            api,
            store,
            endpoints: LinkedInEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: LinkedInEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints(&self) -> &LinkedInEndpoints {
        &self.endpoints
    }

    pub fn config(&self) -> &LinkedInConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Member id (`sub`) of the token's owner
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` when the response has no `sub`.
    pub async fn get_user_urn(&self, access_token: &str) -> Result<String> {
        let request = self
            .api
            .inner()
            .get(self.endpoints.api_url("v2/userinfo"))
            .bearer_auth(access_token);
        let info: serde_json::Value = self
            .api
            .send_json(SocialPlatform::LinkedIn, "userinfo", request)
            .await?;

        let sub = info
            .get("sub")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CrosspostError::MissingCredential(
                    "User URN not found in the LinkedIn API response".to_string(),
                )
            })?;
        tracing::debug!("LinkedIn member id: {}", sub);
        Ok(sub.to_string())
    }
}

#[async_trait]
impl OAuthHelper for LinkedInOAuth {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::LinkedIn
    }

    fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    async fn authorization_url(&self, redirect_uri: Option<&str>) -> Result<AuthorizationRequest> {
        let client = &self.config.client;
        let url = build_authorize_url(
            &self.endpoints.authorize,
            &[
                ("response_type", "code"),
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", resolve_redirect(redirect_uri, client)),
                ("scope", client.scopes.as_deref().unwrap_or(DEFAULT_SCOPES)),
            ],
        )?;
        tracing::debug!("LinkedIn authorization URL: {}", url);
        Ok(AuthorizationRequest { url, state: None })
    }

    async fn exchange_code(
        &self,
        callback: &AuthorizationCallback,
        redirect_uri: Option<&str>,
    ) -> Result<TokenRecord> {
        let client = &self.config.client;
        tracing::info!("Exchanging LinkedIn authorization code for token");
        request_token(
            &self.api,
            SocialPlatform::LinkedIn,
            &self.endpoints.token,
            &[
                ("grant_type", "authorization_code"),
                ("code", callback.code.as_str()),
                ("redirect_uri", resolve_redirect(redirect_uri, client)),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
            ],
        )
        .await
    }

    async fn enrich(&self, mut record: TokenRecord) -> Result<TokenRecord> {
        record.subject = Some(self.get_user_urn(&record.access_token).await?);
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
