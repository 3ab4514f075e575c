//! Facebook OAuth helper
//!
//! Facebook user tokens are long-lived and the Graph API offers no refresh
//! grant for them, so "refreshing" re-reads the stored token. The pages the
//! user manages are captured at authorization time because publishing always
//! happens through a page.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::FacebookConfig;
use crate::error::Result;
use crate::http::ApiClient;
use crate::oauth::{
    build_authorize_url, resolve_redirect, stored_bearer, AccessGrant, AuthorizationCallback,
    AuthorizationRequest, OAuthHelper,
};
use crate::store::TokenStore;
use crate::types::{ManagedPage, SocialPlatform, TokenRecord};

const DEFAULT_SCOPES: &str = "public_profile,email,pages_manage_posts,pages_read_engagement";

/// Facebook dialog and Graph API locations
#[derive(Debug, Clone)]
pub struct FacebookEndpoints {
    pub dialog: String,
    /// Graph API root including the version, without trailing slash
    pub graph: String,
}

impl Default for FacebookEndpoints {
    fn default() -> Self {
        Self {
            dialog: "https://www.facebook.com/v11.0/dialog/oauth".to_string(),
            graph: "https://graph.facebook.com/v11.0".to_string(),
        }
    }
}

impl FacebookEndpoints {
    /// Every endpoint rooted at `base`, for pointing at a test server
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            dialog: format!("{}/dialog/oauth", base),
            graph: base.to_string(),
        }
    }

    pub fn graph_url(&self, path: &str) -> String {
        format!("{}/{}", self.graph, path.trim_start_matches('/'))
    }
}

#[derive(Deserialize)]
struct PagesResponse {
    #[serde(default)]
    data: Vec<ManagedPage>,
}

pub struct FacebookOAuth {
    config: FacebookConfig,
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    endpoints: FacebookEndpoints,
}

impl FacebookOAuth {
    pub fn new(config: FacebookConfig, api: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            config,
            api,
            store,
            endpoints: FacebookEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: FacebookEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints(&self) -> &FacebookEndpoints {
        &self.endpoints
    }

    pub fn config(&self) -> &FacebookConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Pages the user manages, with their page access tokens
    pub async fn fetch_user_pages(&self, access_token: &str) -> Result<Vec<ManagedPage>> {
        let request = self
            .api
            .inner()
            .get(self.endpoints.graph_url("me/accounts"))
            .query(&[("access_token", access_token)]);
        let pages: PagesResponse = self
            .api
            .send_json(SocialPlatform::Facebook, "page listing", request)
            .await?;
        tracing::debug!(count = pages.data.len(), "Fetched Facebook pages");
        Ok(pages.data)
    }
}

#[async_trait]
impl OAuthHelper for FacebookOAuth {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Facebook
    }

    fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    async fn authorization_url(&self, redirect_uri: Option<&str>) -> Result<AuthorizationRequest> {
        let client = &self.config.client;
        let url = build_authorize_url(
            &self.endpoints.dialog,
            &[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", resolve_redirect(redirect_uri, client)),
                ("scope", client.scopes.as_deref().unwrap_or(DEFAULT_SCOPES)),
                ("response_type", "code"),
            ],
        )?;
        tracing::debug!("Facebook authorization URL: {}", url);
        Ok(AuthorizationRequest { url, state: None })
    }

    async fn exchange_code(
        &self,
        callback: &AuthorizationCallback,
        redirect_uri: Option<&str>,
    ) -> Result<TokenRecord> {
        let client = &self.config.client;
        let request = self
            .api
            .inner()
            .get(self.endpoints.graph_url("oauth/access_token"))
            .query(&[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", resolve_redirect(redirect_uri, client)),
                ("client_secret", client.client_secret.as_str()),
                ("code", callback.code.as_str()),
            ]);
        let response: serde_json::Value = self
            .api
            .send_json(SocialPlatform::Facebook, "token exchange", request)
            .await?;
        tracing::info!("Facebook token exchange successful");
        TokenRecord::from_oauth2_response(SocialPlatform::Facebook, response)
    }

    async fn enrich(&self, mut record: TokenRecord) -> Result<TokenRecord> {
        record.pages = self.fetch_user_pages(&record.access_token).await?;
        Ok(record)
    }

    async fn refresh_token(&self, user_id: &str) -> Result<AccessGrant> {
        stored_bearer(self, user_id).await
    }
}
