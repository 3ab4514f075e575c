//! X (Twitter) three-legged OAuth 1.0a helper
//!
//! 1. `authorization_url` obtains a request token and stores it as a
//!    [`PendingAuthorization`] keyed by the token itself.
//! 2. The user approves and comes back with `oauth_token` + `oauth_verifier`.
//! 3. `exchange_code` trades the pending request token for an access token.
//!    The pending entry is only consumed once X has issued the access token,
//!    so a failed exchange can be retried with the same callback.
//!
//! X access tokens do not expire, so refreshing returns the stored pair.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;

use crate::config::XConfig;
use crate::error::{CrosspostError, PlatformError, Result};
use crate::http::ApiClient;
use crate::oauth::signature::OAuth1Signer;
use crate::oauth::{AccessGrant, AuthorizationCallback, AuthorizationRequest, OAuthHelper};
use crate::store::TokenStore;
use crate::types::{PendingAuthorization, SocialPlatform, TokenRecord};

#[derive(Debug, Clone)]
pub struct XEndpoints {
    pub request_token: String,
    pub authorize: String,
    pub access_token: String,
    /// REST API v1.1 root
    pub api: String,
    /// Media upload v1.1 root
    pub upload: String,
}

impl Default for XEndpoints {
    fn default() -> Self {
        Self {
            request_token: "https://api.twitter.com/oauth/request_token".to_string(),
            authorize: "https://api.twitter.com/oauth/authorize".to_string(),
            access_token: "https://api.twitter.com/oauth/access_token".to_string(),
            api: "https://api.twitter.com/1.1".to_string(),
            upload: "https://upload.twitter.com/1.1".to_string(),
        }
    }
}

impl XEndpoints {
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            request_token: format!("{}/oauth/request_token", base),
            authorize: format!("{}/oauth/authorize", base),
            access_token: format!("{}/oauth/access_token", base),
            api: format!("{}/1.1", base),
            upload: format!("{}/1.1", base),
        }
    }
}

pub struct XOAuth {
    config: XConfig,
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    endpoints: XEndpoints,
}

impl XOAuth {
    pub fn new(config: XConfig, api: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            config,
            api,
            store,
            endpoints: XEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: XEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints(&self) -> &XEndpoints {
        &self.endpoints
    }

    pub fn config(&self) -> &XConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Signer holding only the consumer credentials
    pub fn consumer_signer(&self) -> OAuth1Signer {
        OAuth1Signer::new(&self.config.api_key, &self.config.api_secret)
    }

    /// Signer acting on behalf of a user
    pub fn user_signer(&self, grant: &AccessGrant) -> Result<OAuth1Signer> {
        match grant {
            AccessGrant::OAuth1 { token, secret } => {
                Ok(self.consumer_signer().with_token(token, secret))
            }
            AccessGrant::Bearer(_) => Err(CrosspostError::MissingCredential(
                "X requires an OAuth 1.0a token and secret".to_string(),
            )),
        }
    }

    /// POST to an OAuth endpoint and parse the form-encoded reply
    async fn token_request(
        &self,
        signer: &OAuth1Signer,
        url: &str,
        oauth_extra: &[(&str, &str)],
        context: &str,
    ) -> Result<HashMap<String, String>> {
        let header = signer.authorization_header("POST", url, &[], oauth_extra)?;
        let response = self
            .api
            .send(
                SocialPlatform::X,
                context,
                self.api.inner().post(url).header(AUTHORIZATION, header),
            )
            .await?;
        let body = response.text().await.map_err(|e| {
            PlatformError::Network(format!("X {} response could not be read: {}", context, e))
        })?;
        Ok(url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect())
    }
}

fn required(fields: &mut HashMap<String, String>, key: &str, context: &str) -> Result<String> {
    fields
        .remove(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            PlatformError::Authentication(format!("X {} response has no {}", context, key)).into()
        })
}

#[async_trait]
impl OAuthHelper for XOAuth {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::X
    }

    fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    async fn authorization_url(&self, redirect_uri: Option<&str>) -> Result<AuthorizationRequest> {
        let callback = redirect_uri.unwrap_or(&self.config.callback_uri);
        let mut fields = self
            .token_request(
                &self.consumer_signer(),
                &self.endpoints.request_token,
                &[("oauth_callback", callback)],
                "request token",
            )
            .await?;

        let token = required(&mut fields, "oauth_token", "request token")?;
        let secret = required(&mut fields, "oauth_token_secret", "request token")?;

        self.store
            .save_pending(&PendingAuthorization {
                platform: SocialPlatform::X,
                state: token.clone(),
                token_secret: secret,
                created_at: chrono::Utc::now().timestamp(),
            })
            .await?;

        let url = crate::oauth::build_authorize_url(
            &self.endpoints.authorize,
            &[("oauth_token", token.as_str())],
        )?;
        tracing::debug!("X authorization URL: {}", url);
        Ok(AuthorizationRequest {
            url,
            state: Some(token),
        })
    }

    async fn exchange_code(
        &self,
        callback: &AuthorizationCallback,
        _redirect_uri: Option<&str>,
    ) -> Result<TokenRecord> {
        let pending = match &callback.state {
            Some(state) => self.store.get_pending(SocialPlatform::X, state).await?,
            None => self.store.latest_pending(SocialPlatform::X).await?,
        }
        .ok_or_else(|| {
            CrosspostError::MissingCredential(
                "No pending X authorization found. Request an authorization URL first".to_string(),
            )
        })?;

        let signer = self
            .consumer_signer()
            .with_token(&pending.state, &pending.token_secret);
        let mut fields = self
            .token_request(
                &signer,
                &self.endpoints.access_token,
                &[("oauth_verifier", callback.code.as_str())],
                "access token",
            )
            .await?;

        let token = required(&mut fields, "oauth_token", "access token")?;
        let secret = required(&mut fields, "oauth_token_secret", "access token")?;

        // X has spent the request token; drop it
        self.store
            .take_pending(SocialPlatform::X, &pending.state)
            .await?;

        let mut record = TokenRecord::new(SocialPlatform::X, token);
        record.token_secret = Some(secret);
        record.subject = fields.remove("user_id");
        record.extra = fields
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();

        tracing::info!("X access token obtained");
        Ok(record)
    }

    async fn refresh_token(&self, user_id: &str) -> Result<AccessGrant> {
        let record = self.require_token(user_id).await?;
        let secret = record
            .token_secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CrosspostError::MissingCredential(format!(
                    "No X access token secret stored for user '{}'",
                    user_id
                ))
            })?;
        Ok(AccessGrant::OAuth1 {
            token: record.access_token,
            secret,
        })
    }
}
