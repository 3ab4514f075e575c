//! OAuth helpers
//!
//! One helper per platform manages the token lifecycle: building the
//! authorization URL, exchanging the callback code for tokens, refreshing,
//! and persisting the resulting [`TokenRecord`] in a [`TokenStore`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use libcrosspost::{AuthorizationCallback, Config, Connector, MemoryTokenStore, SocialPlatform};
//!
//! # async fn example() -> libcrosspost::Result<()> {
//! let connector = Connector::new(Config::load()?, Arc::new(MemoryTokenStore::new()))?;
//! let helper = connector.oauth_helper(SocialPlatform::LinkedIn)?;
//!
//! let request = helper.authorization_url(None).await?;
//! println!("Open {}", request.url);
//!
//! let callback = AuthorizationCallback::new("code-from-redirect");
//! helper.complete_authorization("user-1", &callback, None).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::OAuthClientConfig;
use crate::error::{CrosspostError, PlatformError, Result};
use crate::http::ApiClient;
use crate::store::TokenStore;
use crate::types::{SocialPlatform, TokenRecord};

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod signature;
pub mod x;
pub mod youtube;

pub use facebook::FacebookOAuth;
pub use instagram::InstagramOAuth;
pub use linkedin::LinkedInOAuth;
pub use x::XOAuth;
pub use youtube::YouTubeOAuth;

/// Where to send the user, plus the state to expect back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    /// X request token; unused by the OAuth 2.0 platforms
    pub state: Option<String>,
}

/// What the vendor hands back after the user approves access
///
/// For OAuth 2.0 `code` is the authorization code. For X it is the
/// `oauth_verifier` and `state` is the `oauth_token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    pub code: String,
    pub state: Option<String>,
}

impl AuthorizationCallback {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            state: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Parse a redirect URL, or a bare code when the input is not a URL
    ///
    /// Recognizes `code`/`state` as well as `oauth_verifier`/`oauth_token`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CrosspostError::InvalidInput(
                "Authorization code cannot be empty".to_string(),
            ));
        }

        if !(input.starts_with("http://") || input.starts_with("https://")) {
            return Ok(Self::new(input));
        }
        let url = url::Url::parse(input)
            .map_err(|e| CrosspostError::InvalidInput(format!("Invalid redirect URL: {}", e)))?;

        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" | "oauth_verifier" => code = Some(value.into_owned()),
                "state" | "oauth_token" => state = Some(value.into_owned()),
                "error" | "error_description" | "denied" => {
                    return Err(PlatformError::Authentication(format!(
                        "Authorization was denied: {}",
                        value
                    ))
                    .into())
                }
                _ => {}
            }
        }

        let code = code.ok_or_else(|| {
            CrosspostError::InvalidInput(format!("No authorization code in '{}'", input))
        })?;
        Ok(Self { code, state })
    }
}

/// Credentials handed back by a refresh
#[derive(Clone, PartialEq, Eq)]
pub enum AccessGrant {
    Bearer(String),
    OAuth1 { token: String, secret: String },
}

impl AccessGrant {
    pub fn access_token(&self) -> &str {
        match self {
            AccessGrant::Bearer(token) => token,
            AccessGrant::OAuth1 { token, .. } => token,
        }
    }
}

impl std::fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessGrant::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            AccessGrant::OAuth1 { .. } => f.write_str("OAuth1 { .. }"),
        }
    }
}

/// Token lifecycle for one platform
#[async_trait]
pub trait OAuthHelper: Send + Sync {
    fn platform(&self) -> SocialPlatform;

    fn store(&self) -> &Arc<dyn TokenStore>;

    /// Build the URL the user must visit to grant access
    ///
    /// `redirect_uri` overrides the configured one.
    async fn authorization_url(&self, redirect_uri: Option<&str>) -> Result<AuthorizationRequest>;

    /// Trade the callback for tokens. Nothing is stored.
    async fn exchange_code(
        &self,
        callback: &AuthorizationCallback,
        redirect_uri: Option<&str>,
    ) -> Result<TokenRecord>;

    /// Platform-specific data fetched right after the exchange
    async fn enrich(&self, record: TokenRecord) -> Result<TokenRecord> {
        Ok(record)
    }

    /// Produce usable credentials for the user, refreshing where the platform allows
    async fn refresh_token(&self, user_id: &str) -> Result<AccessGrant>;

    async fn save_token(&self, user_id: &str, record: &TokenRecord) -> Result<()> {
        self.store().save(user_id, record).await?;
        tracing::info!(platform = %self.platform(), user_id, "Token saved");
        Ok(())
    }

    async fn get_token(&self, user_id: &str) -> Result<Option<TokenRecord>> {
        self.store().get(user_id, self.platform()).await
    }

    /// Like [`OAuthHelper::get_token`] but a missing record is an error
    async fn require_token(&self, user_id: &str) -> Result<TokenRecord> {
        self.get_token(user_id).await?.ok_or_else(|| {
            CrosspostError::MissingCredential(format!(
                "No {} token stored for user '{}'. Run: xp-auth login {} --user {}",
                self.platform().display_name(),
                user_id,
                self.platform(),
                user_id
            ))
        })
    }

    /// Exchange, enrich and save in one step
    async fn complete_authorization(
        &self,
        user_id: &str,
        callback: &AuthorizationCallback,
        redirect_uri: Option<&str>,
    ) -> Result<TokenRecord> {
        let record = self.exchange_code(callback, redirect_uri).await?;
        let record = self.enrich(record).await?;
        self.save_token(user_id, &record).await?;
        tracing::info!(
            platform = %self.platform(),
            user_id,
            "Authorization completed"
        );
        Ok(record)
    }
}

/// Build an authorization URL with properly encoded query parameters
pub(crate) fn build_authorize_url(base: &str, params: &[(&str, &str)]) -> Result<String> {
    let url = url::Url::parse_with_params(base, params).map_err(|e| {
        CrosspostError::InvalidInput(format!("Invalid authorization endpoint '{}': {}", base, e))
    })?;
    Ok(url.to_string())
}

pub(crate) fn resolve_redirect<'a>(
    given: Option<&'a str>,
    client: &'a OAuthClientConfig,
) -> &'a str {
    given.unwrap_or(&client.redirect_uri)
}

/// POST a form to an OAuth 2.0 token endpoint and parse the record
pub(crate) async fn request_token(
    api: &ApiClient,
    platform: SocialPlatform,
    url: &str,
    form: &[(&str, &str)],
) -> Result<TokenRecord> {
    let response: serde_json::Value = api
        .send_json(platform, "token exchange", api.inner().post(url).form(form))
        .await?;
    TokenRecord::from_oauth2_response(platform, response)
}

/// Stored record's access token as a bearer grant
pub(crate) async fn stored_bearer<H: OAuthHelper + ?Sized>(
    helper: &H,
    user_id: &str,
) -> Result<AccessGrant> {
    let record = helper.require_token(user_id).await?;
    if record.access_token.is_empty() {
        return Err(CrosspostError::MissingCredential(format!(
            "No access token found for user '{}'",
            user_id
        )));
    }
    tracing::debug!(platform = %helper.platform(), user_id, "Using stored access token");
    Ok(AccessGrant::Bearer(record.access_token))
}

/// Refresh-token grant shared by LinkedIn and YouTube
///
/// Vendors may omit `refresh_token` and identity fields in the response, so
/// those are carried over from the previous record before it is replaced.
pub(crate) async fn refresh_with_grant<H: OAuthHelper + ?Sized>(
    helper: &H,
    api: &ApiClient,
    client: &OAuthClientConfig,
    token_url: &str,
    user_id: &str,
) -> Result<AccessGrant> {
    let previous = helper.require_token(user_id).await?;
    let refresh_token = previous.refresh_token.clone().ok_or_else(|| {
        CrosspostError::MissingCredential(format!(
            "No {} refresh token available for user '{}'",
            helper.platform().display_name(),
            user_id
        ))
    })?;

    let mut record = request_token(
        api,
        helper.platform(),
        token_url,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", &refresh_token),
            ("client_id", &client.client_id),
            ("client_secret", &client.client_secret),
        ],
    )
    .await?;

    if record.refresh_token.is_none() {
        record.refresh_token = Some(refresh_token);
    }
    if record.subject.is_none() {
        record.subject = previous.subject;
    }

    helper.save_token(user_id, &record).await?;
    tracing::info!(platform = %helper.platform(), user_id, "Token refreshed");
    Ok(AccessGrant::Bearer(record.access_token))
}
