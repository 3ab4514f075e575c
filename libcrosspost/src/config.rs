//! Configuration management for Crosspost

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::types::SocialPlatform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Optional JSON file overriding the built-in per-platform content limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits_file: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<FacebookConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<InstagramConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<LinkedInConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<XConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<YouTubeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/crosspost/tokens.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("crosspost/{}", env!("CARGO_PKG_VERSION"))
}

/// Client registration shared by the OAuth 2.0 platforms
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Overrides the platform's default scope list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    #[serde(flatten)]
    pub client: OAuthClientConfig,
    /// Page id or name to post to when the user manages several pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    #[serde(flatten)]
    pub client: OAuthClientConfig,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_max_poll_attempts() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    #[serde(flatten)]
    pub client: OAuthClientConfig,
    /// Value of the `LinkedIn-Version` header for the versioned REST API
    #[serde(default = "default_linkedin_version")]
    pub api_version: String,
}

fn default_linkedin_version() -> String {
    "202307".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct XConfig {
    pub api_key: String,
    pub api_secret: String,
    /// `oauth_callback` sent with the request token; "oob" for PIN-based flow
    #[serde(default = "default_x_callback")]
    pub callback_uri: String,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

fn default_x_callback() -> String {
    "oob".to_string()
}

impl std::fmt::Debug for XConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("callback_uri", &self.callback_uri)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    #[serde(flatten)]
    pub client: OAuthClientConfig,
    #[serde(default = "default_privacy_status")]
    pub privacy_status: String,
    /// Video description; the post text is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

fn default_privacy_status() -> String {
    "public".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path, then apply environment overrides
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let mut config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        let client = |platform: SocialPlatform| OAuthClientConfig {
            client_id: format!("YOUR_{}_CLIENT_ID", platform.as_str().to_uppercase()),
            client_secret: format!("YOUR_{}_CLIENT_SECRET", platform.as_str().to_uppercase()),
            redirect_uri: "http://localhost:8080/callback".to_string(),
            scopes: None,
        };

        Self {
            limits_file: None,
            store: StoreConfig::default(),
            http: HttpConfig::default(),
            facebook: Some(FacebookConfig {
                client: client(SocialPlatform::Facebook),
                page: None,
            }),
            instagram: Some(InstagramConfig {
                client: client(SocialPlatform::Instagram),
                poll_interval_ms: default_poll_interval_ms(),
                max_poll_attempts: default_max_poll_attempts(),
            }),
            linkedin: Some(LinkedInConfig {
                client: client(SocialPlatform::LinkedIn),
                api_version: default_linkedin_version(),
            }),
            x: Some(XConfig {
                api_key: "YOUR_X_API_KEY".to_string(),
                api_secret: "YOUR_X_API_SECRET".to_string(),
                callback_uri: default_x_callback(),
                max_poll_attempts: default_max_poll_attempts(),
            }),
            youtube: Some(YouTubeConfig {
                client: client(SocialPlatform::YouTube),
                privacy_status: default_privacy_status(),
                description: None,
                tags: Vec::new(),
                category_id: None,
            }),
        }
    }

    /// Replace client credentials with `CROSSPOST_<PLATFORM>_*` environment values
    ///
    /// Overrides only apply to sections present in the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(fb) = self.facebook.as_mut() {
            override_client(&mut fb.client, SocialPlatform::Facebook);
        }
        if let Some(ig) = self.instagram.as_mut() {
            override_client(&mut ig.client, SocialPlatform::Instagram);
        }
        if let Some(li) = self.linkedin.as_mut() {
            override_client(&mut li.client, SocialPlatform::LinkedIn);
        }
        if let Some(yt) = self.youtube.as_mut() {
            override_client(&mut yt.client, SocialPlatform::YouTube);
        }
        if let Some(x) = self.x.as_mut() {
            override_field(&mut x.api_key, "CROSSPOST_X_API_KEY");
            override_field(&mut x.api_secret, "CROSSPOST_X_API_SECRET");
            override_field(&mut x.callback_uri, "CROSSPOST_X_CALLBACK_URI");
        }
    }

    pub fn facebook(&self) -> Result<&FacebookConfig> {
        self.facebook.as_ref().ok_or_else(|| missing_section("facebook"))
    }

    pub fn instagram(&self) -> Result<&InstagramConfig> {
        self.instagram.as_ref().ok_or_else(|| missing_section("instagram"))
    }

    pub fn linkedin(&self) -> Result<&LinkedInConfig> {
        self.linkedin.as_ref().ok_or_else(|| missing_section("linkedin"))
    }

    pub fn x(&self) -> Result<&XConfig> {
        self.x.as_ref().ok_or_else(|| missing_section("x"))
    }

    pub fn youtube(&self) -> Result<&YouTubeConfig> {
        self.youtube.as_ref().ok_or_else(|| missing_section("youtube"))
    }

    /// Platforms with a config section
    pub fn configured_platforms(&self) -> Vec<SocialPlatform> {
        SocialPlatform::ALL
            .into_iter()
            .filter(|p| match p {
                SocialPlatform::Facebook => self.facebook.is_some(),
                SocialPlatform::Instagram => self.instagram.is_some(),
                SocialPlatform::LinkedIn => self.linkedin.is_some(),
                SocialPlatform::X => self.x.is_some(),
                SocialPlatform::YouTube => self.youtube.is_some(),
            })
            .collect()
    }
}

fn missing_section(name: &str) -> crate::CrosspostError {
    ConfigError::MissingField(format!("[{}] section", name)).into()
}

fn override_client(client: &mut OAuthClientConfig, platform: SocialPlatform) {
    let prefix = format!("CROSSPOST_{}", platform.as_str().to_uppercase());
    override_field(&mut client.client_id, &format!("{}_CLIENT_ID", prefix));
    override_field(&mut client.client_secret, &format!("{}_CLIENT_SECRET", prefix));
    override_field(&mut client.redirect_uri, &format!("{}_REDIRECT_URI", prefix));
}

fn override_field(field: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            *field = value;
        }
    }
}

/// Resolve the configuration file path under the XDG config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSPOST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosspost").join("config.toml"))
}
