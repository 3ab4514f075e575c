//! Wiring of OAuth helpers and publishers
//!
//! [`Connector`] owns the shared pieces (configuration, HTTP client, token
//! store, content limits) and builds the adapter for a platform on demand.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::http::ApiClient;
use crate::oauth::facebook::FacebookEndpoints;
use crate::oauth::instagram::InstagramEndpoints;
use crate::oauth::linkedin::LinkedInEndpoints;
use crate::oauth::x::XEndpoints;
use crate::oauth::youtube::YouTubeEndpoints;
use crate::oauth::{FacebookOAuth, InstagramOAuth, LinkedInOAuth, OAuthHelper, XOAuth, YouTubeOAuth};
use crate::publish::{
    FacebookPublisher, InstagramPublisher, LinkedInPublisher, Publisher, XPublisher,
    YouTubePublisher,
};
use crate::store::TokenStore;
use crate::types::SocialPlatform;
use crate::validation::{load_limits, ContentValidator, PlatformLimits};

pub struct Connector {
    config: Config,
    store: Arc<dyn TokenStore>,
    api: ApiClient,
    limits: HashMap<SocialPlatform, PlatformLimits>,
    base_url: Option<String>,
}

impl Connector {
    /// Build the shared HTTP client and load the limits table, if configured
    pub fn new(config: Config, store: Arc<dyn TokenStore>) -> Result<Self> {
        let api = ApiClient::new(&config.http)?;

        let limits = match &config.limits_file {
            Some(file) => {
                let path = PathBuf::from(shellexpand::tilde(file).to_string());
                tracing::debug!("Loading platform limits from {}", path.display());
                load_limits(&path)?
            }
            None => HashMap::new(),
        };

        tracing::debug!(
            store = store.backend_name(),
            platforms = ?config.configured_platforms(),
            "Connector ready"
        );

        Ok(Self {
            config,
            store,
            api,
            limits,
            base_url: None,
        })
    }

    /// Point every platform at one base URL instead of the vendor hosts
    ///
    /// Used to run the adapters against a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn validator(&self, platform: SocialPlatform) -> ContentValidator {
        ContentValidator::from_table(platform, &self.limits)
    }

    pub fn oauth_helper(&self, platform: SocialPlatform) -> Result<Arc<dyn OAuthHelper>> {
        let helper: Arc<dyn OAuthHelper> = match platform {
            SocialPlatform::Facebook => self.facebook()?,
            SocialPlatform::Instagram => self.instagram()?,
            SocialPlatform::LinkedIn => self.linkedin()?,
            SocialPlatform::X => self.x()?,
            SocialPlatform::YouTube => self.youtube()?,
        };
        Ok(helper)
    }

    pub fn publisher(&self, platform: SocialPlatform) -> Result<Box<dyn Publisher>> {
        let validator = self.validator(platform);
        let publisher: Box<dyn Publisher> = match platform {
            SocialPlatform::Facebook => {
                Box::new(FacebookPublisher::new(self.facebook()?).with_validator(validator))
            }
            SocialPlatform::Instagram => {
                Box::new(InstagramPublisher::new(self.instagram()?).with_validator(validator))
            }
            SocialPlatform::LinkedIn => {
                Box::new(LinkedInPublisher::new(self.linkedin()?).with_validator(validator))
            }
            SocialPlatform::X => Box::new(XPublisher::new(self.x()?).with_validator(validator)),
            SocialPlatform::YouTube => {
                Box::new(YouTubePublisher::new(self.youtube()?).with_validator(validator))
            }
        };
        Ok(publisher)
    }

    fn facebook(&self) -> Result<Arc<FacebookOAuth>> {
        let mut helper = FacebookOAuth::new(
            self.config.facebook()?.clone(),
            self.api.clone(),
            self.store.clone(),
        );
        if let Some(base) = &self.base_url {
            helper = helper.with_endpoints(FacebookEndpoints::with_base(base));
        }
        Ok(Arc::new(helper))
    }

    fn instagram(&self) -> Result<Arc<InstagramOAuth>> {
        let mut helper = InstagramOAuth::new(
            self.config.instagram()?.clone(),
            self.api.clone(),
            self.store.clone(),
        );
        if let Some(base) = &self.base_url {
            helper = helper.with_endpoints(InstagramEndpoints::with_base(base));
        }
        Ok(Arc::new(helper))
    }

    fn linkedin(&self) -> Result<Arc<LinkedInOAuth>> {
        let mut helper = LinkedInOAuth::new(
            self.config.linkedin()?.clone(),
            self.api.clone(),
            self.store.clone(),
        );
        if let Some(base) = &self.base_url {
            helper = helper.with_endpoints(LinkedInEndpoints::with_base(base));
        }
        Ok(Arc::new(helper))
    }

    fn x(&self) -> Result<Arc<XOAuth>> {
        let mut helper =
            XOAuth::new(self.config.x()?.clone(), self.api.clone(), self.store.clone());
        if let Some(base) = &self.base_url {
            helper = helper.with_endpoints(XEndpoints::with_base(base));
        }
        Ok(Arc::new(helper))
    }

    fn youtube(&self) -> Result<Arc<YouTubeOAuth>> {
        let mut helper = YouTubeOAuth::new(
            self.config.youtube()?.clone(),
            self.api.clone(),
            self.store.clone(),
        );
        if let Some(base) = &self.base_url {
            helper = helper.with_endpoints(YouTubeEndpoints::with_base(base));
        }
        Ok(Arc::new(helper))
    }
}
