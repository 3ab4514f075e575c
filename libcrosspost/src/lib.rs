//! Crosspost - publish content to social platforms
//!
//! This library handles the OAuth token lifecycle and the media publishing
//! protocols of Facebook, Instagram, LinkedIn, X and YouTube.

pub mod config;
pub mod error;
pub mod factory;
pub mod http;
pub mod logging;
pub mod oauth;
pub mod publish;
pub mod store;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{CrosspostError, Result};
pub use factory::Connector;
pub use oauth::{AccessGrant, AuthorizationCallback, AuthorizationRequest, OAuthHelper};
pub use publish::Publisher;
pub use store::{MemoryTokenStore, SqliteTokenStore, TokenStore};
pub use types::{Attachment, Content, MediaKind, PublishReceipt, SocialPlatform, TokenRecord};
