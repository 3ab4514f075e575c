//! Token persistence
//!
//! Token records are opaque documents keyed by `(user_id, platform)`.
//! `save` replaces the whole document; there is no partial update.
//!
//! Pending OAuth 1.0a authorizations live for [`PENDING_TTL_SECS`]. Older
//! entries are invisible to lookups and pruned on the next `save_pending`.
//!
//! Two backends are provided:
//! - [`SqliteTokenStore`]: durable storage in a local SQLite file
//! - [`MemoryTokenStore`]: process-local storage for tests and embedding

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::types::{PendingAuthorization, SocialPlatform, TokenRecord};

mod sqlite;

pub use sqlite::SqliteTokenStore;

/// How long a request token waits for the user's approval
pub const PENDING_TTL_SECS: i64 = 60 * 60;

/// Oldest `created_at` still considered pending
pub(crate) fn pending_cutoff() -> i64 {
    chrono::Utc::now().timestamp() - PENDING_TTL_SECS
}

/// Storage backend for token records and pending OAuth 1.0a authorizations
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch the token record for a user on a platform
    async fn get(&self, user_id: &str, platform: SocialPlatform) -> Result<Option<TokenRecord>>;

    /// Store a token record, replacing any previous document
    async fn save(&self, user_id: &str, record: &TokenRecord) -> Result<()>;

    /// Remove a token record. Deleting a missing record is not an error.
    async fn delete(&self, user_id: &str, platform: SocialPlatform) -> Result<()>;

    /// Users holding a token for the platform, sorted
    async fn list_users(&self, platform: SocialPlatform) -> Result<Vec<String>>;

    /// Remember a request token until the user comes back with a verifier.
    /// Expired entries are pruned.
    async fn save_pending(&self, pending: &PendingAuthorization) -> Result<()>;

    /// The unexpired pending authorization with the given state, left in place
    async fn get_pending(
        &self,
        platform: SocialPlatform,
        state: &str,
    ) -> Result<Option<PendingAuthorization>>;

    /// The most recently created unexpired pending authorization, left in place
    async fn latest_pending(
        &self,
        platform: SocialPlatform,
    ) -> Result<Option<PendingAuthorization>>;

    /// Atomically remove and return the pending authorization with the given
    /// state. Only one of several concurrent callers gets `Some`.
    async fn take_pending(
        &self,
        platform: SocialPlatform,
        state: &str,
    ) -> Result<Option<PendingAuthorization>>;

    /// Backend identifier for logs
    fn backend_name(&self) -> &str;
}

/// In-memory token store
#[derive(Default)]
pub struct MemoryTokenStore {
    records: Mutex<HashMap<(String, SocialPlatform), TokenRecord>>,
    pending: Mutex<Vec<PendingAuthorization>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, user_id: &str, platform: SocialPlatform) -> Result<Option<TokenRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(&(user_id.to_string(), platform)).cloned())
    }

    async fn save(&self, user_id: &str, record: &TokenRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        records.insert((user_id.to_string(), record.platform), record.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str, platform: SocialPlatform) -> Result<()> {
        let mut records = self.records.lock().await;
        records.remove(&(user_id.to_string(), platform));
        Ok(())
    }

    async fn list_users(&self, platform: SocialPlatform) -> Result<Vec<String>> {
        let records = self.records.lock().await;
        let mut users: Vec<String> = records
            .keys()
            .filter(|(_, p)| *p == platform)
            .map(|(user, _)| user.clone())
            .collect();
        users.sort();
        Ok(users)
    }

    async fn save_pending(&self, pending: &PendingAuthorization) -> Result<()> {
        let cutoff = pending_cutoff();
        let mut all = self.pending.lock().await;
        all.retain(|p| {
            p.created_at >= cutoff && !(p.platform == pending.platform && p.state == pending.state)
        });
        all.push(pending.clone());
        Ok(())
    }

    async fn get_pending(
        &self,
        platform: SocialPlatform,
        state: &str,
    ) -> Result<Option<PendingAuthorization>> {
        let cutoff = pending_cutoff();
        let all = self.pending.lock().await;
        Ok(all
            .iter()
            .find(|p| p.platform == platform && p.state == state && p.created_at >= cutoff)
            .cloned())
    }

    async fn latest_pending(
        &self,
        platform: SocialPlatform,
    ) -> Result<Option<PendingAuthorization>> {
        let cutoff = pending_cutoff();
        let all = self.pending.lock().await;
        // Later insertions win ties on created_at
        Ok(all
            .iter()
            .enumerate()
            .filter(|(_, p)| p.platform == platform && p.created_at >= cutoff)
            .max_by_key(|(i, p)| (p.created_at, *i))
            .map(|(_, p)| p.clone()))
    }

    async fn take_pending(
        &self,
        platform: SocialPlatform,
        state: &str,
    ) -> Result<Option<PendingAuthorization>> {
        let mut all = self.pending.lock().await;
        let position = all
            .iter()
            .position(|p| p.platform == platform && p.state == state);
        Ok(position.map(|i| all.remove(i)))
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
