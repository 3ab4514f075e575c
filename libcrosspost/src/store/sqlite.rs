//! SQLite-backed token store

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::{Result, StoreError};
use crate::store::{pending_cutoff, TokenStore};
use crate::types::{PendingAuthorization, SocialPlatform, TokenRecord};

#[derive(Clone)]
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
            }
        }

        // Forward slashes work on both Windows and Unix; mode=rwc creates the file
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        tracing::debug!("Opened token store at {}", expanded_path);

        Ok(Self { pool })
    }

    fn pending_from_row(row: Option<SqliteRow>) -> Result<Option<PendingAuthorization>> {
        row.map(|row| {
            let document: String = row.get("document");
            serde_json::from_str(&document).map_err(|e| StoreError::Document(e).into())
        })
        .transpose()
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn get(&self, user_id: &str, platform: SocialPlatform) -> Result<Option<TokenRecord>> {
        let row = sqlx::query(
            r#"
            SELECT document FROM token_records
            WHERE user_id = ? AND platform = ?
            "#,
        )
        .bind(user_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        match row {
            Some(row) => {
                let document: String = row.get("document");
                let record = serde_json::from_str(&document).map_err(StoreError::Document)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, user_id: &str, record: &TokenRecord) -> Result<()> {
        let document = serde_json::to_string(record).map_err(StoreError::Document)?;

        sqlx::query(
            r#"
            INSERT INTO token_records (user_id, platform, document, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, platform) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(record.platform.as_str())
        .bind(document)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    async fn delete(&self, user_id: &str, platform: SocialPlatform) -> Result<()> {
        sqlx::query("DELETE FROM token_records WHERE user_id = ? AND platform = ?")
            .bind(user_id)
            .bind(platform.as_str())
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    async fn list_users(&self, platform: SocialPlatform) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT user_id FROM token_records WHERE platform = ? ORDER BY user_id",
        )
        .bind(platform.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(rows.iter().map(|r| r.get("user_id")).collect())
    }

    async fn save_pending(&self, pending: &PendingAuthorization) -> Result<()> {
        let document = serde_json::to_string(pending).map_err(StoreError::Document)?;
        let mut tx = self.pool.begin().await.map_err(StoreError::SqlxError)?;

        sqlx::query("DELETE FROM pending_authorizations WHERE created_at < ?")
            .bind(pending_cutoff())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO pending_authorizations (state, platform, document, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&pending.state)
        .bind(pending.platform.as_str())
        .bind(document)
        .bind(pending.created_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::SqlxError)?;

        tx.commit().await.map_err(StoreError::SqlxError)?;
        Ok(())
    }

    async fn get_pending(
        &self,
        platform: SocialPlatform,
        state: &str,
    ) -> Result<Option<PendingAuthorization>> {
        let row = sqlx::query(
            r#"
            SELECT document FROM pending_authorizations
            WHERE platform = ? AND state = ? AND created_at >= ?
            "#,
        )
        .bind(platform.as_str())
        .bind(state)
        .bind(pending_cutoff())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Self::pending_from_row(row)
    }

    async fn latest_pending(
        &self,
        platform: SocialPlatform,
    ) -> Result<Option<PendingAuthorization>> {
        let row = sqlx::query(
            r#"
            SELECT document FROM pending_authorizations
            WHERE platform = ? AND created_at >= ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(platform.as_str())
        .bind(pending_cutoff())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Self::pending_from_row(row)
    }

    async fn take_pending(
        &self,
        platform: SocialPlatform,
        state: &str,
    ) -> Result<Option<PendingAuthorization>> {
        // One statement, so two concurrent callers cannot both see the row
        let row = sqlx::query(
            r#"
            DELETE FROM pending_authorizations
            WHERE platform = ? AND state = ?
            RETURNING document
            "#,
        )
        .bind(platform.as_str())
        .bind(state)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Self::pending_from_row(row)
    }

    fn backend_name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PENDING_TTL_SECS;
    use tempfile::TempDir;

    async fn setup_store() -> (SqliteTokenStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("tokens.db");
        let store = SqliteTokenStore::new(db_path.to_str().unwrap()).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let (store, _dir) = setup_store().await;

        let mut record = TokenRecord::new(SocialPlatform::LinkedIn, "AQV-token");
        record.refresh_token = Some("AQX-refresh".to_string());
        record.subject = Some("abc123".to_string());
        store.save("user-1", &record).await.unwrap();

        let loaded = store.get("user-1", SocialPlatform::LinkedIn).await.unwrap();
        assert_eq!(loaded, Some(record));
        assert!(store.get("user-1", SocialPlatform::X).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_document() {
        let (store, _dir) = setup_store().await;

        let mut first = TokenRecord::new(SocialPlatform::YouTube, "old");
        first.refresh_token = Some("refresh".to_string());
        store.save("u", &first).await.unwrap();
        store
            .save("u", &TokenRecord::new(SocialPlatform::YouTube, "new"))
            .await
            .unwrap();

        let loaded = store.get("u", SocialPlatform::YouTube).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "new");
        assert_eq!(loaded.refresh_token, None);
        assert_eq!(store.list_users(SocialPlatform::YouTube).await.unwrap(), vec!["u"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _dir) = setup_store().await;
        store
            .save("u", &TokenRecord::new(SocialPlatform::Facebook, "t"))
            .await
            .unwrap();
        store.delete("u", SocialPlatform::Facebook).await.unwrap();
        assert!(store.get("u", SocialPlatform::Facebook).await.unwrap().is_none());
    }

    fn pending(state: &str, created_at: i64) -> PendingAuthorization {
        PendingAuthorization {
            platform: SocialPlatform::X,
            state: state.to_string(),
            token_secret: "s".to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_pending_authorizations() {
        let (store, _dir) = setup_store().await;
        let now = chrono::Utc::now().timestamp();

        store.save_pending(&pending("first", now - 20)).await.unwrap();
        store.save_pending(&pending("second", now - 10)).await.unwrap();

        // Lookups leave the entry in place
        for _ in 0..2 {
            let found = store.get_pending(SocialPlatform::X, "first").await.unwrap();
            assert_eq!(found.unwrap().state, "first");
        }

        let taken = store.take_pending(SocialPlatform::X, "first").await.unwrap();
        assert_eq!(taken.unwrap().state, "first");
        assert!(store.take_pending(SocialPlatform::X, "first").await.unwrap().is_none());
        assert!(store.get_pending(SocialPlatform::X, "first").await.unwrap().is_none());

        let latest = store.latest_pending(SocialPlatform::X).await.unwrap();
        assert_eq!(latest.unwrap().state, "second");
    }

    #[tokio::test]
    async fn test_expired_pending_is_ignored_and_pruned() {
        let (store, _dir) = setup_store().await;
        let now = chrono::Utc::now().timestamp();

        store
            .save_pending(&pending("stale", now - PENDING_TTL_SECS - 1))
            .await
            .unwrap();
        assert!(store.get_pending(SocialPlatform::X, "stale").await.unwrap().is_none());
        assert!(store.latest_pending(SocialPlatform::X).await.unwrap().is_none());

        store.save_pending(&pending("fresh", now)).await.unwrap();
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_authorizations")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn test_concurrent_take_pending_has_one_winner() {
        let (store, _dir) = setup_store().await;
        let now = chrono::Utc::now().timestamp();
        store.save_pending(&pending("contested", now)).await.unwrap();

        let (a, b) = tokio::join!(
            store.take_pending(SocialPlatform::X, "contested"),
            store.take_pending(SocialPlatform::X, "contested"),
        );
        let winners = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|taken| taken.is_some())
            .count();
        assert_eq!(winners, 1);
    }
}
