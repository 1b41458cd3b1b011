//! Persistence: user preferences, URL records and daily quotas.

use async_trait::async_trait;

use crate::core::error::AppResult;
use crate::job::JobStatus;

pub mod db;
pub mod migrations;
pub mod models;
pub mod sqlite;

pub use db::{create_memory_pool, create_pool, get_connection, DbConnection, DbPool};
pub use models::{UploadMode, UrlRecord, User, UserPreferences, UserToggle};
pub use sqlite::SqliteStore;

/// What the pipeline needs from persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Preferences of `user_id`; defaults for an unknown user.
    async fn user_preferences(&self, user_id: i64) -> AppResult<UserPreferences>;

    async fn url_record(&self, url_id: &str) -> AppResult<Option<UrlRecord>>;

    async fn set_url_status(&self, url_id: &str, status: JobStatus) -> AppResult<()>;
}
