//! [`JobStore`] and bot-facing store operations over the SQLite pool.
//!
//! rusqlite is blocking, so every call hops onto the blocking pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::error::{AppError, AppResult};
use crate::job::JobStatus;
use crate::storage::db::{self, DbPool};
use crate::storage::models::{UploadMode, UrlRecord, User, UserPreferences, UserToggle};
use crate::storage::JobStore;

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db::get_connection(&pool)?;
            f(&*conn).map_err(AppError::from)
        })
        .await?
    }

    pub async fn add_user(&self, user_id: i64, username: Option<String>) -> AppResult<()> {
        self.with_conn(move |c| db::add_user(c, user_id, username.as_deref())).await
    }

    pub async fn get_user(&self, user_id: i64) -> AppResult<Option<User>> {
        let now = Utc::now();
        self.with_conn(move |c| db::get_user(c, user_id, now)).await
    }

    pub async fn set_upload_mode(&self, user_id: i64, mode: UploadMode) -> AppResult<()> {
        self.with_conn(move |c| db::set_upload_mode(c, user_id, mode)).await
    }

    pub async fn toggle_setting(&self, user_id: i64, toggle: UserToggle) -> AppResult<Option<bool>> {
        self.with_conn(move |c| db::toggle_setting(c, user_id, toggle)).await
    }

    pub async fn set_thumbnail(&self, user_id: i64, file_ref: Option<String>) -> AppResult<()> {
        self.with_conn(move |c| db::set_thumbnail(c, user_id, file_ref.as_deref())).await
    }

    pub async fn set_caption(&self, user_id: i64, caption: String) -> AppResult<()> {
        self.with_conn(move |c| db::set_caption(c, user_id, &caption)).await
    }

    pub async fn clear_caption(&self, user_id: i64) -> AppResult<()> {
        self.with_conn(move |c| db::clear_caption(c, user_id)).await
    }

    pub async fn set_banned(&self, user_id: i64, banned: bool) -> AppResult<()> {
        self.with_conn(move |c| db::set_banned(c, user_id, banned)).await
    }

    pub async fn set_paid(&self, user_id: i64, is_paid: bool, expiry: Option<DateTime<Utc>>) -> AppResult<()> {
        let now = Utc::now();
        self.with_conn(move |c| db::set_paid(c, user_id, is_paid, expiry, now)).await
    }

    pub async fn paid_users(&self) -> AppResult<Vec<User>> {
        let now = Utc::now();
        self.with_conn(move |c| db::paid_users(c, now)).await
    }

    pub async fn store_url(&self, url_id: String, url: String, user_id: i64) -> AppResult<()> {
        self.with_conn(move |c| db::store_url(c, &url_id, &url, user_id)).await
    }

    pub async fn track_daily_task(&self, user_id: i64) -> AppResult<u32> {
        let today = Utc::now().date_naive();
        self.with_conn(move |c| db::track_daily_task(c, user_id, today)).await
    }

    pub async fn daily_task_count(&self, user_id: i64) -> AppResult<u32> {
        let today = Utc::now().date_naive();
        self.with_conn(move |c| db::daily_task_count(c, user_id, today)).await
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn user_preferences(&self, user_id: i64) -> AppResult<UserPreferences> {
        Ok(self.get_user(user_id).await?.map(|u| u.preferences).unwrap_or_default())
    }

    async fn url_record(&self, url_id: &str) -> AppResult<Option<UrlRecord>> {
        let url_id = url_id.to_string();
        self.with_conn(move |c| db::get_url(c, &url_id)).await
    }

    async fn set_url_status(&self, url_id: &str, status: JobStatus) -> AppResult<()> {
        let url_id = url_id.to_string();
        let found = self.with_conn(move |c| db::update_url_status(c, &url_id, status)).await?;
        if !found {
            log::debug!("status {} for unknown url record", status);
        }
        Ok(())
    }
}
