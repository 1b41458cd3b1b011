use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::core::error::AppResult;
use crate::job::JobStatus;
use crate::storage::migrations::run_migrations;
use crate::storage::models::{UploadMode, UrlRecord, User, UserPreferences, UserToggle};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const USER_COLUMNS: &str = "user_id, username, upload_mode, split_enabled, caption, caption_enabled, thumbnail, \
     generate_screenshots, generate_sample_video, banned, is_paid, subscription_start, paid_expiry";

/// Create a new database connection pool
///
/// Initializes a pool of up to 10 connections and brings the schema up to date.
pub fn create_pool(database_path: &Path) -> AppResult<DbPool> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;"));
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;
    log::info!("database ready at {}", database_path.display());
    Ok(pool)
}

/// Single-connection in-memory pool with the schema applied. Used by tests
/// and by dry runs; the connection is never recycled so the data survives.
pub fn create_memory_pool() -> AppResult<DbPool> {
    let pool = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(SqliteConnectionManager::memory())?;
    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;
    Ok(pool)
}

/// Get a connection from the pool
pub fn get_connection(pool: &DbPool) -> std::result::Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn parse_time(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn user_from_row(row: &Row<'_>) -> Result<User> {
    let upload_mode: String = row.get(2)?;
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        preferences: UserPreferences {
            upload_mode: UploadMode::from_str(&upload_mode).unwrap_or_default(),
            split_enabled: row.get(3)?,
            caption: row.get(4)?,
            caption_enabled: row.get(5)?,
            thumbnail: row.get(6)?,
            generate_screenshots: row.get(7)?,
            generate_sample_video: row.get(8)?,
        },
        banned: row.get(9)?,
        is_paid: row.get(10)?,
        subscription_start: parse_time(row.get(11)?),
        paid_expiry: parse_time(row.get(12)?),
    })
}

/// Inserts the user with default preferences, or refreshes the username of an existing one.
pub fn add_user(conn: &Connection, user_id: i64, username: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO users (user_id, username) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET username = COALESCE(excluded.username, users.username)",
        params![user_id, username],
    )?;
    Ok(())
}

/// Loads a user. A paid flag whose expiry has passed is cleared on the way.
pub fn get_user(conn: &Connection, user_id: i64, now: DateTime<Utc>) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS);
    let Some(mut user) = conn.query_row(&sql, [user_id], user_from_row).optional()? else {
        return Ok(None);
    };

    if user.is_paid && !user.has_active_subscription(now) {
        conn.execute("UPDATE users SET is_paid = 0 WHERE user_id = ?1", [user_id])?;
        user.is_paid = false;
        log::info!("User {} paid subscription has expired", user_id);
    }
    Ok(Some(user))
}

pub fn set_upload_mode(conn: &Connection, user_id: i64, mode: UploadMode) -> Result<()> {
    conn.execute(
        "UPDATE users SET upload_mode = ?1 WHERE user_id = ?2",
        params![mode.to_string(), user_id],
    )?;
    Ok(())
}

/// Flips a boolean preference and returns its new value (`None` for an unknown user).
pub fn toggle_setting(conn: &Connection, user_id: i64, toggle: UserToggle) -> Result<Option<bool>> {
    let column = toggle.column();
    let sql = format!(
        "UPDATE users SET {column} = CASE {column} WHEN 0 THEN 1 ELSE 0 END WHERE user_id = ?1 RETURNING {column}"
    );
    conn.query_row(&sql, [user_id], |row| row.get(0)).optional()
}

pub fn set_thumbnail(conn: &Connection, user_id: i64, file_ref: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE users SET thumbnail = ?1 WHERE user_id = ?2",
        params![file_ref, user_id],
    )?;
    Ok(())
}

/// Stores the caption and switches captions on.
pub fn set_caption(conn: &Connection, user_id: i64, caption: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET caption = ?1, caption_enabled = 1 WHERE user_id = ?2",
        params![caption, user_id],
    )?;
    Ok(())
}

pub fn clear_caption(conn: &Connection, user_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET caption = NULL, caption_enabled = 0 WHERE user_id = ?1",
        [user_id],
    )?;
    Ok(())
}

/// Bans or unbans; unknown users get a row so the ban sticks once they show up.
pub fn set_banned(conn: &Connection, user_id: i64, banned: bool) -> Result<()> {
    conn.execute(
        "INSERT INTO users (user_id, banned) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET banned = excluded.banned",
        params![user_id, banned],
    )?;
    Ok(())
}

/// Grants (with optional expiry) or revokes paid status.
pub fn set_paid(
    conn: &Connection,
    user_id: i64,
    is_paid: bool,
    expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<()> {
    let start = is_paid.then(|| now.to_rfc3339());
    let expiry = expiry.filter(|_| is_paid).map(|e| e.to_rfc3339());
    conn.execute(
        "INSERT INTO users (user_id, is_paid, subscription_start, paid_expiry) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id) DO UPDATE SET is_paid = excluded.is_paid,
             subscription_start = excluded.subscription_start, paid_expiry = excluded.paid_expiry",
        params![user_id, is_paid, start, expiry],
    )?;
    Ok(())
}

/// Users whose paid status is still live, by id. Lapsed ones are cleared on the way.
pub fn paid_users(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users WHERE is_paid = 1 ORDER BY user_id", USER_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt.query_map([], user_from_row)?.collect::<Result<Vec<_>>>()?;

    let (active, lapsed): (Vec<User>, Vec<User>) = users.into_iter().partition(|u| u.has_active_subscription(now));
    for user in &lapsed {
        conn.execute("UPDATE users SET is_paid = 0 WHERE user_id = ?1", [user.user_id])?;
        log::info!("User {} paid subscription has expired", user.user_id);
    }
    Ok(active)
}

/// Records a submitted URL as `pending`. Re-storing an id resets it.
pub fn store_url(conn: &Connection, url_id: &str, url: &str, user_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO urls (url_id, url, user_id, status) VALUES (?1, ?2, ?3, 'pending')
         ON CONFLICT(url_id) DO UPDATE SET url = excluded.url, user_id = excluded.user_id, status = 'pending'",
        params![url_id, url, user_id],
    )?;
    Ok(())
}

pub fn get_url(conn: &Connection, url_id: &str) -> Result<Option<UrlRecord>> {
    conn.query_row(
        "SELECT url_id, url, user_id, status FROM urls WHERE url_id = ?1",
        [url_id],
        |row| {
            let status: String = row.get(3)?;
            Ok(UrlRecord {
                url_id: row.get(0)?,
                url: row.get(1)?,
                user_id: row.get(2)?,
                status: JobStatus::from_str(&status).unwrap_or(JobStatus::Pending),
            })
        },
    )
    .optional()
}

/// Returns false when no record has that id.
pub fn update_url_status(conn: &Connection, url_id: &str, status: JobStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE urls SET status = ?1 WHERE url_id = ?2",
        params![status.to_string(), url_id],
    )?;
    Ok(changed > 0)
}

/// Counts one task for `date` and returns the new total.
pub fn track_daily_task(conn: &Connection, user_id: i64, date: NaiveDate) -> Result<u32> {
    conn.query_row(
        "INSERT INTO daily_tasks (user_id, date, count) VALUES (?1, ?2, 1)
         ON CONFLICT(user_id, date) DO UPDATE SET count = count + 1
         RETURNING count",
        params![user_id, date.to_string()],
        |row| row.get(0),
    )
}

pub fn daily_task_count(conn: &Connection, user_id: i64, date: NaiveDate) -> Result<u32> {
    let count = conn
        .query_row(
            "SELECT count FROM daily_tasks WHERE user_id = ?1 AND date = ?2",
            params![user_id, date.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(count.unwrap_or(0))
}
