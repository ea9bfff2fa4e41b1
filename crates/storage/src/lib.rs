//! Session store backing the gateway's cookie sessions.
//!
//! A user owns at most one row: `sessions.username` is unique and a new login
//! replaces the previous row inside one transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Evicts every session of `username` and creates a fresh one atomically.
    async fn create_exclusive_session(&self, username: &str, ttl: Duration) -> Result<Session>;
    /// Unknown and expired tokens both yield `None`.
    async fn load_session(&self, token: &str) -> Result<Option<Session>>;
    /// Destroying an absent session is not an error.
    async fn destroy_session(&self, token: &str) -> Result<()>;
    async fn evict_by_username(&self, username: &str) -> Result<u64>;
    async fn purge_expired(&self) -> Result<u64>;
    async fn list_sessions(&self) -> Result<Vec<Session>>;
    async fn health_check(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // each connection to an in-memory database sees its own database
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "session store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for Storage {
    async fn create_exclusive_session(&self, username: &str, ttl: Duration) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            token: new_session_token(),
            username: username.to_string(),
            created_at: now,
            expires_at: now + ttl,
        };

        let mut tx = self.pool.begin().await?;
        let evicted = sqlx::query("DELETE FROM sessions WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await
            .context("failed to evict previous sessions")?
            .rows_affected();
        sqlx::query(
            "INSERT INTO sessions (token, username, created_at, expires_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(username) DO UPDATE SET
                token = excluded.token,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at",
        )
        .bind(&session.token)
        .bind(&session.username)
        .bind(session.created_at.timestamp())
        .bind(session.expires_at.timestamp())
        .execute(&mut *tx)
        .await
        .context("failed to insert session")?;
        tx.commit().await?;

        if evicted > 0 {
            info!(%username, evicted, "evicted previous sessions on login");
        }
        Ok(session)
    }

    async fn load_session(&self, token: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            "SELECT token, username, created_at, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let session = session_from_row(&row)?;
        if session.is_expired_at(Utc::now()) {
            debug!(username = %session.username, "dropping expired session");
            self.destroy_session(token).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn destroy_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn evict_by_username(&self, username: &str) -> Result<u64> {
        let evicted = sqlx::query("DELETE FROM sessions WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(evicted)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(purged)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let rows = sqlx::query(
            "SELECT token, username, created_at, expires_at
             FROM sessions
             ORDER BY lower(username) ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

fn session_from_row(row: &SqliteRow) -> Result<Session> {
    Ok(Session {
        token: row.try_get("token")?,
        username: row.try_get("username")?,
        created_at: timestamp(row.try_get("created_at")?)?,
        expires_at: timestamp(row.try_get("expires_at")?)?,
    })
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).with_context(|| format!("invalid timestamp {secs}"))
}

/// 32 random bytes, URL-safe so the token travels in a cookie unescaped.
fn new_session_token() -> String {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
    bytes.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
