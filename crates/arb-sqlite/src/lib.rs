//! SQLite-backed user directory.
//!
//! Two tables live here: `just`, the first-contact log of everyone who wrote
//! to the bot, and `users`, the profiles created through the mini app.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Local;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use tracing::{debug, info};

use arb_core::{
    directory::{Audience, UserDirectory},
    domain::UserId,
    errors::Error,
    Result,
};

const REGISTERED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone)]
pub struct SqliteDirectory {
    pool: Pool<Sqlite>,
}

impl SqliteDirectory {
    /// Opens (creating if needed) the database at `database_url` and
    /// ensures the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(map_err)?
            .create_if_missing(true);

        // Every connection to an in-memory database is a separate database.
        let in_memory = database_url.contains(":memory:");
        let mut pool = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool = pool.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool.connect_with(options).await.map_err(map_err)?;

        let dir = Self { pool };
        dir.ensure_schema().await?;
        info!(in_memory, "user directory ready");
        Ok(dir)
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS just (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_user BIGINT NOT NULL UNIQUE,
                userName VARCHAR(255) NOT NULL,
                dataRegistred VARCHAR(50) NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL UNIQUE,
                nickname TEXT NOT NULL,
                sex TEXT NOT NULL,
                age INTEGER NOT NULL,
                latitude REAL,
                longitude REAL,
                about_user TEXT,
                avatar_path TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_user_id ON users(user_id)")
            .execute(&self.pool)
            .await
            .map_err(map_err)?;

        Ok(())
    }
}

fn map_err(e: sqlx::Error) -> Error {
    Error::Store(format!("sqlite error: {e}"))
}

#[async_trait]
impl UserDirectory for SqliteDirectory {
    async fn audience(&self, audience: Audience) -> Result<Vec<UserId>> {
        let sql = match audience {
            Audience::All => "SELECT id_user FROM just ORDER BY id",
            Audience::Profiles => "SELECT user_id FROM users ORDER BY rowid",
        };
        let ids = sqlx::query_scalar::<_, i64>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(ids.into_iter().map(UserId).collect())
    }

    async fn nickname(&self, user: UserId) -> Result<Option<String>> {
        let nick = sqlx::query_scalar::<_, String>("SELECT nickname FROM users WHERE user_id = ?")
            .bind(user.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(nick.filter(|n| !n.trim().is_empty()))
    }

    async fn remember(&self, user: UserId, username: Option<&str>) -> Result<()> {
        let registered_at = Local::now().format(REGISTERED_AT_FORMAT).to_string();
        let res = sqlx::query(
            "INSERT OR IGNORE INTO just (id_user, userName, dataRegistred) VALUES (?, ?, ?)",
        )
        .bind(user.0)
        .bind(username.unwrap_or_default())
        .bind(&registered_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if res.rows_affected() > 0 {
            info!(user_id = %user, date = %registered_at, "new user");
        } else {
            debug!(user_id = %user, "user already known");
        }
        Ok(())
    }
}
