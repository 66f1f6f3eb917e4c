//! Admin credential store.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::info;

use crate::auth::{hash_password, verify_password};
use crate::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Listing DTO for the admin-management view; the password hash never
/// reaches the rendering layer.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminListing {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

impl Admin {
    pub async fn get_by_username(pool: &DbPool, username: &str) -> Result<Option<Admin>> {
        let admin = sqlx::query_as("SELECT * FROM admins WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;
        Ok(admin)
    }

    /// Check a login attempt. Unknown usernames yield false, not an error.
    pub async fn verify(pool: &DbPool, username: &str, password: &str) -> Result<bool> {
        match Self::get_by_username(pool, username).await? {
            Some(admin) => Ok(verify_password(password, &admin.password_hash)),
            None => Ok(false),
        }
    }

    /// Create a new admin. Returns false on a username collision so callers
    /// can present a uniform user-facing message; the existing record is
    /// left untouched.
    pub async fn create(pool: &DbPool, username: &str, password: &str) -> Result<bool> {
        let password_hash = hash_password(password)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

        let result = sqlx::query(
            "INSERT INTO admins (username, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(&password_hash)
        .bind(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
        .execute(pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE constraint failed") => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(pool: &DbPool) -> Result<Vec<AdminListing>> {
        let admins = sqlx::query_as("SELECT id, username, created_at FROM admins ORDER BY id")
            .fetch_all(pool)
            .await?;
        Ok(admins)
    }

    /// Seed the configured admin account at startup, skipped if taken.
    pub async fn ensure_default(pool: &DbPool, username: &str, password: &str) -> Result<()> {
        if Self::get_by_username(pool, username).await?.is_none() {
            Self::create(pool, username, password).await?;
            info!(username, "Created default admin account");
        }
        Ok(())
    }
}
