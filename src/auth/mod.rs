//! Password hashing and server-side sessions.
//!
//! The browser holds only a random token in an HttpOnly cookie; the server
//! keeps a session row keyed by the token's SHA-256 hash. A session stays
//! valid while its last activity is within a fixed 24-hour idle window,
//! slid forward on every authenticated request.

use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::db::models::Session;
use crate::web::flash::{self, Flash};
use crate::{AppState, DbPool};

pub const SESSION_COOKIE: &str = "handshop_session";

/// Fixed idle window; not configurable per session.
pub const SESSION_IDLE_HOURS: i64 = 24;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random session token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a session row for a verified login and return the cookie token.
pub async fn create_session(pool: &DbPool, username: &str) -> Result<String> {
    let token = generate_token();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO sessions (id, username, token_hash, login_time, last_activity)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(username)
    .bind(hash_token(&token))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(token)
}

/// Look up a session by token. Expired or unparseable sessions are deleted
/// and yield None; valid ones have their last activity slid to `now`.
pub async fn validate_session(
    pool: &DbPool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>> {
    let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ?")
        .bind(hash_token(token))
        .fetch_optional(pool)
        .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    let last_activity = DateTime::parse_from_rfc3339(&session.last_activity)
        .map(|t| t.with_timezone(&Utc))
        .ok();
    let expired = match last_activity {
        Some(last) => now - last > Duration::hours(SESSION_IDLE_HOURS),
        None => true,
    };

    if expired {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(&session.id)
            .execute(pool)
            .await?;
        return Ok(None);
    }

    sqlx::query("UPDATE sessions SET last_activity = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(&session.id)
        .execute(pool)
        .await?;

    Ok(Some(session))
}

/// Remove the session row for a token, if any.
pub async fn destroy_session(pool: &DbPool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Extractor guarding admin-only routes. An absent or expired session clears
/// residual cookie state and redirects to the login page; the original
/// request is discarded.
pub struct CurrentAdmin {
    pub username: String,
}

fn login_redirect(jar: CookieJar) -> Response {
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    let jar = flash::push(jar, Flash::error("登录已过期，请重新登录"));
    (jar, Redirect::to("/login")).into_response()
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentAdmin {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            match validate_session(&state.db, cookie.value(), Utc::now()).await {
                Ok(Some(session)) => {
                    return Ok(CurrentAdmin {
                        username: session.username,
                    })
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Session lookup failed");
                }
            }
        }

        Err(login_redirect(jar))
    }
}
