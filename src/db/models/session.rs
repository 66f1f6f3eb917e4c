//! Server-side session row. Validation and expiry live in [`crate::auth`].

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub token_hash: String,
    pub login_time: String,
    pub last_activity: String,
}
