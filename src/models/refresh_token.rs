use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A stored refresh token. Only the SHA-256 digest of the opaque token is persisted.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub token_hash: String,
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
