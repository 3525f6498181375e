use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;

/// A pending email verification. At most one exists per user.
#[derive(Debug, Clone, FromRow)]
pub struct EmailVerification {
    pub token: String,
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
}

impl EmailVerification {
    pub fn new(token: String, user_id: i32, ttl: Duration) -> Self {
        Self {
            token,
            user_id,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
