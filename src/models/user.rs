use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the `users` table.
///
/// Deliberately not `Serialize`: the password hash must never leave the service.
/// Convert to [`PublicUser`] before putting a user in a response.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    /// `None` for accounts created through Google that never set a local password.
    pub password_hash: Option<String>,
    pub is_verified: bool,
    pub google_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// The user as exposed to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
    pub has_password: bool,
    pub google_linked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            has_password: user.has_password(),
            google_linked: user.google_id.is_some(),
            id: user.id,
            username: user.username,
            email: user.email,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: Some("$2b$04$abcdefghijklmnopqrstuu".to_string()),
            is_verified: true,
            google_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_public_user_never_carries_password_hash() {
        let public = PublicUser::from(sample_user());
        let json = serde_json::to_value(&public).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["isVerified"], true);
        assert_eq!(json["hasPassword"], true);
        assert_eq!(json["googleLinked"], false);
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("$2b$"));
    }

    #[test]
    fn test_oauth_only_user_flags() {
        let mut user = sample_user();
        user.password_hash = None;
        user.google_id = Some("1234567890".to_string());

        let public = PublicUser::from(user);
        assert!(!public.has_password);
        assert!(public.google_linked);
    }
}
