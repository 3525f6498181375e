//! Transactional operations behind the HTTP handlers.
//!
//! Every multi-step mutation opens one `sqlx` transaction and commits it only after all
//! steps succeed. Rows that an operation reads and then mutates are locked with
//! `FOR UPDATE`, always user row first, so concurrent requests for the same account
//! serialise instead of acting on stale state.

pub mod account;
pub mod google;
pub mod oauth;
pub mod session;
pub mod verification;

use sqlx::{PgConnection, PgPool};

use crate::{error::AppError, models::User};

pub(crate) const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_verified, google_id, created_at, updated_at";

/// Emails are compared case-insensitively by storing them lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) async fn find_user_by_id(pool: &PgPool, user_id: i32) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub(crate) async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
    let user =
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(pool)
            .await?;
    Ok(user)
}

/// Passwords are checked against an unlocked read so bcrypt never runs under a row
/// lock. Once the row is locked, the hash must still be the one that was checked.
pub(crate) fn ensure_same_credentials(checked: &User, locked: &User) -> Result<(), AppError> {
    if checked.password_hash != locked.password_hash {
        return Err(AppError::Conflict(
            "Credentials changed during the request; try again".into(),
        ));
    }
    Ok(())
}

pub(crate) async fn lock_user_by_id(
    conn: &mut PgConnection,
    user_id: i32,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(user)
}

pub(crate) async fn lock_user_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = $1 FOR UPDATE",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    fn user_with_hash(password_hash: Option<&str>) -> User {
        User {
            id: 7,
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: password_hash.map(String::from),
            is_verified: true,
            google_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_credentials_checked_before_lock_must_match() {
        let checked = user_with_hash(Some("hash-1"));
        assert!(ensure_same_credentials(&checked, &user_with_hash(Some("hash-1"))).is_ok());
        assert!(ensure_same_credentials(&user_with_hash(None), &user_with_hash(None)).is_ok());

        assert!(matches!(
            ensure_same_credentials(&checked, &user_with_hash(Some("hash-2"))),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            ensure_same_credentials(&user_with_hash(None), &user_with_hash(Some("hash-1"))),
            Err(AppError::Conflict(_))
        ));
    }
}
