//! Find-or-create of local accounts from a Google profile.
//!
//! Lookup order: an account already linked to the Google id, then an account with the
//! same email, then a new account. A Google id is only ever stored when Google vouches
//! for the email. Otherwise whoever controls an unverified Google account could claim
//! an address, wait for its real owner to verify it, and then sign in to that account.

use rand::Rng;
use sqlx::{PgConnection, PgPool};

use crate::{
    auth::{AuthResponse, TokenKeys, MAX_USERNAME_LENGTH, MIN_USERNAME_LENGTH},
    error::AppError,
    models::User,
    services::{google::GoogleProfile, lock_user_by_email, normalize_email, session, USER_COLUMNS},
};

const USERNAME_ATTEMPTS: usize = 10;
const SUFFIX_DIGITS: usize = 4;

/// What to do with a Google profile given the accounts that match it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// The Google account is already linked to this user.
    SignIn { user_id: i32, mark_verified: bool },
    /// Attach the Google id to an existing local account.
    Attach { user_id: i32, mark_verified: bool },
    /// No matching account; create one.
    Create,
}

pub fn decide_link(
    by_google_id: Option<&User>,
    by_email: Option<&User>,
    profile: &GoogleProfile,
) -> Result<LinkAction, AppError> {
    if let Some(user) = by_google_id {
        return Ok(LinkAction::SignIn {
            user_id: user.id,
            mark_verified: !user.is_verified && profile.email_verified,
        });
    }

    match by_email {
        Some(user) if user.google_id.is_some() => Err(AppError::Conflict(
            "This email is already linked to a different Google account".into(),
        )),
        Some(_) if !profile.email_verified => Err(AppError::Forbidden(
            "Google has not verified this email address; sign in with your password".into(),
        )),
        Some(user) => Ok(LinkAction::Attach {
            user_id: user.id,
            mark_verified: !user.is_verified,
        }),
        None => Ok(LinkAction::Create),
    }
}

/// Username seed taken from the email's local part, restricted to the username
/// alphabet and length.
pub fn derive_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if base.len() < MIN_USERNAME_LENGTH {
        base = format!("user{}", base);
    }
    // Leave room for a numeric suffix.
    base.truncate(MAX_USERNAME_LENGTH - SUFFIX_DIGITS);
    base
}

async fn available_username(conn: &mut PgConnection, base: &str) -> Result<String, AppError> {
    for attempt in 0..USERNAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.to_string()
        } else {
            format!("{}{}", base, rand::thread_rng().gen_range(1000..10000))
        };

        let taken: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(&candidate)
            .fetch_optional(&mut *conn)
            .await?;
        if taken.is_none() {
            return Ok(candidate);
        }
    }

    Err(AppError::Conflict(
        "Could not derive a free username from this email".into(),
    ))
}

async fn lock_user_by_google_id(
    conn: &mut PgConnection,
    google_id: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE google_id = $1 FOR UPDATE",
        USER_COLUMNS
    ))
    .bind(google_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(user)
}

/// Resolves the profile to a local account and starts a session for it.
pub async fn sign_in_with_google(
    pool: &PgPool,
    keys: &TokenKeys,
    profile: &GoogleProfile,
) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&profile.email);
    let mut tx = pool.begin().await?;

    let by_google_id = lock_user_by_google_id(&mut tx, &profile.sub).await?;
    let by_email = match by_google_id {
        Some(_) => None,
        None => lock_user_by_email(&mut tx, &email).await?,
    };

    let user = match decide_link(by_google_id.as_ref(), by_email.as_ref(), profile)? {
        LinkAction::SignIn {
            user_id,
            mark_verified: true,
        } => {
            sqlx::query_as::<_, User>(&format!(
                "UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {}",
                USER_COLUMNS
            ))
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?
        }
        LinkAction::SignIn { .. } => by_google_id.ok_or_else(|| {
            AppError::InternalServerError("linked account vanished during sign-in".into())
        })?,
        LinkAction::Attach {
            user_id,
            mark_verified,
        } => {
            log::info!("Linking Google account to user {}", user_id);
            sqlx::query_as::<_, User>(&format!(
                "UPDATE users SET google_id = $1, is_verified = is_verified OR $2, updated_at = NOW() \
                 WHERE id = $3 RETURNING {}",
                USER_COLUMNS
            ))
            .bind(&profile.sub)
            .bind(mark_verified)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?
        }
        LinkAction::Create => {
            let username = available_username(&mut tx, &derive_username(&email)).await?;
            let google_id = profile.email_verified.then(|| profile.sub.as_str());
            let user = sqlx::query_as::<_, User>(&format!(
                "INSERT INTO users (username, email, google_id, is_verified) VALUES ($1, $2, $3, $4) \
                 RETURNING {}",
                USER_COLUMNS
            ))
            .bind(&username)
            .bind(&email)
            .bind(google_id)
            .bind(profile.email_verified)
            .fetch_one(&mut *tx)
            .await?;
            log::info!("Created user {} from Google sign-in", user.id);
            user
        }
    };

    if !user.is_verified {
        // Keep the account that was just created or linked.
        tx.commit().await?;
        return Err(AppError::Forbidden(
            "Email address has not been verified".into(),
        ));
    }

    let tokens = session::start_session(&mut tx, keys, user.id).await?;
    tx.commit().await?;

    log::info!("User {} signed in with Google", user.id);
    Ok(AuthResponse {
        user: user.into(),
        tokens,
    })
}
