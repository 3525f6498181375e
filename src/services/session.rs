//! Sign-in, refresh-token rotation and sign-out.
//!
//! A user has one session family at a time: every sign-in deletes all of the user's
//! refresh tokens before storing the new one. Refreshing consumes the presented token
//! and stores its replacement, so each refresh token works exactly once.

use chrono::Utc;
use sqlx::{PgConnection, PgPool};

use crate::{
    auth::{
        token::{generate_opaque_token, hash_opaque_token},
        verify_password, AuthResponse, LoginRequest, TokenKeys, TokenPair,
    },
    error::AppError,
    models::RefreshToken,
    services::{ensure_same_credentials, find_user_by_email, lock_user_by_id, normalize_email},
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

/// Deletes every refresh token of `user_id`. Returns how many were revoked.
pub async fn revoke_all(conn: &mut PgConnection, user_id: i32) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Replaces the user's session family with a single new refresh token.
///
/// Runs on the caller's transaction; the caller must hold the user's row lock.
pub async fn start_session(
    conn: &mut PgConnection,
    keys: &TokenKeys,
    user_id: i32,
) -> Result<TokenPair, AppError> {
    let revoked = revoke_all(conn, user_id).await?;
    if revoked > 0 {
        log::debug!("Revoked {} refresh token(s) for user {}", revoked, user_id);
    }
    store_refresh_token(conn, keys, user_id).await
}

async fn store_refresh_token(
    conn: &mut PgConnection,
    keys: &TokenKeys,
    user_id: i32,
) -> Result<TokenPair, AppError> {
    let refresh_token = generate_opaque_token();
    sqlx::query("INSERT INTO refresh_tokens (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(hash_opaque_token(&refresh_token))
        .bind(user_id)
        .bind(Utc::now() + keys.refresh_ttl())
        .execute(&mut *conn)
        .await?;

    keys.token_pair(user_id, refresh_token)
}

/// Authenticates with email and password and starts a new session.
pub async fn login(
    pool: &PgPool,
    keys: &TokenKeys,
    input: &LoginRequest,
) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&input.email);

    let checked = find_user_by_email(pool, &email)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    // Accounts created through Google have no local password to check against.
    let password_hash = checked
        .password_hash
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    if !verify_password(&input.password, password_hash)? {
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let mut tx = pool.begin().await?;
    let user = lock_user_by_id(&mut tx, checked.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;
    ensure_same_credentials(&checked, &user)?;

    if !user.is_verified {
        return Err(AppError::Forbidden(
            "Email address has not been verified".into(),
        ));
    }

    let tokens = start_session(&mut tx, keys, user.id).await?;
    tx.commit().await?;

    log::info!("User {} signed in", user.id);
    Ok(AuthResponse {
        user: user.into(),
        tokens,
    })
}

/// Exchanges a refresh token for a new token pair, consuming the presented token.
pub async fn refresh(
    pool: &PgPool,
    keys: &TokenKeys,
    refresh_token: &str,
) -> Result<TokenPair, AppError> {
    let token_hash = hash_opaque_token(refresh_token);
    let mut tx = pool.begin().await?;

    // Existence: find the owner without locking so the user row can be locked first.
    let owner: Option<i32> =
        sqlx::query_scalar("SELECT user_id FROM refresh_tokens WHERE token_hash = $1")
            .bind(&token_hash)
            .fetch_optional(&mut *tx)
            .await?;
    let owner = owner.ok_or_else(|| AppError::Unauthorized(INVALID_REFRESH_TOKEN.into()))?;

    let user = lock_user_by_id(&mut tx, owner)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_REFRESH_TOKEN.into()))?;

    // Ownership and single use: a concurrent refresh or sign-in may have removed it.
    let consumed: Option<RefreshToken> = sqlx::query_as(
        "DELETE FROM refresh_tokens WHERE token_hash = $1 AND user_id = $2 \
         RETURNING token_hash, user_id, expires_at",
    )
    .bind(&token_hash)
    .bind(user.id)
    .fetch_optional(&mut *tx)
    .await?;
    let consumed =
        consumed.ok_or_else(|| AppError::Unauthorized(INVALID_REFRESH_TOKEN.into()))?;

    if consumed.is_expired() {
        // Lazy expiry: keep the deletion.
        tx.commit().await?;
        return Err(AppError::Unauthorized("Refresh token has expired".into()));
    }

    let tokens = store_refresh_token(&mut tx, keys, user.id).await?;
    tx.commit().await?;

    log::debug!("Rotated refresh token for user {}", user.id);
    Ok(tokens)
}

/// Ends every session of the user.
pub async fn logout(pool: &PgPool, user_id: i32) -> Result<(), AppError> {
    let mut conn = pool.acquire().await?;
    let revoked = revoke_all(&mut conn, user_id).await?;
    log::info!("User {} signed out ({} session(s) revoked)", user_id, revoked);
    Ok(())
}
