//! Registration, profile lookup, password change and account deletion.

use sqlx::{PgConnection, PgPool};

use crate::{
    auth::{
        hash_password, verify_password, ChangePasswordRequest, DeleteAccountRequest,
        RegisterRequest, TokenKeys, TokenPair,
    },
    config::Config,
    error::AppError,
    mailer::Mailer,
    models::{PublicUser, User},
    services::{
        ensure_same_credentials, find_user_by_id, lock_user_by_id, normalize_email, session,
        verification, USER_COLUMNS,
    },
};

/// Creates an unverified account and mails its verification link.
pub async fn register(
    pool: &PgPool,
    config: &Config,
    mailer: &dyn Mailer,
    input: &RegisterRequest,
) -> Result<PublicUser, AppError> {
    let email = normalize_email(&input.email);
    // bcrypt runs outside every transaction so row locks are held briefly.
    let password_hash = hash_password(&input.password, config.bcrypt_cost)?;

    let mut tx = pool.begin().await?;

    let taken: Option<(String, String)> =
        sqlx::query_as("SELECT username, email FROM users WHERE username = $1 OR email = $2 LIMIT 1")
            .bind(&input.username)
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;
    if let Some((username, _)) = taken {
        let message = if username == input.username {
            "Username already taken"
        } else {
            "Email already registered"
        };
        return Err(AppError::Conflict(message.into()));
    }

    // A concurrent registration can still win the race; the unique
    // constraint then surfaces as a 409 through `From<sqlx::Error>`.
    let user: User = sqlx::query_as(&format!(
        "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(&input.username)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await?;

    let pending = verification::issue(&mut tx, config, user.id).await?;
    tx.commit().await?;

    verification::dispatch(mailer, config, &user, &pending);
    log::info!("Registered user {} ({})", user.id, user.username);
    Ok(user.into())
}

pub async fn get_user(pool: &PgPool, user_id: i32) -> Result<PublicUser, AppError> {
    find_user_by_id(pool, user_id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

async fn existing_user(pool: &PgPool, user_id: i32) -> Result<User, AppError> {
    find_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

async fn lock_existing_user(conn: &mut PgConnection, user_id: i32) -> Result<User, AppError> {
    lock_user_by_id(conn, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Sets a new password and replaces the session family.
///
/// Accounts with a local password must present it. Accounts created through Google
/// may set their first password without one.
pub async fn change_password(
    pool: &PgPool,
    config: &Config,
    keys: &TokenKeys,
    user_id: i32,
    input: &ChangePasswordRequest,
) -> Result<TokenPair, AppError> {
    let checked = existing_user(pool, user_id).await?;

    if let Some(current_hash) = checked.password_hash.as_deref() {
        let current = input.current_password.as_deref().ok_or_else(|| {
            AppError::invalid_field("currentPassword", "Current password is required")
        })?;
        if !verify_password(current, current_hash)? {
            return Err(AppError::Unauthorized("Current password is incorrect".into()));
        }
        if current == input.new_password {
            return Err(AppError::invalid_field(
                "newPassword",
                "New password must differ from the current password",
            ));
        }
    }

    let new_hash = hash_password(&input.new_password, config.bcrypt_cost)?;
    let mut tx = pool.begin().await?;
    let user = lock_existing_user(&mut tx, user_id).await?;
    ensure_same_credentials(&checked, &user)?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&new_hash)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    let tokens = session::start_session(&mut tx, keys, user.id).await?;
    tx.commit().await?;

    log::info!("User {} changed their password", user.id);
    Ok(tokens)
}

/// Deletes the account. Refresh tokens and pending verifications go by cascade.
pub async fn delete_account(
    pool: &PgPool,
    user_id: i32,
    input: &DeleteAccountRequest,
) -> Result<(), AppError> {
    let checked = existing_user(pool, user_id).await?;

    if let Some(current_hash) = checked.password_hash.as_deref() {
        let password = input
            .password
            .as_deref()
            .ok_or_else(|| AppError::invalid_field("password", "Password is required"))?;
        if !verify_password(password, current_hash)? {
            return Err(AppError::Unauthorized("Password is incorrect".into()));
        }
    }

    let mut tx = pool.begin().await?;
    let user = lock_existing_user(&mut tx, user_id).await?;
    ensure_same_credentials(&checked, &user)?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log::info!("Deleted account of user {}", user.id);
    Ok(())
}
