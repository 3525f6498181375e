//! Email verification: issue, resend and consume.

use chrono::Duration;
use sqlx::{PgConnection, PgPool};

use crate::{
    auth::{token::generate_opaque_token, AuthResponse, TokenKeys},
    config::Config,
    error::AppError,
    mailer::{verification_message, Mailer},
    models::{EmailVerification, User},
    services::{lock_user_by_email, lock_user_by_id, normalize_email, session, USER_COLUMNS},
};

const TOKEN_NOT_FOUND: &str = "Verification token not found";

/// Replaces any pending verification of `user_id` with a fresh one.
pub async fn issue(
    conn: &mut PgConnection,
    config: &Config,
    user_id: i32,
) -> Result<EmailVerification, AppError> {
    sqlx::query("DELETE FROM email_verifications WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let verification = EmailVerification::new(
        generate_opaque_token(),
        user_id,
        Duration::hours(config.verification_ttl_hours),
    );
    sqlx::query("INSERT INTO email_verifications (token, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(&verification.token)
        .bind(verification.user_id)
        .bind(verification.expires_at)
        .execute(&mut *conn)
        .await?;

    Ok(verification)
}

/// Mails the verification link. Failures are logged; the user can ask for a resend.
pub fn dispatch(mailer: &dyn Mailer, config: &Config, user: &User, verification: &EmailVerification) {
    let sent = verification_message(&config.public_url, user, &verification.token)
        .and_then(|message| mailer.send(&message));
    if let Err(e) = sent {
        log::warn!("Could not send verification mail to user {}: {}", user.id, e);
    }
}

/// Issues a new verification for an unverified account and mails it.
pub async fn resend(
    pool: &PgPool,
    config: &Config,
    mailer: &dyn Mailer,
    email: &str,
) -> Result<(), AppError> {
    let email = normalize_email(email);
    let mut tx = pool.begin().await?;

    let user = lock_user_by_email(&mut tx, &email)
        .await?
        .ok_or_else(|| AppError::NotFound("No account uses this email address".into()))?;
    if user.is_verified {
        return Err(AppError::Conflict("Email address is already verified".into()));
    }

    let verification = issue(&mut tx, config, user.id).await?;
    tx.commit().await?;

    dispatch(mailer, config, &user, &verification);
    log::info!("Resent verification mail for user {}", user.id);
    Ok(())
}

/// Consumes a verification token, marks the account verified and signs the user in.
pub async fn verify(pool: &PgPool, keys: &TokenKeys, token: &str) -> Result<AuthResponse, AppError> {
    let mut tx = pool.begin().await?;

    let owner: Option<i32> =
        sqlx::query_scalar("SELECT user_id FROM email_verifications WHERE token = $1")
            .bind(token)
            .fetch_optional(&mut *tx)
            .await?;
    let owner = owner.ok_or_else(|| AppError::NotFound(TOKEN_NOT_FOUND.into()))?;

    let user = lock_user_by_id(&mut tx, owner)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let consumed: Option<EmailVerification> = sqlx::query_as(
        "DELETE FROM email_verifications WHERE token = $1 AND user_id = $2 \
         RETURNING token, user_id, expires_at",
    )
    .bind(token)
    .bind(user.id)
    .fetch_optional(&mut *tx)
    .await?;
    let consumed = consumed.ok_or_else(|| AppError::NotFound(TOKEN_NOT_FOUND.into()))?;

    if consumed.is_expired() {
        // Lazy expiry: keep the deletion.
        tx.commit().await?;
        return Err(AppError::BadRequest(
            "Verification token has expired; request a new one".into(),
        ));
    }

    if user.is_verified {
        tx.commit().await?;
        return Err(AppError::Conflict("Email address is already verified".into()));
    }

    // A Google id on an unverified account was never vouched for; the mailbox
    // owner proving the address does not inherit it.
    let user: User = sqlx::query_as(&format!(
        "UPDATE users SET is_verified = TRUE, google_id = NULL, updated_at = NOW() \
         WHERE id = $1 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    let tokens = session::start_session(&mut tx, keys, user.id).await?;
    tx.commit().await?;

    log::info!("User {} verified their email address", user.id);
    Ok(AuthResponse {
        user: user.into(),
        tokens,
    })
}
