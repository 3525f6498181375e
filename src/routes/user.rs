use crate::{
    auth::{AuthenticatedUserId, ChangePasswordRequest, DeleteAccountRequest, RegisterRequest, TokenKeys},
    config::Config,
    error::AppError,
    mailer::Mailer,
    response::ApiResponse,
    services::account,
};
use actix_web::{delete, get, patch, post, web, HttpResponse};
use sqlx::PgPool;
use validator::Validate;

/// Registers a new local account.
///
/// The account starts unverified and a verification link is mailed to the given address.
///
/// ## Responses:
/// - `201 Created`: the public user.
/// - `400 Bad Request`: malformed body or failed validation (per-field messages).
/// - `409 Conflict`: username or email already in use.
#[post("")]
pub async fn register(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    mailer: web::Data<dyn Mailer>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let user = account::register(&pool, &config, mailer.get_ref(), &body).await?;
    Ok(ApiResponse::created(user))
}

/// Returns the authenticated user.
#[get("")]
pub async fn current_user(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
) -> Result<HttpResponse, AppError> {
    let user = account::get_user(&pool, user_id.0).await?;
    Ok(ApiResponse::ok(user))
}

/// Changes (or, for Google-only accounts, sets) the password.
///
/// Every existing session is revoked; the response carries the replacement token pair.
///
/// ## Responses:
/// - `200 OK`: new token pair.
/// - `400 Bad Request`: validation failure or new password equal to the current one.
/// - `401 Unauthorized`: missing access token or wrong current password.
/// - `404 Not Found`: the account no longer exists.
#[patch("/password")]
pub async fn change_password(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    keys: web::Data<TokenKeys>,
    user_id: AuthenticatedUserId,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let tokens = account::change_password(&pool, &config, &keys, user_id.0, &body).await?;
    Ok(ApiResponse::ok(tokens))
}

/// Deletes the authenticated user's account together with its tokens.
///
/// Accounts with a local password must confirm it in the body. An empty body is accepted
/// for Google-only accounts.
#[delete("")]
pub async fn delete_account(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
    body: Option<web::Json<DeleteAccountRequest>>,
) -> Result<HttpResponse, AppError> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    body.validate()?;
    account::delete_account(&pool, user_id.0, &body).await?;
    Ok(HttpResponse::NoContent().finish())
}
