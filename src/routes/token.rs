use crate::{
    auth::{AuthenticatedUserId, LoginRequest, RefreshRequest, TokenKeys},
    error::AppError,
    response::ApiResponse,
    services::session,
};
use actix_web::{delete, post, put, web, HttpResponse};
use sqlx::PgPool;
use validator::Validate;

/// Signs in with email and password.
///
/// Replaces every existing session of the user.
///
/// ## Responses:
/// - `200 OK`: the user and a token pair.
/// - `401 Unauthorized`: unknown email or wrong password.
/// - `403 Forbidden`: the email address has not been verified.
#[post("")]
pub async fn login(
    pool: web::Data<PgPool>,
    keys: web::Data<TokenKeys>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let response = session::login(&pool, &keys, &body).await?;
    Ok(ApiResponse::ok(response))
}

/// Rotates a refresh token.
///
/// ## Responses:
/// - `200 OK`: a new token pair; the presented refresh token is spent.
/// - `401 Unauthorized`: unknown, spent or expired refresh token.
#[put("")]
pub async fn refresh(
    pool: web::Data<PgPool>,
    keys: web::Data<TokenKeys>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let tokens = session::refresh(&pool, &keys, &body.refresh_token).await?;
    Ok(ApiResponse::ok(tokens))
}

/// Signs out everywhere by revoking all refresh tokens of the user.
#[delete("")]
pub async fn logout(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
) -> Result<HttpResponse, AppError> {
    session::logout(&pool, user_id.0).await?;
    Ok(HttpResponse::NoContent().finish())
}
