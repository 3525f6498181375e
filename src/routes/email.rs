use crate::{
    auth::{ResendVerificationRequest, TokenKeys, VerifyEmailQuery},
    config::Config,
    error::AppError,
    mailer::Mailer,
    response::ApiResponse,
    services::verification,
};
use actix_web::{get, post, web, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

/// Consumes a verification token from a mailed link and signs the user in.
///
/// ## Responses:
/// - `200 OK`: the verified user and a token pair.
/// - `400 Bad Request`: the token has expired (it is deleted).
/// - `404 Not Found`: unknown or already used token.
/// - `409 Conflict`: the account is already verified.
#[get("/verification")]
pub async fn verify(
    pool: web::Data<PgPool>,
    keys: web::Data<TokenKeys>,
    query: web::Query<VerifyEmailQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate()?;
    let response = verification::verify(&pool, &keys, &query.token).await?;
    Ok(ApiResponse::ok(response))
}

/// Sends a new verification link, invalidating the previous one.
#[post("/verification")]
pub async fn resend(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    mailer: web::Data<dyn Mailer>,
    body: web::Json<ResendVerificationRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    verification::resend(&pool, &config, mailer.get_ref(), &body.email).await?;
    Ok(ApiResponse::ok(json!({ "sent": true })))
}
