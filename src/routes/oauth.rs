use crate::{
    auth::TokenKeys,
    error::AppError,
    response::ApiResponse,
    services::{google::GoogleClient, oauth},
};
use actix_web::{get, http::header, web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;

fn configured(google: Option<web::Data<GoogleClient>>) -> Result<web::Data<GoogleClient>, AppError> {
    google.ok_or_else(|| AppError::NotFound("Google sign-in is not configured".into()))
}

/// Redirects to Google's consent screen with a signed `state`.
#[get("")]
pub async fn start(
    keys: web::Data<TokenKeys>,
    google: Option<web::Data<GoogleClient>>,
) -> Result<HttpResponse, AppError> {
    let google = configured(google)?;
    let state = keys.generate_oauth_state()?;
    let url = google.authorization_url(&state)?;

    Ok(HttpResponse::Found()
        .append_header((header::LOCATION, url.as_str()))
        .finish())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by Google when the user denied consent.
    pub error: Option<String>,
}

/// Completes the authorization-code flow and signs the user in.
///
/// ## Responses:
/// - `200 OK`: the user and a token pair.
/// - `400 Bad Request`: the callback carried no code.
/// - `401 Unauthorized`: bad `state`, denied consent or a code Google rejects.
/// - `403 Forbidden`: the resolved account is unverified, or Google did not verify the
///   email of an existing local account.
/// - `409 Conflict`: the email belongs to an account linked to another Google account.
#[get("/callback")]
pub async fn callback(
    pool: web::Data<PgPool>,
    keys: web::Data<TokenKeys>,
    google: Option<web::Data<GoogleClient>>,
    query: web::Query<CallbackQuery>,
) -> Result<HttpResponse, AppError> {
    let google = configured(google)?;

    if let Some(error) = &query.error {
        return Err(AppError::Unauthorized(format!(
            "Google sign-in was not completed: {}",
            error
        )));
    }

    let state = query
        .state
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Missing OAuth state".into()))?;
    keys.verify_oauth_state(state)?;

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".into()))?;

    let profile = google.profile_for_code(code).await?;
    let response = oauth::sign_in_with_google(&pool, &keys, &profile).await?;
    Ok(ApiResponse::ok(response))
}
