// src/services/google.rs
use crate::config::GoogleConfig;
use crate::error::AppError;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

pub const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const SCOPES: &str = "openid email profile";

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Unexpected response from Google: {0}")]
    UnexpectedResponse(String),
}

impl From<GoogleError> for AppError {
    fn from(error: GoogleError) -> AppError {
        match error {
            GoogleError::OAuthFailed(msg) => {
                AppError::Unauthorized(format!("Google sign-in failed: {}", msg))
            }
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

/// The subset of the OpenID Connect userinfo document the service uses.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GoogleProfile {
    /// Stable Google account id.
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Client for Google's authorization-code flow.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    config: GoogleConfig,
    http: Client,
}

impl GoogleClient {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    /// Consent-screen URL the user is redirected to.
    pub fn authorization_url(&self, state: &str) -> Result<Url, GoogleError> {
        Url::parse_with_params(
            AUTHORIZATION_ENDPOINT,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| GoogleError::InvalidConfig(e.to_string()))
    }

    /// Exchanges an authorization code for Google's access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, GoogleError> {
        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let token: TokenResponse = response.json().await?;
            return Ok(token.access_token);
        }

        // Google answers rejected codes with 400 and an OAuth error document.
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let reason = match response.json::<TokenErrorResponse>().await {
                Ok(body) => body.error_description.unwrap_or(body.error),
                Err(_) => status.to_string(),
            };
            log::warn!("Google rejected the authorization code: {}", reason);
            return Err(GoogleError::OAuthFailed(reason));
        }

        Err(GoogleError::UnexpectedResponse(format!(
            "token endpoint returned {}",
            status
        )))
    }

    /// Fetches the signed-in user's profile.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<GoogleProfile, GoogleError> {
        let response = self
            .http
            .get(USERINFO_ENDPOINT)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(GoogleError::OAuthFailed("access token rejected".into()));
        }
        if !status.is_success() {
            return Err(GoogleError::UnexpectedResponse(format!(
                "userinfo endpoint returned {}",
                status
            )));
        }

        let profile: GoogleProfile = response.json().await?;
        if profile.sub.is_empty() || profile.email.is_empty() {
            return Err(GoogleError::OAuthFailed(
                "profile is missing the account id or email".into(),
            ));
        }
        Ok(profile)
    }

    /// Runs the whole code-for-profile exchange.
    pub async fn profile_for_code(&self, code: &str) -> Result<GoogleProfile, GoogleError> {
        let access_token = self.exchange_code(code).await?;
        self.fetch_profile(&access_token).await
    }
}
