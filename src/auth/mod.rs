pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::PublicUser;
use password::validate_password_strength;

pub use extractors::AuthenticatedUserId;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenKeys, TokenPair};

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    pub static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Payload for `POST /local/user`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// 3 to 32 characters: letters, digits, underscores or hyphens.
    #[validate(
        length(min = 3, max = 32, message = "Username must be between 3 and 32 characters"),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
}

/// Payload for `POST /local/token`.
///
/// Only presence is checked here; strength rules apply when a password is set, not when
/// it is presented.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "Password is required"))]
    pub password: String,
}

/// Payload for `PUT /local/token`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, max = 128, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Payload for `PATCH /local/user/password`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Required unless the account has no local password yet.
    #[validate(length(min = 1, max = 128, message = "Current password must not be empty"))]
    pub current_password: Option<String>,
    #[validate(custom = "validate_password_strength")]
    pub new_password: String,
}

/// Payload for `DELETE /local/user`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DeleteAccountRequest {
    #[validate(length(min = 1, max = 128, message = "Password must not be empty"))]
    pub password: Option<String>,
}

/// Payload for `POST /local/email/verification`.
#[derive(Debug, Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
}

/// Query of `GET /local/email/verification`.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailQuery {
    #[validate(length(min = 1, max = 128, message = "Verification token is required"))]
    pub token: String,
}

/// Response after any flow that signs the user in.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub tokens: TokenPair,
}
