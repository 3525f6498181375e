pub mod email_verification;
pub mod refresh_token;
pub mod user;

pub use email_verification::EmailVerification;
pub use refresh_token::RefreshToken;
pub use user::{PublicUser, User};
