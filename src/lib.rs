#![doc = "The `authforge` library crate."]
#![doc = ""]
#![doc = "Authentication service: local credentials with email verification, Google OAuth"]
#![doc = "sign-in, JWT access tokens and rotating refresh tokens. Every multi-step mutation"]
#![doc = "runs in a single PostgreSQL transaction. The binary (`main.rs`) wires these modules"]
#![doc = "into an Actix Web server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod mailer;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;

pub use crate::config::Config;
pub use crate::error::AppError;
