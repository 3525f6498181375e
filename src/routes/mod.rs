pub mod email;
pub mod health;
pub mod oauth;
pub mod token;
pub mod user;

use actix_web::web;

use crate::error::AppError;

/// Largest JSON body any endpoint accepts.
const JSON_LIMIT: usize = 16 * 1024;

/// Malformed or incomplete JSON bodies become 400s in the error envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid JSON body: {}", err)).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid query string: {}", err)).into()
    })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(
            web::scope("/local/user")
                .service(user::register)
                .service(user::current_user)
                .service(user::change_password)
                .service(user::delete_account),
        )
        .service(
            web::scope("/local/email")
                .service(email::verify)
                .service(email::resend),
        )
        .service(
            web::scope("/local/token")
                .service(token::login)
                .service(token::refresh)
                .service(token::logout),
        )
        .service(
            web::scope("/oauth/google")
                .service(oauth::start)
                .service(oauth::callback),
        );
}
