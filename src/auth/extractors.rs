use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::middleware::TokenRejection;
use crate::auth::token::Claims;
use crate::error::AppError;

/// Extracts the authenticated user's ID from request extensions.
///
/// Relies on `AuthMiddleware` having decoded the bearer token. Fails with
/// `AppError::Unauthorized` when no token was sent or the token was rejected.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUserId(pub i32);

impl FromRequest for AuthenticatedUserId {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let extensions = req.extensions();
        let result: Result<Self, Self::Error> = match extensions.get::<Claims>() {
            Some(claims) => Ok(AuthenticatedUserId(claims.sub)),
            None => {
                let message = extensions
                    .get::<TokenRejection>()
                    .map(|rejection| rejection.0.clone())
                    .unwrap_or_else(|| "Missing token".to_string());
                Err(AppError::Unauthorized(message).into())
            }
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::dev::Payload;
    use actix_web::http::StatusCode;
    use actix_web::test;

    fn claims(sub: i32) -> Claims {
        Claims {
            sub,
            exp: 0,
            iat: 0,
            typ: "access".to_string(),
            nonce: None,
        }
    }

    #[actix_rt::test]
    async fn test_authenticated_user_id_extractor_success() {
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut().insert(claims(123));

        let mut payload = Payload::None;
        let extracted_id = AuthenticatedUserId::from_request(&req, &mut payload).await;
        assert_eq!(extracted_id.unwrap().0, 123);
    }

    #[actix_rt::test]
    async fn test_authenticated_user_id_extractor_failure() {
        let req = test::TestRequest::default().to_http_request();

        let mut payload = Payload::None;
        let err = AuthenticatedUserId::from_request(&req, &mut payload)
            .await
            .unwrap_err();
        assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_extractor_reports_rejection_reason() {
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut()
            .insert(TokenRejection("Invalid token: ExpiredSignature".into()));

        let mut payload = Payload::None;
        let err = AuthenticatedUserId::from_request(&req, &mut payload)
            .await
            .unwrap_err();
        assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);
        assert!(err.to_string().contains("ExpiredSignature"));
    }
}
