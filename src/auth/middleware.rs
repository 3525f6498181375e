use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::token::TokenKeys;
use crate::error::AppError;

/// Why a presented bearer token was not accepted.
///
/// Stored in request extensions so only handlers that require authentication fail.
/// Public endpoints (such as refresh) keep working when a client sends a stale token.
#[derive(Debug, Clone)]
pub struct TokenRejection(pub String);

/// Decodes `Authorization: Bearer` access tokens.
///
/// On success the [`Claims`](crate::auth::Claims) are inserted into request extensions;
/// on failure a [`TokenRejection`] is inserted instead. Requests without the header pass
/// through untouched.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let bearer = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);

        if let Some(token) = bearer {
            let Some(keys) = req.app_data::<web::Data<TokenKeys>>().cloned() else {
                let err = AppError::InternalServerError("Token keys are not configured".into());
                return Box::pin(async move { Err(err.into()) });
            };

            match keys.verify_access_token(&token) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                }
                Err(err) => {
                    log::debug!("Rejected bearer token on {}: {}", req.path(), err);
                    let reason = match err {
                        AppError::Unauthorized(msg) => msg,
                        other => other.to_string(),
                    };
                    req.extensions_mut().insert(TokenRejection(reason));
                }
            }
        }

        Box::pin(self.service.call(req))
    }
}
