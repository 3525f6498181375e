//! The `{ "success": true, "data": ... }` envelope returned by every successful handler.

use actix_web::{http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }

    /// 200 OK with `data` in the envelope.
    pub fn ok(data: T) -> HttpResponse {
        Self::new(data).respond(StatusCode::OK)
    }

    /// 201 Created with `data` in the envelope.
    pub fn created(data: T) -> HttpResponse {
        Self::new(data).respond(StatusCode::CREATED)
    }

    fn respond(self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).json(self)
    }
}
