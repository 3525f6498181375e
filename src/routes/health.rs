use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

/// Health check endpoint
///
/// Reports the service status, database reachability and the current timestamp.
#[get("/health")]
pub async fn health(pool: Option<web::Data<PgPool>>) -> impl Responder {
    let database = match pool {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
            Ok(_) => "up",
            Err(e) => {
                log::warn!("Health check could not reach the database: {}", e);
                "down"
            }
        },
        None => "unconfigured",
    };

    HttpResponse::Ok().json(json!({
        "status": if database == "down" { "degraded" } else { "ok" },
        "database": database,
        "timestamp": Utc::now()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn test_health_endpoint() {
        let app = test::init_service(actix_web::App::new().service(health)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());

        let body = test::read_body(resp).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], "unconfigured");
        assert!(json["timestamp"].is_string());
    }
}
