use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;

use authforge::{
    auth::{AuthMiddleware, TokenKeys},
    config::Config,
    mailer::{LogMailer, Mailer},
    routes,
    services::google::GoogleClient,
};

const MAX_DB_CONNECTIONS: u32 = 10;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(MAX_DB_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            log::error!("Failed to connect to database: {}", e);
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string())
        })?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            log::error!("Failed to run migrations: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;
        log::info!("Database migrations applied");
    }

    let keys = web::Data::new(TokenKeys::from_config(&config));
    let mailer: web::Data<dyn Mailer> = web::Data::from(Arc::new(LogMailer) as Arc<dyn Mailer>);
    let google = config
        .google
        .clone()
        .map(|google| web::Data::new(GoogleClient::new(google)));
    if google.is_none() {
        log::info!("Google sign-in disabled: GOOGLE_* variables are not set");
    }

    let bind = (config.server_host.clone(), config.server_port);
    log::info!("Starting authforge at {}", config.server_url());
    let config = web::Data::new(config);
    let pool = web::Data::new(pool);

    HttpServer::new(move || {
        let mut app = App::new()
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(keys.clone())
            .app_data(mailer.clone());
        if let Some(google) = &google {
            app = app.app_data(google.clone());
        }

        app.wrap(AuthMiddleware)
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(routes::health::health)
            .configure(routes::config)
    })
    .bind(bind)?
    .run()
    .await
}
