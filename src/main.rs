use actix_web::{App, HttpServer, middleware, web};

use syllaflow::config::Config;
use syllaflow::{audit, db, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(std::io::Error::other)?;

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .map_err(std::io::Error::other)?;
    db::run_migrations(&pool).await.map_err(std::io::Error::other)?;

    // Default SRF template, only when none is active
    if db::seed_review_form(&pool).await.map_err(std::io::Error::other)? {
        log::info!("Seeded default syllabus review form");
    }

    // Clean up old audit entries based on retention policy
    if let Err(e) = audit::cleanup_old_entries(&pool, config.audit_retention_days).await {
        log::warn!("Audit cleanup failed: {e}");
    }

    log::info!("Starting server at http://{}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .configure(handlers::configure)
            // Default 404 handler (must be registered last)
            .default_service(web::to(handlers::not_found))
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
