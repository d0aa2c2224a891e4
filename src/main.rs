use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use hr_ledger::Hr;
use hr_ledger::config::Config;
use hr_ledger::db::init_db;
use hr_ledger::store::MySqlStore;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod auth;
mod docs;
mod models;
mod routes;

use crate::api::AppHr;
use crate::docs::ApiDoc;
use crate::routes::Limiters;

#[get("/")]
async fn index() -> impl Responder {
    "HR ledger is running"
}

/// Deletes expired reset tokens on a fixed period for the life of the server.
fn spawn_token_purge(hr: Data<AppHr>) {
    let period = hr.config().token_purge_interval;
    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = hr.credentials().purge_expired(hr.now()).await {
                error!(error = %e, "Reset token purge failed");
            }
        }
    });
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url, config.db_max_connections)
        .await
        .context("database initialisation failed")?;
    let limiters = Limiters::from_config(&config)?;

    let hr: Data<AppHr> = Data::new(
        Hr::builder(MySqlStore::new(pool))
            .config(config.engine.clone())
            .build(),
    );
    spawn_token_purge(hr.clone());

    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches the JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(hr.clone())
            .app_data(config_data.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config_data, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("cannot bind {server_addr}"))?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
