use axum::extract::DefaultBodyLimit;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod credential;
mod db;
mod engine;
mod enrollment;
mod error;
mod models;
mod notify;
mod progress;
mod routes;
mod storage;
mod store;

use config::Config;
use engine::Engine;
use notify::MailRelay;
use store::postgres::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "credencial_runtime=info,axum=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let pool = db::connect(&config.database_url).await?;
    // crate-relative path for sqlx migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    let port = config.port;
    let notifier = MailRelay::new(config.notify_webhook_url.clone());
    let engine = Engine::new(PgStore::new(pool), notifier, config);

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::router(engine))
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
