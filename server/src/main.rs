//! Larder Server - import and mirror service for the recipe catalog.
//!
//! Accepts batches of foods, units, categories, tags and tools over HTTP and
//! reconciles them against the entity store using larder-engine.

mod auth;
mod config;
mod db;
mod error;
mod guard;
mod handlers;
mod routes;
mod store;

use crate::config::Config;
use crate::store::{EntityStore, MemoryStore, PgStore};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "larder_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Larder Server on {}:{}", config.host, config.port);
    tracing::info!(
        throttle_ms = config.throttle.as_millis() as u64,
        page_size = config.page_size,
        usage_guard = %config.usage_guard,
        "Import settings"
    );

    let store: Arc<dyn EntityStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::create_pool(url, config.max_connections).await?;

            tracing::info!("Running database migrations...");
            db::run_migrations(&pool).await?;

            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    if config.auth_secret.is_none() {
        tracing::warn!("AUTH_SECRET not set; import routes accept anonymous requests");
    }

    let state = AppState {
        store,
        config: Arc::new(config.clone()),
    };

    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
