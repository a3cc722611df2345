use std::sync::Arc;

use anyhow::Context;
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::SqlitePool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use graph_store::api::{GraphApp, HasPool};
use graph_store::config::ServiceConfig;

#[derive(Clone)]
struct GraphStoreApp {
    pool: Arc<SqlitePool>,
}

impl HasPool for GraphStoreApp {
    fn pool(&self) -> Arc<SqlitePool> {
        Arc::clone(&self.pool)
    }
}

impl GraphApp for GraphStoreApp {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "connecting to graph store"
    );

    let pool = graph_store::db::connect(&config)
        .await
        .context("failed to open database")?;

    if config.reset_schema {
        graph_store::db::reset_graph_tables(&pool)
            .await
            .context("failed to reset graph tables")?;
    } else {
        graph_store::db::create_graph_tables(&pool)
            .await
            .context("failed to run graph migrations")?;
    }

    let app_state = GraphStoreApp {
        pool: Arc::new(pool),
    };
    let app = graph_store::api::app(app_state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;

    tracing::info!("graph store listening on http://{}", config.bind_addr);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .await
        .context("graph store server failed")
}
