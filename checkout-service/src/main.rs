use anyhow::Context;
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use checkout_service::{
    build_router,
    config::{CheckoutConfig, ServerConfig},
    gateway::HttpGateway,
    store::{InMemoryStatusStore, PgStatusStore, StatusEventSink},
    webhook::SIGNATURE_HEADER,
    AppState, SERVICE_NAME,
};
use common_observability::CheckoutMetrics;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server = ServerConfig::from_env()?;
    let config = Arc::new(CheckoutConfig::from_env());
    config.log_summary();

    let metrics = Arc::new(CheckoutMetrics::new());
    let gateway = HttpGateway::new(config.gateway_base_url(), config.gateway_timeout)
        .context("failed to build gateway HTTP client")?
        .with_metrics(metrics.clone());

    let sink: Arc<dyn StatusEventSink> = match &server.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            let store = PgStatusStore::new(pool);
            store
                .ensure_schema()
                .await
                .context("failed to prepare payment status tables")?;
            info!("Recording payment status changes in Postgres");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; payment status changes are kept in memory only");
            Arc::new(InMemoryStatusStore::new())
        }
    };

    let state = AppState::new(config, Arc::new(gateway), sink, metrics);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            server
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("x-signature-integrity"),
        ]);

    let app = build_router(state).layer(cors);

    let listener = TcpListener::bind(server.addr)
        .await
        .with_context(|| format!("failed to bind {}", server.addr))?;
    info!(addr = %server.addr, service = SERVICE_NAME, signature_header = SIGNATURE_HEADER, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
