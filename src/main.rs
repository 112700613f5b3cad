use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use videogen_service::{
    app_state::AppState,
    config::AppConfig,
    db::{self, PgJobStore},
    routes,
    services::{
        producer::{ArtifactProducer, SimulatedVideoProducer},
        store::{JobStore, MemoryJobStore},
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing videogen-service");

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");

    let producer: Arc<dyn ArtifactProducer> = Arc::new(SimulatedVideoProducer::from_config(&config));
    if config.initialize_on_startup {
        let producer = Arc::clone(&producer);
        tokio::task::spawn_blocking(move || {
            if !producer.initialize() {
                tracing::error!("Video model failed to initialize, jobs will retry on demand");
            }
        });
    }

    match config.database_url.clone() {
        Some(database_url) => {
            tracing::info!("Connecting to PostgreSQL database");
            let db_pool = db::init_pool(&database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running database migrations");
            db::run_migrations(&db_pool)
                .await
                .expect("Failed to run database migrations");

            serve(&config, PgJobStore::new(db_pool), producer, prometheus_handle).await;
        }
        None => {
            tracing::info!("No DATABASE_URL set, keeping jobs in memory");
            serve(&config, MemoryJobStore::new(), producer, prometheus_handle).await;
        }
    }
}

async fn serve<S: JobStore>(
    config: &AppConfig,
    store: S,
    producer: Arc<dyn ArtifactProducer>,
    prometheus_handle: Arc<PrometheusHandle>,
) {
    let state = AppState::from_config(store, producer, config);

    let app = routes::router(state).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, in-flight jobs will be abandoned");
}
