//! Appointment Booking Server
//!
//! HTTP front for the appointment service.
//!
//! This binary:
//! - Loads configuration from the environment (and `.env` when present)
//! - Installs the Prometheus exporter on `METRICS_PORT`
//! - Connects to the identity service, event registry and notification service
//! - Opens the appointment store (in-memory or `PostgreSQL`)
//! - Serves the appointment API until Ctrl+C / SIGTERM, then drains in-flight
//!   notifications
//!
//! # Usage
//!
//! ```bash
//! STORAGE_BACKEND=postgres DATABASE_URL=postgres://localhost/appointments \
//!     cargo run --bin server
//! ```

use anyhow::Context;
use appointments::config::{Config, StorageBackend};
use appointments::providers::AppointmentRepository;
use appointments::providers::http::{
    HttpEventRegistry, HttpIdentityLookup, HttpNotificationDispatcher,
};
use appointments::server::{AppState, build_router, shutdown_signal};
use appointments::service::AppointmentService;
use appointments::stores::InMemoryAppointmentRepository;
use booking_core::environment::SystemClock;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Collaborator adapters shared by every storage backend
struct Collaborators {
    identity: Arc<HttpIdentityLookup>,
    events: Arc<HttpEventRegistry>,
    notifications: Arc<HttpNotificationDispatcher>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,appointments=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting appointment booking server");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!(
        backend = %config.storage.backend,
        identity = %config.collaborators.identity_url,
        event_registry = %config.collaborators.event_registry_url,
        notifications = %config.collaborators.notification_url,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = format!("{}:{}", config.server.metrics_host, config.server.metrics_port)
        .parse()
        .context("invalid metrics address")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    appointments::metrics::register_metrics();
    tracing::info!(address = %metrics_addr, "Metrics exporter listening");

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(2))
        .build()
        .context("failed to build HTTP client")?;
    let collaborators = Collaborators {
        identity: Arc::new(HttpIdentityLookup::new(
            client.clone(),
            &config.collaborators.identity_url,
        )?),
        events: Arc::new(HttpEventRegistry::new(
            client.clone(),
            &config.collaborators.event_registry_url,
        )?),
        notifications: Arc::new(HttpNotificationDispatcher::new(
            client,
            &config.collaborators.notification_url,
        )?),
    };

    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory appointment store; data is lost on restart");
            serve(&config, collaborators, Arc::new(InMemoryAppointmentRepository::new())).await
        },
        StorageBackend::Postgres => serve_postgres(&config, collaborators).await,
    }
}

#[cfg(feature = "postgres")]
async fn serve_postgres(config: &Config, collaborators: Collaborators) -> anyhow::Result<()> {
    use appointments::stores::PostgresAppointmentRepository;

    let url = config
        .storage
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for the postgres backend")?;

    tracing::info!("Connecting to appointment database...");
    let repository = PostgresAppointmentRepository::connect(
        url,
        config.storage.max_connections,
        Duration::from_secs(config.storage.connect_timeout),
    )
    .await?;
    tracing::info!("Appointment database connected");

    if config.storage.run_migrations {
        repository.migrate().await?;
        tracing::info!("Migrations complete");
    }

    serve(config, collaborators, Arc::new(repository)).await
}

#[cfg(not(feature = "postgres"))]
async fn serve_postgres(_config: &Config, _collaborators: Collaborators) -> anyhow::Result<()> {
    anyhow::bail!("this build does not include the postgres backend")
}

async fn serve<R>(config: &Config, collaborators: Collaborators, repository: Arc<R>) -> anyhow::Result<()>
where
    R: AppointmentRepository + 'static,
{
    let service = AppointmentService::new(
        collaborators.identity,
        collaborators.events,
        collaborators.notifications,
        repository,
        Arc::new(SystemClock),
        config.timeouts,
        config.notifications.retry_policy(),
    );
    let runner = service.runner().clone();
    let app = build_router(AppState::new(service));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(address = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(error) = runner
        .drain(Duration::from_secs(config.server.shutdown_timeout))
        .await
    {
        tracing::warn!(%error, "Notifications still pending at shutdown");
    }

    tracing::info!("Server stopped");
    Ok(())
}
