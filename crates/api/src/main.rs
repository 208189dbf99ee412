use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use housing_api::background;
use housing_api::config::ServerConfig;
use housing_api::metrics::MetricsTracker;
use housing_api::router::build_app_router;
use housing_api::state::AppState;
use housing_retraining::{HousingService, RetrainConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "housing_api=debug,housing_retraining=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let retrain_config = RetrainConfig::from_env();
    tracing::info!(
        models_dir = %retrain_config.models_dir.display(),
        data_dir = %retrain_config.data_dir.display(),
        model = %retrain_config.model_name,
        min_new_samples = retrain_config.min_new_samples,
        max_daily_retrains = retrain_config.max_daily_retrains,
        "Loaded retraining configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = housing_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    housing_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    housing_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Metrics ---
    let metrics = Arc::new(MetricsTracker::new());

    // --- Serving facade ---
    let service = Arc::new(
        HousingService::builder(retrain_config)
            .telemetry(Arc::clone(&metrics) as _)
            .open()
            .expect("Failed to open retraining stores"),
    );
    tracing::info!(
        model = service.model_name(),
        loaded = service.model_loaded(),
        "Housing service ready"
    );

    // --- Event bus ---
    let event_bus = Arc::new(housing_events::EventBus::default());
    tracing::info!("Event bus created");

    // Spawn event persistence (writes prediction and request logs).
    let persistence_handle = tokio::spawn(housing_events::EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));

    // --- Background jobs ---
    let jobs_cancel = CancellationToken::new();
    let mut job_handles = vec![tokio::spawn(background::log_retention::run(
        pool.clone(),
        config.prediction_log_retention_days,
        jobs_cancel.clone(),
    ))];
    match config.auto_retrain_interval_secs {
        Some(secs) => job_handles.push(tokio::spawn(background::auto_retrain::run(
            Arc::clone(&service),
            Duration::from_secs(secs.max(1)),
            jobs_cancel.clone(),
        ))),
        None => tracing::info!("Automatic retraining disabled"),
    }

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        service,
        metrics,
        event_bus: Arc::clone(&event_bus),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain = Duration::from_secs(config.shutdown_timeout_secs);

    // Stop background jobs. An in-flight retrain finishes on the blocking pool.
    jobs_cancel.cancel();
    for handle in job_handles {
        let _ = tokio::time::timeout(drain, handle).await;
    }
    tracing::info!("Background jobs stopped");

    // Drop the event bus sender to close the broadcast channel.
    // This signals persistence to shut down.
    drop(event_bus);
    let _ = tokio::time::timeout(drain, persistence_handle).await;
    tracing::info!("Event persistence shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
