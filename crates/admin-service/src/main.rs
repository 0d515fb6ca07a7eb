use admin_service::config::{Config, LogFormat, StoreBackend};
use admin_service::errors::StartupError;
use admin_service::observability::metrics::init_metrics_recorder;
use admin_service::routes::{self, AppState};
use admin_service::tasks::{start_idle_shutdown, IdleShutdownConfig};
use common::credentials::CredentialBundle;
use common::parameter_store::{InMemoryParameterStore, ParameterStore, SsmParameterStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "admin_service=debug,common=info,tower_http=info";

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config is read before tracing so the format can be chosen
    let config = Config::from_env();
    let log_format = config.as_ref().map_or(LogFormat::Text, |c| c.log_format);
    init_tracing(log_format);

    info!("Starting Cruise admin service");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        StartupError::from(e)
    })?;

    info!(
        bind_address = %config.bind_address,
        store_backend = ?config.store_backend,
        region = %config.aws_region,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        StartupError::Metrics(e)
    })?;

    let store: Arc<dyn ParameterStore> = match config.store_backend {
        StoreBackend::Ssm => Arc::new(
            SsmParameterStore::connect(
                &config.aws_region,
                config.aws_endpoint_url.as_deref(),
                config.parameter_store_timeout,
            )
            .await,
        ),
        StoreBackend::Memory => Arc::new(InMemoryParameterStore::new()),
    };

    let credentials = match config.credentials.clone() {
        Some(bundle) => {
            info!("Using Auth0 credentials from environment");
            bundle
        }
        None => CredentialBundle::load(
            store.as_ref(),
            &config.credentials_parameter,
            config.parameter_store_timeout,
        )
        .await
            .map_err(|e| {
                error!("Failed to load Auth0 credentials: {}", e);
                StartupError::from(e)
            })?,
    };

    let bind_address = config.bind_address.clone();
    let idle_shutdown = config.idle_shutdown;

    let state = Arc::new(AppState::new(config, credentials, store).map_err(|e| {
        error!("Failed to initialize application state: {}", e);
        e
    })?);

    let shutdown_token = CancellationToken::new();
    let idle_task = idle_shutdown.map(|timeout| {
        info!(idle_timeout_secs = timeout.as_secs(), "Idle shutdown enabled");
        tokio::spawn(start_idle_shutdown(
            state.activity.clone(),
            IdleShutdownConfig::new(timeout),
            shutdown_token.clone(),
        ))
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Admin service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    shutdown_token.cancel();
    if let Some(task) = idle_task {
        let _ = task.await;
    }

    info!("Admin service shutdown complete");

    Ok(())
}

/// Resolves on SIGINT, SIGTERM or cancellation of `token` (idle shutdown).
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => {
                error!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
        () = token.cancelled() => info!("Idle timeout reached, starting graceful shutdown..."),
    }
}
