//! Startup orchestration.
//!
//! # Responsibilities
//! - Start background exporters (metrics)
//! - Build the compositing service and HTTP server
//! - Load TLS material when configured
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::ServiceConfig;
use crate::http::HttpServer;
use crate::net::tls::load_tls_config;
use crate::observability::metrics;

/// Fatal startup or serving failure.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load TLS certificate/key: {0}")]
    Tls(#[source] std::io::Error),
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the service described by `config` until `shutdown` fires.
///
/// Take the receiver before any awaiting so an early trigger is not missed.
pub async fn run(config: ServiceConfig, shutdown: broadcast::Receiver<()>) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        cache_max_entries = config.cache.max_entries,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let tls = config.listener.tls.clone();
    let server = HttpServer::new(config);

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path))
                .await
                .map_err(StartupError::Tls)?;
            server.run_tls(rustls, shutdown).await?;
        }
        None => {
            let address = server.config().listener.bind_address.clone();
            let listener = TcpListener::bind(&address)
                .await
                .map_err(|source| StartupError::Bind { address, source })?;
            server.run(listener, shutdown).await?;
        }
    }
    Ok(())
}
