//! Emoji compositing service.
//!
//! Serves `GET /generate?top=<id>&bottom=<id>&percent=<0..=100>`, returning a
//! PNG whose upper `percent` of rows come from one asset and the rest from
//! another, plus the static front-end build.
//!
//! # Architecture Overview
//!
//! ```text
//!  Client ──▶ listener (plain | TLS + redirect)
//!               │
//!               ▼
//!            http::server ── static paths ──▶ ServeDir (build dir)
//!               │
//!               ▼ /generate
//!            generate handler ── validate ──▶ 400
//!               │
//!               ▼
//!            CompositeService
//!               ├─ cache hit ──────────────────────────▶ PNG (Cache-Hit: true)
//!               └─ miss → in-flight per key
//!                    → assets (decode top, bottom)
//!                    → compositor (split + encode)
//!                    → cache insert (if below capacity) ─▶ PNG (Cache-Hit: false)
//! ```

use std::path::PathBuf;

use clap::Parser;

use emoji_compositor::config::{load_config, override_bind_address, ServiceConfig};
use emoji_compositor::lifecycle::{signals, startup, Shutdown};
use emoji_compositor::observability::logging;

#[derive(Parser)]
#[command(name = "emoji-compositor")]
#[command(about = "Split-composite two emoji images into one PNG over HTTP", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config = override_bind_address(config, bind)?;
    }

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "emoji-compositor starting"
    );

    let shutdown = Shutdown::new();
    let serve = startup::run(config, shutdown.subscribe());
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => result?,
        _ = signals::shutdown_on_signal(&shutdown) => serve.await?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
