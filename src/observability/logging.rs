//! Structured logging.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and to `tower_http` request tracing.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directive used when `RUST_LOG` is absent.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    format!(
        "emoji_compositor={level},tower_http={level}",
        level = config.log_level
    )
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive(config).into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
