//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the compositing service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Where named raster assets live.
    pub assets: AssetConfig,

    /// Static file serving for the front-end build.
    pub static_files: StaticFilesConfig,

    /// Composite cache bounds.
    pub cache: CacheConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// CORS headers attached to every response.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080"). Serves HTTPS when `tls` is set.
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,

    /// Plaintext address that redirects to the HTTPS origin (e.g., "0.0.0.0:80").
    #[serde(default)]
    pub redirect_address: Option<String>,

    /// Origin prepended to redirected request paths (e.g., "https://funemoji.club").
    #[serde(default = "default_redirect_origin")]
    pub redirect_origin: String,
}

fn default_redirect_origin() -> String {
    "https://localhost".to_string()
}

/// Asset store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding `<identifier>.<extension>` files.
    pub root: String,

    /// Raster file extension, without the dot.
    pub extension: String,

    /// Reject identifiers containing path separators or `..`.
    pub strict_identifiers: bool,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: "./assets".to_string(),
            extension: "png".to_string(),
            strict_identifiers: true,
        }
    }
}

/// Static file serving configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Serve files for paths not handled by the API.
    pub enabled: bool,

    /// Build directory mirrored by request paths.
    pub root: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: "./build".to_string(),
        }
    }
}

/// Composite cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of encoded composites kept in memory.
    /// Once reached the cache is frozen; nothing is evicted.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        // ~25KB per composite, roughly 0.6 GB when full
        Self { max_entries: 25_000 }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// CORS response headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET".to_string(),
            allow_headers: "Accept, Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization"
                .to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
