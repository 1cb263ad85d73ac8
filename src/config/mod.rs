//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → cloned into the subsystems that need a section
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, override_bind_address, parse_config, ConfigError};
pub use schema::AssetConfig;
pub use schema::CacheConfig;
pub use schema::CorsConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServiceConfig;
pub use schema::TlsConfig;
