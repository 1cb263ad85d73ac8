//! Compositing core.
//!
//! # Data Flow
//! ```text
//! RenderRequest (top, bottom, percent)
//!     → key.rs (CacheKey, injective over the triple)
//!     → cache.rs (bounded lookup)
//!     → service.rs (per-key in-flight coalescing on miss)
//!         → assets.rs (read + decode top, then bottom)
//!         → compositor.rs (split canvas, PNG encode)
//!         → cache.rs (insert if below capacity)
//!     → Rendered { bytes, cache_hit }
//! ```
//!
//! # Design Decisions
//! - The cache is an explicit object handed to the service, never a global
//! - Output bytes are deterministic for a given pair of inputs and percent
//! - Decode/composite/encode run on the blocking pool, off the async workers

pub mod assets;
pub mod cache;
pub mod compositor;
pub mod error;
pub mod key;
pub mod service;

pub use assets::AssetStore;
pub use cache::CompositeCache;
pub use error::{AssetError, CompositeError, RenderError};
pub use key::CacheKey;
pub use service::{CacheStats, CompositeService, RenderRequest, Rendered};
