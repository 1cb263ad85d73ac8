//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign/propagate request ID)
//!     → generate.rs (validate query, render via compose::CompositeService)
//!       | stats.rs (cache counters)
//!       | ServeDir fallback (static build files)
//!     → response.rs (image headers, CORS headers, error mapping)
//!     → Send to client
//!
//! TLS deployments additionally run redirect.rs on a plaintext port.
//! ```

pub mod generate;
pub mod redirect;
pub mod request;
pub mod response;
pub mod server;
pub mod stats;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
