//! Emoji compositing service library.

pub mod compose;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use compose::{CompositeService, RenderRequest};
pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
