//! Network layer subsystem.
//!
//! Listeners themselves are bound by `lifecycle::startup` and served by
//! `http::server`; this module holds the TLS material loading used by the
//! HTTPS variant.

pub mod tls;
