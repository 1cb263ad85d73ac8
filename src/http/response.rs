//! Response construction.
//!
//! # Responsibilities
//! - Build the image response (content type, length, cache indicator)
//! - Attach CORS headers to every response, errors and preflights included
//! - Map core errors to status codes

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::compose::{RenderError, Rendered};
use crate::config::CorsConfig;

/// Custom header reporting whether the composite came from the cache.
pub const CACHE_HIT: HeaderName = HeaderName::from_static("cache-hit");

/// Wire format of every composite.
pub const IMAGE_PNG: &str = "image/png";

/// 200 response carrying an encoded composite.
pub fn image_response(rendered: Rendered) -> Response {
    let len = rendered.bytes.len();
    let mut response = Response::new(Body::from(rendered.bytes));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(IMAGE_PNG));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(
        CACHE_HIT,
        HeaderValue::from_static(if rendered.cache_hit { "true" } else { "false" }),
    );
    response
}

impl IntoResponse for RenderError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "could not generate image").into_response()
    }
}

/// CORS header values, parsed once at startup.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl CorsHeaders {
    pub fn from_config(config: &CorsConfig) -> Self {
        let defaults = CorsConfig::default();
        let parse = |value: &str, fallback: &str| {
            HeaderValue::from_str(value).unwrap_or_else(|_| {
                tracing::warn!(value, fallback, "Invalid CORS header value, using default");
                HeaderValue::from_str(fallback).unwrap_or(HeaderValue::from_static("*"))
            })
        };
        Self {
            allow_origin: parse(&config.allow_origin, &defaults.allow_origin),
            allow_methods: parse(&config.allow_methods, &defaults.allow_methods),
            allow_headers: parse(&config.allow_headers, &defaults.allow_headers),
        }
    }

    /// Wrap `router` so every response carries the CORS headers.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                self.allow_origin,
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                self.allow_methods,
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                self.allow_headers,
            ))
    }
}
