//! Plaintext listener that sends every request to the HTTPS origin.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

/// Router answering every path with `301 Moved Permanently`.
pub fn redirect_router(origin: &str) -> Router {
    let origin: Arc<str> = Arc::from(origin.trim_end_matches('/'));
    Router::new().fallback(redirect_to_https).with_state(origin)
}

/// `origin` joined with the request's path and query.
pub fn redirect_target(origin: &str, uri: &Uri) -> String {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("{}{}", origin, path)
}

async fn redirect_to_https(State(origin): State<Arc<str>>, uri: Uri) -> Response {
    let target = redirect_target(&origin, &uri);
    match HeaderValue::from_str(&target) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        Err(e) => {
            tracing::warn!(target = %target, error = %e, "Unrepresentable redirect target");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}
