//! `GET /generate?top=<id>&bottom=<id>&percent=<0..=100>`.

use std::time::Instant;

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::compose::{AssetStore, RenderRequest};
use crate::http::request::request_id;
use crate::http::response::image_response;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Raw query parameters; empty values count as missing.
#[derive(Debug, Default)]
pub struct GenerateParams {
    pub top: Option<String>,
    pub bottom: Option<String>,
    pub percent: Option<String>,
}

/// Reasons a generate request is rejected before any work is done.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("top, bottom, or percent missing")]
    MissingField,
    #[error("percent {0:?} was not parseable")]
    InvalidPercent(String),
    #[error("percent outside of allowed bounds: {0}")]
    PercentOutOfRange(i32),
    #[error("invalid asset identifier {0:?}")]
    InvalidIdentifier(String),
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl GenerateParams {
    /// Read the three fields from a raw query string.
    ///
    /// A repeated key keeps its first occurrence; unknown keys are ignored.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match name.as_ref() {
                "top" => &mut params.top,
                "bottom" => &mut params.bottom,
                "percent" => &mut params.percent,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    /// Check presence, parse the percent and vet identifiers against the store.
    pub fn validate(self, assets: &AssetStore) -> Result<RenderRequest, RequestError> {
        let (Some(top), Some(bottom), Some(percent)) = (
            non_empty(self.top),
            non_empty(self.bottom),
            non_empty(self.percent),
        ) else {
            return Err(RequestError::MissingField);
        };

        let percent: i32 = percent
            .parse()
            .map_err(|_| RequestError::InvalidPercent(percent.clone()))?;
        let percent = u8::try_from(percent)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(RequestError::PercentOutOfRange(percent))?;

        for identifier in [&top, &bottom] {
            if !assets.accepts(identifier) {
                return Err(RequestError::InvalidIdentifier(identifier.clone()));
            }
        }

        Ok(RenderRequest::new(top, bottom, percent))
    }
}

/// Validate, then serve the composite from cache or compute it.
pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let started = Instant::now();
    let request_id = request_id(&headers);
    let params = GenerateParams::from_query(query.as_deref().unwrap_or_default());

    let response = match params.validate(state.service.assets()) {
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected generate request");
            e.into_response()
        }
        Ok(request) => match state.service.render(&request).await {
            Ok(rendered) => {
                tracing::debug!(
                    request_id = %request_id,
                    top = %request.top,
                    bottom = %request.bottom,
                    percent = request.percent,
                    cache_hit = rendered.cache_hit,
                    size = rendered.bytes.len(),
                    "Serving composite"
                );
                image_response(rendered)
            }
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    top = %request.top,
                    bottom = %request.bottom,
                    percent = request.percent,
                    error = %e,
                    "Failed to generate composite"
                );
                e.into_response()
            }
        },
    };

    metrics::record_request("generate", response.status().as_u16(), started);
    response
}

/// CORS preflight: empty 200, headers added by the CORS layers.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}
