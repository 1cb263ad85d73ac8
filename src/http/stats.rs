//! `GET /stats`: cache occupancy and hit counters.

use axum::extract::State;
use axum::Json;

use crate::compose::CacheStats;
use crate::http::server::AppState;

pub async fn stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.service.stats())
}
