use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::ingest::{IngestError, IngestOutcome, IngestService};
use crate::pool::PoolStats;
use crate::stats::Stats;
use crate::storage::{MemoryStats, MemoryStorage, SeriesSummary};

/// Application state shared across handlers
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub storage: Arc<MemoryStorage>,
    pub stats: Arc<Stats>,
    /// Largest accepted ingest body in bytes, 0 for no limit
    pub max_body_bytes: usize,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Ingest
// ============================================================================

/// `POST /ingest?name=app{tags}&format=...` with the profile as the raw body
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestOutcome>, ApiError> {
    let outcome = state.ingest.ingest(&first_values(pairs), &headers, &body)?;
    Ok(Json(outcome))
}

/// Collapse repeated query parameters, keeping the first occurrence.
fn first_values(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    let mut query = HashMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        query.entry(name).or_insert(value);
    }
    query
}

// ============================================================================
// Series
// ============================================================================

#[derive(Serialize)]
pub struct SeriesListResponse {
    pub series: Vec<SeriesSummary>,
}

pub async fn list_series(State(state): State<Arc<AppState>>) -> Json<SeriesListResponse> {
    Json(SeriesListResponse {
        series: state.storage.all_series(),
    })
}

pub async fn get_series(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<SeriesSummary>, ApiError> {
    state
        .storage
        .series(&key)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Series '{}' not found", key)))
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub counters: BTreeMap<String, u64>,
    pub apps: usize,
    pub series: usize,
    pub buffers: PoolStats,
    pub memory: MemoryStats,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let snapshot = state.stats.snapshot();

    Json(StatsResponse {
        counters: snapshot.counters,
        apps: snapshot.apps,
        series: state.storage.len(),
        buffers: state.ingest.pool_stats(),
        memory: state.storage.memory_stats(),
    })
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unprocessable(String),
    Internal(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::InvalidParameter { .. } => ApiError::BadRequest(err.to_string()),
            IngestError::Decode(_) => ApiError::Unprocessable(err.to_string()),
            IngestError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_parameters_keep_first_value() {
        let query = first_values(vec![
            ("name".to_string(), "first.app".to_string()),
            ("spyName".to_string(), "rbspy".to_string()),
            ("name".to_string(), "second.app".to_string()),
        ]);

        assert_eq!(query.len(), 2);
        assert_eq!(query["name"], "first.app");
        assert_eq!(query["spyName"], "rbspy");
    }
}
