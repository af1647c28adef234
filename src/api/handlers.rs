use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::cache::{CacheKey, CacheStats, ResponseCache};
use crate::data::{EpochSeconds, Sample, SeriesFilter, TimeValue};
use crate::query::{
    run_downsample, AggregateFunction, AggregateScanner, BucketPlanner, DownsampleRequest,
    Payload, PlanError, QueryError, ResponseMode, ScanError,
};
use crate::storage::{StorageEngine, StorageError};

const UNAVAILABLE_HINT: &str =
    "The sample store is not serving. Restart the server and load data via POST /api/ingest.";

/// Application state shared across handlers
pub struct AppState {
    pub engine: Arc<StorageEngine>,
    pub planner: BucketPlanner,
    /// `None` when caching is disabled
    pub cache: Option<ResponseCache>,
    /// Key of the single group returned by `/api/sensors`
    pub sensor_group: String,
}

impl AppState {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self {
            engine,
            planner: BucketPlanner::default(),
            cache: None,
            sensor_group: "sensors".to_string(),
        }
    }

    pub fn with_planner(mut self, planner: BucketPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_cache(mut self, cache: Option<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_sensor_group(mut self, group: impl Into<String>) -> Self {
        self.sensor_group = group.into();
        self
    }
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct RootResponse {
    pub status: &'static str,
    pub system: &'static str,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "online",
        system: "Sensorplot sensor backend (in-memory)",
    })
}

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
// Status
// ============================================================================

#[derive(Serialize)]
pub struct StatusResponse {
    pub row_count: usize,
    pub series_count: usize,
    pub shard_count: usize,
    pub memory_bytes: usize,
    pub db_engine: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

/// Always answers `200`; a store that cannot report is described in the body
pub async fn status(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.stats() {
        Ok(stats) => Json(StatusResponse {
            row_count: stats.table.row_count,
            series_count: stats.series_count,
            shard_count: stats.table.shard_count,
            memory_bytes: stats.table.memory_bytes,
            db_engine: "sensorplot-memory",
            cache: state.cache.as_ref().map(ResponseCache::stats),
        })
        .into_response(),
        Err(e) => {
            tracing::warn!("Status unavailable: {}", e);
            Json(serde_json::json!({ "error": e.to_string(), "hint": UNAVAILABLE_HINT }))
                .into_response()
        }
    }
}

// ============================================================================
// Sensors
// ============================================================================

pub async fn sensors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, Vec<String>>>, ApiError> {
    let ids = state.engine.series_ids()?;

    let mut groups = BTreeMap::new();
    groups.insert(state.sensor_group.clone(), ids);
    Ok(Json(groups))
}

// ============================================================================
// Data
// ============================================================================

/// Raw `/api/data` query string.
///
/// Everything arrives as text so that an empty value (`?start=`) can be told
/// apart from a missing one and parse failures become `400`s with a message.
#[derive(Debug, Default, Deserialize)]
pub struct DataParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub width: Option<String>,
    pub ids: Option<String>,
    pub agg: Option<String>,
}

impl DataParams {
    pub fn into_request(self) -> Result<DownsampleRequest, ApiError> {
        let start = parse_bound("start", self.start.as_deref())?;
        let end = parse_bound("end", self.end.as_deref())?;

        let target_width = match non_empty(self.width.as_deref()) {
            None => 0,
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                ApiError::BadRequest(format!("Invalid width '{}': expected an integer", raw))
            })?,
        };

        let function = match non_empty(self.agg.as_deref()) {
            None => AggregateFunction::default(),
            Some(raw) => raw.parse::<AggregateFunction>()?,
        };

        // The presence of `ids`, even empty, selects the multi-series shape
        let (filter, mode) = match self.ids {
            Some(raw) => (SeriesFilter::parse(&raw), ResponseMode::MultiSeries),
            None => (SeriesFilter::all(), ResponseMode::Legacy),
        };

        Ok(DownsampleRequest {
            start,
            end,
            target_width,
            filter,
            function,
            mode,
        })
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_bound(
    name: &str,
    raw: Option<&str>,
) -> Result<Option<EpochSeconds>, ApiError> {
    non_empty(raw)
        .map(|raw| {
            TimeValue::from(raw)
                .to_epoch_seconds()
                .map_err(|e| ApiError::BadRequest(format!("Invalid {}: {}", name, e)))
        })
        .transpose()
}

pub async fn data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DataParams>,
) -> Result<Json<Payload>, ApiError> {
    let request = params.into_request()?;

    // Generation is taken before the scan so a racing ingest voids the put
    let cached = state
        .cache
        .as_ref()
        .map(|cache| (CacheKey::new(&request), cache.generation()));
    if let (Some(cache), Some((key, _))) = (&state.cache, &cached) {
        if let Some(payload) = cache.get(key) {
            tracing::debug!("serving /api/data from cache");
            return Ok(Json(payload));
        }
    }

    // Scans are CPU bound, keep them off the async workers
    let worker = Arc::clone(&state);
    let payload = tokio::task::spawn_blocking(move || {
        run_downsample(worker.engine.as_ref(), &request, &worker.planner)
            .map(|outcome| outcome.into_payload(request.mode))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Query task failed: {}", e)))??;

    if let (Some(cache), Some((key, generation))) = (&state.cache, cached) {
        cache.put(key, payload.clone(), generation);
    }

    Ok(Json(payload))
}

// ============================================================================
// Ingest
// ============================================================================

#[derive(Deserialize)]
pub struct IngestRequest {
    pub samples: Vec<IngestSample>,
}

#[derive(Deserialize)]
pub struct IngestSample {
    #[serde(alias = "timestamp")]
    pub time: IngestTime,
    #[serde(alias = "series_id", alias = "id")]
    pub sensor_id: String,
    pub value: f64,
}

/// Epoch seconds or any text form [`TimeValue`] understands
#[derive(Deserialize)]
#[serde(untagged)]
pub enum IngestTime {
    Number(f64),
    Text(String),
}

impl From<IngestTime> for TimeValue {
    fn from(time: IngestTime) -> Self {
        match time {
            IngestTime::Number(secs) => TimeValue::EpochSeconds(secs),
            IngestTime::Text(raw) => TimeValue::Text(raw),
        }
    }
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub inserted: usize,
    pub errors: usize,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let total = request.samples.len();

    let samples: Vec<Sample> = request
        .samples
        .into_iter()
        .filter_map(|raw| match TimeValue::from(raw.time).to_epoch_seconds() {
            Ok(secs) => Some(Sample::new(secs.as_f64(), raw.sensor_id, raw.value)),
            Err(e) => {
                tracing::warn!(sensor_id = %raw.sensor_id, "Skipping sample: {}", e);
                None
            }
        })
        .collect();

    let inserted = state.engine.insert_batch(&samples)?;

    if inserted > 0 {
        if let Some(cache) = &state.cache {
            cache.invalidate_all();
        }
    }

    tracing::info!(inserted, errors = total - inserted, "ingest complete");

    Ok(Json(IngestResponse {
        inserted,
        errors: total - inserted,
    }))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// The store cannot serve; reported with a remediation hint
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "detail": msg }))
            }
            ApiError::Unavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "detail": msg, "hint": UNAVAILABLE_HINT }),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "detail": msg }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::StoreUnavailable(msg) => ApiError::Unavailable(msg),
            ScanError::UnsupportedAggregate(_) => ApiError::BadRequest(err.to_string()),
            ScanError::Timestamp(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Scan(scan) => scan.into(),
            QueryError::Plan(plan @ PlanError::TooManyBuckets { .. }) => {
                ApiError::BadRequest(plan.to_string())
            }
            QueryError::Plan(plan) => ApiError::Internal(plan.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Closed => ApiError::Unavailable(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
