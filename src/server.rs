use crate::config::{Config, ALLOWED_EXTENSIONS};
use crate::detector::{DetectionResult, PlateDetector};
use crate::engines::{BackendRegistry, EngineInfo};
use crate::error::PlateError;
use crate::history::{default_limit, DetectionLog, LogEntry, LogQuery, LogStats};
use crate::record::DetectionRecord;
use crate::vehicles::{Vehicle, VehicleRegistry};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::header,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{Days, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<PlateDetector>,
    pub config: Arc<Config>,
    pub engine: &'static str,
    pub engines: Arc<Vec<EngineInfo>>,
    pub vehicles: Arc<VehicleRegistry>,
    pub log: Arc<DetectionLog>,
}

/// Detection response
#[derive(Serialize)]
pub struct DetectResponse {
    pub success: bool,
    pub detection: DetectionResult,
    pub filename: String,
    pub record: DetectionRecord,
    /// Registry entry for a detected plate, when one exists
    pub vehicle_info: Option<Vehicle>,
    pub processing_time_ms: u64,
}

#[derive(Deserialize)]
pub struct LookupRequest {
    #[serde(default)]
    pub plate: String,
}

#[derive(Serialize)]
pub struct LookupResponse {
    pub success: bool,
    pub found: bool,
    pub vehicle: Option<Vehicle>,
}

#[derive(Serialize)]
pub struct SaveVehicleResponse {
    pub success: bool,
    /// False when an existing record was replaced
    pub created: bool,
    pub vehicle: Option<Vehicle>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<Vehicle>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Serialize)]
pub struct EntriesResponse {
    pub success: bool,
    pub entries: Vec<LogEntry>,
    pub count: usize,
    /// Entries currently held by the log
    pub total: usize,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: LogStats,
}

#[derive(Deserialize)]
pub struct CleanupParams {
    #[serde(default = "default_retention_days")]
    pub days: u64,
}

fn default_retention_days() -> u64 {
    30
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub removed: usize,
    pub remaining: usize,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engine: String,
    pub available_engines: Vec<EngineInfo>,
    pub profiles: Vec<String>,
    pub allowed_extensions: Vec<String>,
    pub max_file_size_bytes: usize,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let registry = BackendRegistry::new(&config.engine)?;
    let backend = registry.select(&config.engine.backend)?;
    tracing::info!("Using OCR engine '{}'", backend.name());

    let vehicles = if config.sample_vehicles {
        VehicleRegistry::with_sample_data()
    } else {
        VehicleRegistry::new()
    };
    tracing::info!(
        vehicles = vehicles.len(),
        history_capacity = config.history_capacity,
        "Vehicle registry ready"
    );

    let state = AppState {
        vehicles: Arc::new(vehicles),
        log: Arc::new(DetectionLog::new(config.history_capacity)),
        engine: backend.name(),
        engines: Arc::new(registry.info()),
        detector: Arc::new(PlateDetector::new(backend, config.pipeline.clone())),
        config: Arc::new(config),
    };

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/detect", post(handle_detect))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/lookup", post(handle_lookup))
        .route("/vehicle", post(handle_save_vehicle))
        .route("/search", get(handle_search))
        .route("/history", get(handle_history))
        .route("/log/recent", get(handle_log_recent))
        .route("/log/search", get(handle_log_search))
        .route("/log/stats", get(handle_log_stats))
        .route("/log/export", get(handle_log_export))
        .route("/log/cleanup", post(handle_log_cleanup))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Lowercased extension of an uploaded filename if it is allowed
pub fn allowed_extension(filename: &str) -> Result<String, PlateError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .ok_or_else(|| PlateError::UnsupportedExtension(filename.to_string()))?;

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(PlateError::UnsupportedExtension(ext))
    }
}

/// Handle plate detection uploads
async fn handle_detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, PlateError> {
    let start = Instant::now();

    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PlateError::InvalidUpload(format!("Failed to parse multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| {
            PlateError::InvalidUpload(format!("Failed to read file data: {}", e))
        })?;
        upload = Some((filename, data));
    }

    let (original_name, data) = upload.ok_or(PlateError::MissingFile)?;
    if original_name.is_empty() {
        return Err(PlateError::InvalidUpload("No file selected".to_string()));
    }
    let ext = allowed_extension(&original_name)?;

    if data.len() > state.config.max_file_size {
        return Err(PlateError::FileTooLarge {
            size: data.len(),
            max: state.config.max_file_size,
        });
    }

    // Unique name on disk; the caller owns where uploads live long term
    let mut temp_file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&format!(".{}", ext))
        .tempfile()
        .map_err(|e| PlateError::Internal(format!("Failed to create temp file: {}", e)))?;

    temp_file
        .write_all(&data)
        .map_err(|e| PlateError::Internal(format!("Failed to write temp file: {}", e)))?;

    let filename = temp_file
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let detector = state.detector.clone();
    let detection = tokio::task::spawn_blocking(move || detector.detect_path(temp_file.path()))
        .await
        .map_err(|e| PlateError::Internal(format!("Detection task failed: {}", e)))?;

    let record = DetectionRecord::from_result(&detection, filename.clone());
    let vehicle_info = if detection.is_detected() {
        state.vehicles.lookup(&detection.number_plate)
    } else {
        None
    };
    state
        .log
        .append(LogEntry::new(record.clone(), vehicle_info.as_ref()));
    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        plate = %record.plate,
        confidence = record.confidence,
        status = ?record.status,
        image = %record.image_reference,
        upload = %original_name,
        processing_time_ms,
        owner_known = vehicle_info.is_some(),
        "Detection recorded"
    );
    if detection.is_error() {
        tracing::warn!("Detection error for {}: {}", original_name, detection.number_plate);
    }

    Ok(Json(DetectResponse {
        success: true,
        detection,
        filename,
        record,
        vehicle_info,
        processing_time_ms,
    }))
}

/// Look up the registry entry for a plate
async fn handle_lookup(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> Result<Json<LookupResponse>, PlateError> {
    if request.plate.trim().is_empty() {
        return Err(PlateError::InvalidRequest(
            "No plate number provided".to_string(),
        ));
    }

    let vehicle = state.vehicles.lookup(&request.plate);
    Ok(Json(LookupResponse {
        success: true,
        found: vehicle.is_some(),
        vehicle,
    }))
}

/// Insert or replace a registry entry
async fn handle_save_vehicle(
    State(state): State<AppState>,
    Json(vehicle): Json<Vehicle>,
) -> Result<Json<SaveVehicleResponse>, PlateError> {
    let plate = vehicle.plate.clone();
    let created = state.vehicles.upsert(vehicle)?;
    tracing::info!(plate = %plate.trim(), created, "Vehicle saved");

    Ok(Json(SaveVehicleResponse {
        success: true,
        created,
        vehicle: state.vehicles.lookup(&plate),
    }))
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, PlateError> {
    if params.q.trim().is_empty() {
        return Err(PlateError::InvalidRequest(
            "No search term provided".to_string(),
        ));
    }

    let results = state.vehicles.search(&params.q);
    Ok(Json(SearchResponse {
        success: true,
        count: results.len(),
        results,
    }))
}

/// Successful detections, newest first
async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<EntriesResponse> {
    entries_response(&state, state.log.history(params.limit))
}

/// All logged detections, newest first
async fn handle_log_recent(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<EntriesResponse> {
    entries_response(&state, state.log.recent(params.limit))
}

async fn handle_log_search(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Json<EntriesResponse> {
    entries_response(&state, state.log.search(&query))
}

async fn handle_log_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        success: true,
        stats: state.log.stats(Utc::now().date_naive()),
    })
}

/// Whole log as a CSV download
async fn handle_log_export(State(state): State<AppState>) -> impl IntoResponse {
    let filename = format!(
        "detections_{}.csv",
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        state.log.export_csv(),
    )
}

/// Drop log entries older than `days` days
async fn handle_log_cleanup(
    State(state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> Result<Json<CleanupResponse>, PlateError> {
    let cutoff = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(params.days))
        .ok_or_else(|| PlateError::InvalidRequest(format!("Invalid retention: {} days", params.days)))?;

    let removed = state.log.remove_before(cutoff);
    tracing::info!(removed, %cutoff, "Detection log cleaned up");

    Ok(Json(CleanupResponse {
        success: true,
        removed,
        remaining: state.log.len(),
    }))
}

fn entries_response(state: &AppState, entries: Vec<LogEntry>) -> Json<EntriesResponse> {
    Json(EntriesResponse {
        success: true,
        count: entries.len(),
        total: state.log.len(),
        entries,
    })
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.engine.to_string(),
        available_engines: state.engines.as_ref().clone(),
        profiles: state
            .detector
            .extractor()
            .profiles()
            .iter()
            .map(|p| p.name.to_string())
            .collect(),
        allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        max_file_size_bytes: state.config.max_file_size,
    })
}
