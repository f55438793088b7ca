// Write-off Reconciliation - REST API with Axum
// Every request reruns the pipeline; the shared LoadCache keeps unchanged
// files from being re-read.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::{
    kpi_cards, run_pipeline, AppConfig, KpiCard, LoadCache, ReconError, ReconciliationReport,
    WriteoffTotals, DEFAULT_EXPORT_FILENAME,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<LoadCache>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            cache: Arc::new(LoadCache::new()),
        }
    }

    fn reconcile(&self) -> Result<ReconciliationReport, ReconError> {
        run_pipeline(&self.config, &self.cache)
    }

    fn export_filename(&self) -> String {
        self.config
            .output
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_EXPORT_FILENAME.to_string())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Summary response
#[derive(Serialize)]
struct SummaryResponse {
    totals: WriteoffTotals,
    cards: Vec<KpiCard>,
    matched_rows: usize,
    warnings: Vec<String>,
    generated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&ReconciliationReport> for SummaryResponse {
    fn from(report: &ReconciliationReport) -> Self {
        Self {
            totals: report.totals,
            cards: kpi_cards(&report.totals).to_vec(),
            matched_rows: report.matched_rows,
            warnings: report.warnings.iter().map(|w| w.to_string()).collect(),
            generated_at: report.generated_at,
        }
    }
}

/// Augmented write-offs, every cell rendered as it would be in the CSV
#[derive(Serialize)]
struct WriteoffsResponse {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn pipeline_error(err: ReconError) -> Response {
    log::error!("reconciliation failed: {}", err);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::<()>::err(err.to_string())),
    )
        .into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/summary - KPI totals, formatted cards and column warnings
async fn get_summary(State(state): State<AppState>) -> Response {
    match state.reconcile() {
        Ok(report) => {
            let summary = SummaryResponse::from(&report);
            (StatusCode::OK, Json(ApiResponse::ok(summary))).into_response()
        }
        Err(e) => pipeline_error(e),
    }
}

/// GET /api/writeoffs - Augmented write-off rows
async fn get_writeoffs(State(state): State<AppState>) -> Response {
    match state.reconcile() {
        Ok(report) => {
            let table = report.augmented;
            let rows = table
                .rows
                .iter()
                .map(|row| {
                    (0..table.headers.len())
                        .map(|i| row.get(i).map(|v| v.to_csv_string()).unwrap_or_default())
                        .collect::<Vec<String>>()
                })
                .collect();
            let response = WriteoffsResponse {
                headers: table.headers.clone(),
                rows,
            };
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e) => pipeline_error(e),
    }
}

/// GET /download - Augmented write-offs as a CSV attachment
async fn download_csv(State(state): State<AppState>) -> Response {
    let report = match state.reconcile() {
        Ok(report) => report,
        Err(e) => return pipeline_error(e),
    };

    match report.augmented.to_csv_bytes() {
        Ok(bytes) => {
            let disposition = format!("attachment; filename=\"{}\"", state.export_filename());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            log::error!("CSV export failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// Build the full router. Split out of `main` so it can be driven in tests.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/summary", get(get_summary))
        .route("/writeoffs", get(get_writeoffs))
        .with_state(state.clone());

    Router::new()
        .route("/", get(serve_index))
        .route("/download", get(download_csv))
        .with_state(state)
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// TESTS
// ============================================================================
