// REST API with Axum
// Routes live in the library so the binary and the integration tests share them

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::db::{self, CreateTransactionRequest, Transaction};
use crate::error::FinanceError;
use crate::importer::import_statement;
use crate::summary::{self, Summary};

/// Multipart field that carries the statement file
pub const FILE_FIELD: &str = "file";

/// Shared application state: the one connection opened at startup
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|e| FinanceError::Internal(e.to_string()).into())
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// A `FinanceError` on its way out as `{"error": ...}`
#[derive(Debug)]
pub struct ApiError(pub FinanceError);

impl From<FinanceError> for ApiError {
    fn from(err: FinanceError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(err: &FinanceError) -> StatusCode {
    match err {
        FinanceError::Validation(_) | FinanceError::NoFile => StatusCode::BAD_REQUEST,
        FinanceError::NotFound(_) => StatusCode::NOT_FOUND,
        FinanceError::Import(_)
        | FinanceError::Database(_)
        | FinanceError::Config(_)
        | FinanceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(error = %self.0, "Request rejected");
        }

        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ImportResponse {
    mensaje: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "estado": "ok" }))
}

/// GET /api/transacciones - All transactions, newest first
async fn get_transactions(State(state): State<AppState>) -> Result<Json<Vec<Transaction>>, ApiError> {
    info!("GET /api/transacciones");
    let conn = state.conn()?;
    let transactions = db::list_transactions(&conn)?;

    Ok(Json(transactions))
}

/// POST /api/transacciones - Manual entry
async fn create_transaction(
    State(state): State<AppState>,
    body: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let Json(request) = body.map_err(|rejection| FinanceError::Validation(rejection.body_text()))?;
    info!(?request, "POST /api/transacciones");

    let conn = state.conn()?;
    let created = db::create_transaction(&conn, request)?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /api/transacciones/:id
async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    info!(id, "DELETE /api/transacciones");
    let conn = state.conn()?;
    db::delete_transaction(&conn, id)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Read the statement upload. `None` when the form has no file field.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<Bytes>, FinanceError> {
    let unreadable = |e: axum::extract::multipart::MultipartError| FinanceError::Import(e.body_text());

    while let Some(field) = multipart.next_field().await.map_err(unreadable)? {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field.bytes().await.map_err(unreadable)?;
            return Ok(Some(bytes));
        }
    }

    Ok(None)
}

/// POST /api/importar-csv - Bulk import of a bank statement
async fn import_csv(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ImportResponse>), ApiError> {
    // Not a multipart form at all: there is no file to speak of
    let mut multipart = multipart.map_err(|_| FinanceError::NoFile)?;
    let bytes = read_file_field(&mut multipart)
        .await?
        .ok_or(FinanceError::NoFile)?;
    info!(bytes = bytes.len(), "POST /api/importar-csv");

    let mut conn = state.conn()?;
    let report = import_statement(&mut conn, &bytes)?;

    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            mensaje: report.message(),
        }),
    ))
}

/// GET /api/resumen - Totals and monthly breakdown
async fn get_summary(State(state): State<AppState>) -> Result<Json<Summary>, ApiError> {
    info!("GET /api/resumen");
    let conn = state.conn()?;
    let summary = summary::get_summary(&conn)?;

    Ok(Json(summary))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/transacciones", get(get_transactions).post(create_transaction))
        .route("/transacciones/:id", delete(delete_transaction))
        .route("/importar-csv", post(import_csv))
        .route("/resumen", get(get_summary))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
}
