//! Read-only analytics HTTP server.
//!
//! Every handler validates its query string into a read window, calls one
//! pipeline from [`qa_insight_core::analytics`] and returns JSON (or report
//! bytes). Handlers share nothing but the immutable [`AppState`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version, never needs a token) |
//! | `GET`  | `/dashboard` | Feedback totals, recent feedback, top no-result queries |
//! | `GET`  | `/feedback/summary` | Per-query satisfaction counts |
//! | `GET`  | `/qa-logs` | Paginated QA logs with rerank results |
//! | `GET`  | `/low-relevance-results` | Paginated per-query low-relevance groups |
//! | `GET`  | `/low-relevance-results/details` | Paginated raw low-relevance rows |
//! | `GET`  | `/low-relevance-results/export.csv` | CSV report over the whole filtered set |
//! | `GET`  | `/low-relevance-results/export.pdf` | PDF report over the whole filtered set |
//! | `GET`  | `/no-result/summary` | Most frequent queries that returned nothing |
//! | `GET`  | `/users` | Paginated user listing |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "limit must be between 1 and 100 (got 0)" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401),
//! `export_failed` (500), `internal` (500).
//!
//! # Authentication
//!
//! When `[server].api_token` is set, every endpoint except `/health`
//! requires `Authorization: Bearer <token>`.

use axum::{
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use qa_insight_core::aggregate::{FeedbackSummary, NoResultSummary, QuerySummary};
use qa_insight_core::analytics::{self, ReportFormat};
use qa_insight_core::dashboard::DashboardSummary;
use qa_insight_core::error::{ExportError, ValidationError};
use qa_insight_core::export::PdfOptions;
use qa_insight_core::models::{DetailRecord, Page, QaLog, User};
use qa_insight_core::store::AnalyticsStore;
use qa_insight_core::window::{QueryWindow, ReadWindow, RecordFilter, WindowParams};

use crate::config::Config;
use crate::db::{self, Access};
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<dyn AnalyticsStore>,
    window: QueryWindow,
    pdf: Arc<PdfOptions>,
}

impl AppState {
    /// Fails when the configured PDF font cannot be loaded.
    pub fn new(config: Arc<Config>, store: Arc<dyn AnalyticsStore>) -> anyhow::Result<Self> {
        let window = config.reports.query_window();
        let pdf = Arc::new(config.reports.pdf_options()?);
        Ok(Self {
            config,
            store,
            window,
            pdf,
        })
    }
}

/// Starts the HTTP server on `[server].bind` over a read-only pool.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config, Access::ReadOnly).await?;
    let store: Arc<dyn AnalyticsStore> = Arc::new(SqliteStore::new(pool));

    let app = build_router(AppState::new(Arc::new(config.clone()), store)?);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        addr = %bind_addr,
        auth = config.server.api_token.is_some(),
        "server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the full router. Tests drive it directly with `oneshot`.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/dashboard", get(handle_dashboard))
        .route("/feedback/summary", get(handle_feedback_summary))
        .route("/qa-logs", get(handle_qa_logs))
        .route("/low-relevance-results", get(handle_low_relevance))
        .route(
            "/low-relevance-results/details",
            get(handle_low_relevance_details),
        )
        .route("/low-relevance-results/export.csv", get(handle_export_csv))
        .route("/low-relevance-results/export.pdf", get(handle_export_pdf))
        .route("/no-result/summary", get(handle_no_result_summary))
        .route("/users", get(handle_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(handle_health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: message.into(),
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        bad_request(err.to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        bad_request(err.body_text())
    }
}

/// Maps pipeline failures: typed core errors keep their meaning, anything
/// else (store I/O) is `internal`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(validation) = err.downcast_ref::<ValidationError>() {
            return bad_request(validation.to_string());
        }
        if let Some(export) = err.downcast_ref::<ExportError>() {
            tracing::warn!(error = %export, "export failed");
            return AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "export_failed",
                message: export.to_string(),
            };
        }
        tracing::error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: err.to_string(),
        }
    }
}

// ============ Authentication ============

/// Outcome of checking a request's credentials.
#[derive(Debug, PartialEq, Eq)]
enum Auth {
    Granted,
    Denied(&'static str),
}

fn authorize(headers: &HeaderMap, expected: Option<&str>) -> Auth {
    let Some(expected) = expected else {
        return Auth::Granted;
    };
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Auth::Denied("missing bearer token");
    };
    match value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
        Some(token) if token == expected => Auth::Granted,
        Some(_) => Auth::Denied("invalid bearer token"),
        None => Auth::Denied("authorization header must be 'Bearer <token>'"),
    }
}

async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match authorize(req.headers(), state.config.server.api_token.as_deref()) {
        Auth::Granted => next.run(req).await,
        Auth::Denied(reason) => {
            tracing::debug!(path = %req.uri().path(), reason, "rejected request");
            unauthorized(reason).into_response()
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Summaries ============

/// `?limit=` for top-N style endpoints.
#[derive(Debug, Default, Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

async fn handle_dashboard(State(state): State<AppState>) -> Result<Json<DashboardSummary>, AppError> {
    let summarizer = state.config.reports.dashboard();
    let summary = analytics::dashboard(&*state.store, &summarizer).await?;
    Ok(Json(summary))
}

async fn handle_feedback_summary(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<Vec<FeedbackSummary>>, AppError> {
    let Query(params) = params?;
    let limit = state
        .window
        .validate_top_n(params.limit, state.config.reports.top_n)?;
    Ok(Json(analytics::feedback_summary(&*state.store, limit).await?))
}

async fn handle_no_result_summary(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<Vec<NoResultSummary>>, AppError> {
    let Query(params) = params?;
    let limit = state
        .window
        .validate_top_n(params.limit, state.config.reports.top_n)?;
    let all = RecordFilter::default();
    Ok(Json(
        analytics::no_result_summary(&*state.store, &all, limit).await?,
    ))
}

// ============ Listings ============

fn read_window(
    state: &AppState,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<ReadWindow, AppError> {
    let Query(params) = params?;
    Ok(state.window.validate(&params)?)
}

async fn handle_qa_logs(
    State(state): State<AppState>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<Page<QaLog>>, AppError> {
    let window = read_window(&state, params)?;
    Ok(Json(analytics::qa_logs(&*state.store, &window).await?))
}

async fn handle_low_relevance(
    State(state): State<AppState>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<Page<QuerySummary>>, AppError> {
    let window = read_window(&state, params)?;
    Ok(Json(
        analytics::low_relevance_summaries(&*state.store, &window).await?,
    ))
}

async fn handle_low_relevance_details(
    State(state): State<AppState>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<Page<DetailRecord>>, AppError> {
    let window = read_window(&state, params)?;
    Ok(Json(
        analytics::low_relevance_details(&*state.store, &window).await?,
    ))
}

async fn handle_users(
    State(state): State<AppState>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<Page<User>>, AppError> {
    let window = read_window(&state, params)?;
    Ok(Json(analytics::users(&*state.store, &window.paging).await?))
}

// ============ Exports ============

async fn handle_export_csv(
    State(state): State<AppState>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Response, AppError> {
    export(&state, params, ReportFormat::Csv).await
}

async fn handle_export_pdf(
    State(state): State<AppState>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Response, AppError> {
    export(&state, params, ReportFormat::Pdf).await
}

/// Renders the whole filtered set; `skip`/`limit` are validated but unused.
async fn export(
    state: &AppState,
    params: Result<Query<WindowParams>, QueryRejection>,
    format: ReportFormat,
) -> Result<Response, AppError> {
    let window = read_window(state, params)?;
    let report = analytics::export_report(
        &*state.store,
        &window.filter,
        format,
        &state.pdf,
    )
    .await?;

    tracing::info!(
        format = report.format.extension(),
        rows = report.rows,
        bytes = report.bytes.len(),
        filter = %window.filter.describe(),
        "report exported"
    );

    let disposition = format!(
        "attachment; filename=\"low_relevance_results.{}\"",
        report.format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, report.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(auth) = auth {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        }
        headers
    }

    #[test]
    fn test_authorize_without_configured_token() {
        assert_eq!(authorize(&headers(None), None), Auth::Granted);
    }

    #[test]
    fn test_authorize_with_token() {
        let expected = Some("s3cret");
        assert_eq!(authorize(&headers(Some("Bearer s3cret")), expected), Auth::Granted);
        assert!(matches!(
            authorize(&headers(None), expected),
            Auth::Denied(_)
        ));
        assert!(matches!(
            authorize(&headers(Some("Bearer nope")), expected),
            Auth::Denied(_)
        ));
        assert!(matches!(
            authorize(&headers(Some("s3cret")), expected),
            Auth::Denied(_)
        ));
    }

    #[test]
    fn test_anyhow_errors_keep_their_code() {
        let err: AppError = anyhow::Error::new(ValidationError::NegativeSkip(-1)).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: AppError = anyhow::Error::new(ExportError::Pdf("broken".into())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "export_failed");

        let err: AppError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(err.code, "internal");
    }
}
