//! HTTP API and static chat UI.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Ask a question; returns answer, sources, session id |
//! | `GET`  | `/api/courses` | Course count and titles |
//! | `DELETE` | `/api/sessions/{id}` | Forget a session's history (`204`) |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/*` | Static chat UI from `server.frontend_dir` |
//!
//! # Error Contract
//!
//! Failures inside a handler return `500` with
//!
//! ```json
//! { "detail": "LLM API error 529: overloaded" }
//! ```
//!
//! A body without the required `query` field is rejected by the JSON
//! extractor with `422`. An empty `query` string is accepted.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the UI can be served
//! from elsewhere during development.

use axum::{
    extract::{Path as UrlPath, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeader;
use tower_http::trace::TraceLayer;

use course_rag_core::models::Source;

use crate::rag::{CourseAnalytics, RagSystem};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    rag: Arc<RagSystem>,
}

/// Build the router. The static UI is mounted only when `frontend_dir` exists.
pub fn router(rag: Arc<RagSystem>, frontend_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/courses", get(handle_courses))
        .route("/api/sessions/{session_id}", delete(handle_clear_session))
        .route("/health", get(handle_health));

    if let Some(dir) = frontend_dir.filter(|d| d.is_dir()) {
        app = app.fallback_service(no_cache(ServeDir::new(dir)));
    }

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { rag })
}

type NoCache<S> =
    SetResponseHeader<SetResponseHeader<SetResponseHeader<S, HeaderValue>, HeaderValue>, HeaderValue>;

/// Disable client caching so UI edits show up on reload.
fn no_cache<S>(inner: S) -> NoCache<S> {
    let cache_control = SetResponseHeader::overriding(
        inner,
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    let pragma = SetResponseHeader::overriding(
        cache_control,
        header::PRAGMA,
        HeaderValue::from_static("no-cache"),
    );
    SetResponseHeader::overriding(pragma, header::EXPIRES, HeaderValue::from_static("0"))
}

/// Bind `server.bind` and serve until the process is stopped.
pub async fn run_server(rag: Arc<RagSystem>) -> anyhow::Result<()> {
    let bind_addr = rag.config().server.bind.clone();
    let frontend_dir = rag.config().server.frontend_dir.clone();
    if !frontend_dir.is_dir() {
        tracing::warn!(dir = %frontend_dir.display(), "frontend directory missing, serving API only");
    }

    let app = router(rag, Some(&frontend_dir));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Handler failure rendered as `{"detail": message}`.
struct AppError {
    status: StatusCode,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: err.to_string(),
        }
    }
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<Source>,
    session_id: String,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let outcome = state.rag.query(&req.query, req.session_id.as_deref()).await?;
    Ok(Json(QueryResponse {
        answer: outcome.answer,
        sources: outcome.sources,
        session_id: outcome.session_id,
    }))
}

// ============ GET /api/courses ============

async fn handle_courses(State(state): State<AppState>) -> Result<Json<CourseAnalytics>, AppError> {
    Ok(Json(state.rag.course_analytics().await?))
}

// ============ DELETE /api/sessions/{id} ============

async fn handle_clear_session(
    State(state): State<AppState>,
    UrlPath(session_id): UrlPath<String>,
) -> StatusCode {
    state.rag.sessions().clear_session(&session_id);
    StatusCode::NO_CONTENT
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
