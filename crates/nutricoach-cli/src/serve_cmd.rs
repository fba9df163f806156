use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use nutricoach_core::adjustment::{self, AdjustmentError, DietAdjuster};
use nutricoach_core::error::OperationError;
use nutricoach_core::plan;
use nutricoach_core::templates::{TemplateCache, TemplateStore};
use nutricoach_db::queries::plans as plan_db;

use crate::adjust_cmds::CheckinPayload;
use crate::config::ModelConfig;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }

}

impl From<OperationError> for AppError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::NotFound { .. } => Self::not_found(err.to_string()),
            OperationError::WrongStatus { .. } => Self::new(StatusCode::CONFLICT, err.to_string()),
            OperationError::Store(e) => Self::internal(e),
        }
    }
}

impl From<AdjustmentError> for AppError {
    fn from(err: AdjustmentError) -> Self {
        let status = match &err {
            AdjustmentError::NoActivePlan(_) => StatusCode::NOT_FOUND,
            AdjustmentError::Model(_) | AdjustmentError::MissingTextContent => StatusCode::BAD_GATEWAY,
            AdjustmentError::PlanLoad(_) | AdjustmentError::Persist(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // Display only: a persistence failure's cause stays in the log.
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State and request bodies
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub templates: TemplateStore,
    /// `None` when no API key is configured; generation then answers 503.
    pub adjuster: Option<Arc<DietAdjuster>>,
}

impl AppState {
    pub fn new(pool: PgPool, adjuster: Option<Arc<DietAdjuster>>) -> Self {
        let templates = TemplateStore::new(pool.clone(), Arc::new(TemplateCache::default()));
        Self {
            pool,
            templates,
            adjuster,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    #[serde(default)]
    pub activate_diet: bool,
    #[serde(default)]
    pub reviewer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    pub reviewer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub feedback_text: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/patients/{id}/plans", get(list_patient_plans))
        .route("/api/plans/{id}", get(get_plan_detail))
        .route("/api/plans/{id}/release", post(release_plan))
        .route("/api/checkins/{id}/adjustments", post(generate_adjustment))
        .route("/api/checkins/{id}/adjustment", get(get_checkin_adjustment))
        .route("/api/adjustments/{id}/approve", post(approve_adjustment))
        .route("/api/adjustments/{id}/reject", post(reject_adjustment))
        .route("/api/adjustments/{id}/feedback", put(update_feedback))
        .route("/api/templates", get(list_templates))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pool: PgPool, model: &ModelConfig, bind: &str, port: u16) -> Result<()> {
    let adjuster = match model.client() {
        Ok(client) => Some(Arc::new(DietAdjuster::new(pool.clone(), Arc::new(client)))),
        Err(e) => {
            warn!(error = %e, "adjustment generation disabled");
            None
        }
    };

    let app = build_router(AppState::new(pool, adjuster));
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("nutricoach serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("nutricoach serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

type ApiResult = Result<axum::response::Response, AppError>;

async fn list_patient_plans(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let plans = plan_db::list_plans_for_patient(&state.pool, id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(plans).into_response())
}

async fn get_plan_detail(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let plan = plan::get_plan_with_meals(&state.pool, id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("plan {id} not found")))?;
    Ok(Json(plan).into_response())
}

async fn release_plan(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let plan = plan::release_plan(&state.pool, id).await?;
    Ok(Json(plan).into_response())
}

async fn generate_adjustment(
    State(state): State<AppState>,
    Path(checkin_id): Path<Uuid>,
    Json(payload): Json<CheckinPayload>,
) -> ApiResult {
    let adjuster = state.adjuster.as_ref().ok_or_else(|| {
        AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "language model API key not configured",
        )
    })?;

    let request = payload.into_request(checkin_id, &state.templates).await?;
    let outcome = adjuster.analyze_and_suggest(&request).await?;

    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

async fn get_checkin_adjustment(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let suggestion = adjustment::get_adjustment_for_checkin(&state.pool, id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("no adjustment for check-in {id}")))?;
    Ok(Json(suggestion).into_response())
}

async fn approve_adjustment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ApproveBody>,
) -> ApiResult {
    let row = adjustment::approve_adjustment(
        &state.pool,
        id,
        body.activate_diet,
        body.reviewer.as_deref(),
    )
    .await?;
    Ok(Json(row).into_response())
}

async fn reject_adjustment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> ApiResult {
    let row = adjustment::reject_adjustment(&state.pool, id, body.reviewer.as_deref()).await?;
    Ok(Json(row).into_response())
}

async fn update_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<FeedbackBody>,
) -> ApiResult {
    let row = adjustment::update_feedback_text(&state.pool, id, &body.feedback_text).await?;
    Ok(Json(row).into_response())
}

async fn list_templates(State(state): State<AppState>) -> ApiResult {
    let templates = state.templates.list().await.map_err(AppError::internal)?;
    Ok(Json(templates).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
