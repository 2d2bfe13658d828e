//! REST endpoints for wizard sessions and the operator dashboard.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{Error, SessionError};
use crate::validation::PaymentCandidate;

use super::manager::StepSubmission;
use super::registry::SessionRegistry;
use super::step::Step;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub registry: Arc<SessionRegistry>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            Error::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": message, "fields": fields.errors })),
            )
                .into_response(),
            Error::Request(report) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": report.title.clone(), "failure": report })),
            )
                .into_response(),
            Error::Session(SessionError::StepLocked { requested, redirect }) => (
                StatusCode::CONFLICT,
                Json(json!({ "error": message, "requested": requested, "redirect": redirect })),
            )
                .into_response(),
            Error::Session(err) => {
                let status = match err {
                    SessionError::NotFound { .. } => StatusCode::NOT_FOUND,
                    SessionError::Expired { .. } => StatusCode::GONE,
                    SessionError::SkipNotConfirmed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::CONFLICT,
                };
                (status, Json(json!({ "error": message }))).into_response()
            }
            Error::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response(),
        }
    }
}

type ApiResult<T> = Result<T, Error>;

#[derive(Debug, Deserialize)]
struct NavigateRequest {
    step: Step,
}

#[derive(Debug, Deserialize)]
struct SkipRequest {
    #[serde(default)]
    confirmed: bool,
}

#[derive(Debug, Deserialize)]
struct SlotQuery {
    date: NaiveDate,
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "surf-onboard"
    }))
}

/// POST /api/sessions
async fn create_session(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    let manager = state.registry.create().await;
    (StatusCode::CREATED, Json(manager.status().await))
}

/// GET /api/sessions/{id}
async fn get_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let manager = state.registry.get(id).await?;
    Ok(Json(manager.status().await))
}

/// DELETE /api/sessions/{id}
async fn delete_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.registry.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(SessionError::NotFound { id }.into())
    }
}

/// POST /api/sessions/{id}/reset
///
/// The session continues under a new id, returned in the snapshot.
async fn reset_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let manager = state.registry.reset(id).await?;
    Ok(Json(manager.status().await))
}

/// POST /api/sessions/{id}/steps
async fn submit_step(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
    Json(submission): Json<StepSubmission>,
) -> ApiResult<impl IntoResponse> {
    let manager = state.registry.get(id).await?;
    Ok(Json(manager.submit(submission).await?))
}

/// POST /api/sessions/{id}/navigate
async fn navigate(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NavigateRequest>,
) -> ApiResult<impl IntoResponse> {
    let manager = state.registry.get(id).await?;
    Ok(Json(manager.navigate(req.step).await))
}

/// POST /api/sessions/{id}/emergency/skip
async fn skip_emergency(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SkipRequest>,
) -> ApiResult<impl IntoResponse> {
    let manager = state.registry.get(id).await?;
    Ok(Json(manager.skip_emergency(req.confirmed).await?))
}

/// GET /api/sessions/{id}/recommendations
async fn recommendations(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let manager = state.registry.get(id).await?;
    Ok(Json(manager.recommendations().await))
}

/// GET /api/sessions/{id}/slots?date=YYYY-MM-DD
async fn slots(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> ApiResult<impl IntoResponse> {
    let manager = state.registry.get(id).await?;
    Ok(Json(manager.fetch_slots(query.date).await?))
}

/// POST /api/sessions/{id}/payment
async fn pay(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
    Json(candidate): Json<PaymentCandidate>,
) -> ApiResult<impl IntoResponse> {
    let manager = state.registry.get(id).await?;
    Ok(Json(manager.pay(candidate).await?))
}

/// GET /api/sessions/{id}/confirmation
async fn confirmation(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let manager = state.registry.get(id).await?;
    Ok(Json(manager.confirmation().await?))
}

/// GET /api/operator/summary
async fn operator_summary(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.registry.funnel_summary().await)
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/reset", post(reset_session))
        .route("/api/sessions/{id}/steps", post(submit_step))
        .route("/api/sessions/{id}/navigate", post(navigate))
        .route("/api/sessions/{id}/emergency/skip", post(skip_emergency))
        .route("/api/sessions/{id}/recommendations", get(recommendations))
        .route("/api/sessions/{id}/slots", get(slots))
        .route("/api/sessions/{id}/payment", post(pay))
        .route("/api/sessions/{id}/confirmation", get(confirmation))
        .route("/api/operator/summary", get(operator_summary))
        .with_state(state)
}
