//! REST endpoint for express checkout.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use super::{ExpressCheckout, ExpressCheckoutCandidate};
use crate::error::Error;
use crate::onboarding::registry::SessionRegistry;

#[derive(Clone)]
pub struct ExpressRouteState {
    pub checkout: Arc<ExpressCheckout>,
    /// Counts completed express bookings for the operator summary.
    pub registry: Arc<SessionRegistry>,
}

impl ExpressRouteState {
    /// Share the registry's config and providers.
    pub fn from_registry(registry: Arc<SessionRegistry>) -> Self {
        let checkout = ExpressCheckout::new(
            Arc::new(registry.config().clone()),
            registry.slot_provider(),
            registry.payment_processor(),
        );
        Self {
            checkout: Arc::new(checkout),
            registry,
        }
    }
}

/// POST /api/express-checkout
async fn express_checkout(
    State(state): State<ExpressRouteState>,
    Json(candidate): Json<ExpressCheckoutCandidate>,
) -> Result<impl IntoResponse, Error> {
    let confirmation = state.checkout.checkout(candidate).await?;
    state.registry.record_express_checkout();
    Ok((StatusCode::CREATED, Json(confirmation)))
}

pub fn express_routes(state: ExpressRouteState) -> Router {
    Router::new()
        .route("/api/express-checkout", post(express_checkout))
        .with_state(state)
}
