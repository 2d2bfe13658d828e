//! HTTP application assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use tower_http::cors::{Any, CorsLayer};

use crate::express::routes::{ExpressRouteState, express_routes};
use crate::onboarding::registry::SessionRegistry;
use crate::onboarding::routes::{OnboardingRouteState, onboarding_routes};

/// Every route the service exposes, behind a CORS layer for the step
/// screens served from another origin.
pub fn build_router(registry: Arc<SessionRegistry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    onboarding_routes(OnboardingRouteState {
        registry: Arc::clone(&registry),
    })
    .merge(express_routes(ExpressRouteState::from_registry(registry)))
    .layer(cors)
}
