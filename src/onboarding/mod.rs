//! Onboarding wizard: step sequencing, gating and per-step data.
//!
//! A customer moves through a fixed sequence of steps. Each step's form is
//! validated, merged into the session and marked completed before the next
//! step unlocks. The emergency contact step may be skipped with explicit
//! confirmation.

pub mod access;
pub mod manager;
pub mod model;
pub mod registry;
pub mod routes;
pub mod session;
pub mod step;

pub use access::{IndicatorStatus, Progress, StepIndicator};
pub use manager::{
    Confirmation, LessonChoice, NavigationOutcome, OnboardingManager, OnboardingStatus,
    StepOutcome, StepSubmission,
};
pub use registry::{OperatorSummary, SessionRegistry, spawn_expiry_task};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use session::{OnboardingSession, SlotAvailability};
pub use step::Step;
