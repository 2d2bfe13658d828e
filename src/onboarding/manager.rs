//! OnboardingManager owns one customer's session and runs every step
//! submission through validate, merge, complete and advance.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::WizardConfig;
use crate::error::{Result, SessionError};
use crate::lessons::{self, Recommendation, SlotProvider, catalog};
use crate::payments::{self, PaymentProcessor};
use crate::retry::RetryTracker;
use crate::validation::{
    AssessmentCandidate, BookingCandidate, EmergencyContactCandidate, FieldErrors,
    LoginCandidate, PaymentCandidate, ProfileCandidate, Schema, SignupCandidate,
    ValidationContext, WaiverCandidate,
};

use super::access::{self, Progress};
use super::model::{AuthProvider, Booking, PaymentRecord, PaymentStatus, UserSection};
use super::session::{OnboardingSession, SlotAvailability};
use super::step::Step;

/// Lesson picked on the recommendations step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonChoice {
    pub lesson_id: Option<String>,
}

/// One step's form data, tagged by `step`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepSubmission {
    Welcome,
    Signup(SignupCandidate),
    Login(LoginCandidate),
    Assessment(AssessmentCandidate),
    Profile(ProfileCandidate),
    Waiver(WaiverCandidate),
    Emergency(EmergencyContactCandidate),
    Recommendations(LessonChoice),
    Booking(BookingCandidate),
    Payment(PaymentCandidate),
}

impl StepSubmission {
    /// The wizard step this submission completes.
    pub fn step(&self) -> Step {
        match self {
            Self::Welcome => Step::Welcome,
            Self::Signup(_) | Self::Login(_) => Step::Auth,
            Self::Assessment(_) => Step::Assessment,
            Self::Profile(_) => Step::Profile,
            Self::Waiver(_) => Step::Waiver,
            Self::Emergency(_) => Step::Emergency,
            Self::Recommendations(_) => Step::Recommendations,
            Self::Booking(_) => Step::Booking,
            Self::Payment(_) => Step::Payment,
        }
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub completed: Step,
    pub current_step: Step,
    pub progress: Progress,
}

/// Where a navigation request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationOutcome {
    pub requested: Step,
    pub landed: Step,
    pub redirected: bool,
}

/// Session snapshot plus its progress indicators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStatus {
    pub session: OnboardingSession,
    pub progress: Progress,
}

/// Summary shown once the booking is paid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub booking_reference: String,
    pub session_id: Uuid,
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub lesson_title: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<u16>,
    pub location: Option<String>,
    pub instructor: Option<String>,
    pub participants: Option<u8>,
    pub amount: Option<Decimal>,
    pub payment: Option<String>,
    pub transaction_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Confirmation {
    fn from_session(session: &OnboardingSession) -> Result<Self> {
        let booking_reference = match (&session.booking_reference, session.is_completed()) {
            (Some(reference), true) => reference.clone(),
            _ => return Err(SessionError::NotCompleted.into()),
        };
        Ok(Self {
            booking_reference,
            session_id: session.session_id,
            customer_name: session.user.display_name(),
            email: session.user.email.clone(),
            lesson_title: session.booking.lesson_title.clone(),
            date: session.booking.date,
            start_time: session.booking.start_time,
            duration_minutes: session.booking.duration_minutes,
            location: session.booking.location.clone(),
            instructor: session.booking.instructor.clone(),
            participants: session.booking.participants,
            amount: session.payment.amount,
            payment: session.payment.masked_details.clone(),
            transaction_id: session.payment.transaction_id.clone(),
            completed_at: session.completed_at,
        })
    }
}

/// Coordinates one onboarding session: gating, validation, merging and the
/// simulated slot and payment calls.
pub struct OnboardingManager {
    session: RwLock<OnboardingSession>,
    config: Arc<WizardConfig>,
    slots: Arc<dyn SlotProvider>,
    payments: Arc<dyn PaymentProcessor>,
    /// Token of the most recent slot request.
    slot_requests: AtomicU64,
    payment_retry: Mutex<RetryTracker>,
}

impl OnboardingManager {
    pub fn new(
        config: Arc<WizardConfig>,
        slots: Arc<dyn SlotProvider>,
        payments: Arc<dyn PaymentProcessor>,
    ) -> Self {
        let payment_retry = Mutex::new(RetryTracker::new(config.retry_policy()));
        Self {
            session: RwLock::new(OnboardingSession::new()),
            config,
            slots,
            payments,
            slot_requests: AtomicU64::new(0),
            payment_retry,
        }
    }

    pub async fn session_id(&self) -> Uuid {
        self.session.read().await.session_id
    }

    pub async fn current_step(&self) -> Step {
        self.session.read().await.current_step
    }

    pub async fn snapshot(&self) -> OnboardingSession {
        self.session.read().await.clone()
    }

    pub async fn status(&self) -> OnboardingStatus {
        let session = self.session.read().await;
        OnboardingStatus {
            progress: access::progress(session.current_step, &session.completed_steps),
            session: session.clone(),
        }
    }

    pub async fn is_idle(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.session.read().await.is_idle(ttl, now)
    }

    fn context(&self, session: &OnboardingSession) -> ValidationContext {
        ValidationContext {
            user_full_name: session.user.display_name(),
            user_phone: session.user.phone.clone(),
            ..self.config.validation_context(Utc::now().date_naive())
        }
    }

    fn ensure_access(session: &OnboardingSession, step: Step) -> Result<()> {
        if session.can_access_step(step) {
            return Ok(());
        }
        let redirect =
            access::nearest_accessible(step, session.current_step, &session.completed_steps);
        Err(SessionError::StepLocked {
            requested: step,
            redirect,
        }
        .into())
    }

    /// Mark `step` completed and move on to the step after it.
    fn complete(session: &mut OnboardingSession, step: Step) -> StepOutcome {
        session.mark_step_completed(step);
        if let Some(next) = step.next() {
            session.set_current_step(next);
        }
        info!(
            session_id = %session.session_id,
            %step,
            current_step = %session.current_step,
            "Onboarding step completed"
        );
        StepOutcome {
            completed: step,
            current_step: session.current_step,
            progress: access::progress(session.current_step, &session.completed_steps),
        }
    }

    /// Validate a step's data, merge it into the session, mark the step
    /// completed and advance.
    ///
    /// Locked steps are rejected with [`SessionError::StepLocked`] carrying
    /// the step the customer should continue at.
    pub async fn submit(&self, submission: StepSubmission) -> Result<StepOutcome> {
        let step = submission.step();
        match submission {
            StepSubmission::Welcome => self.apply(step, |_, _| Ok(())).await,
            StepSubmission::Signup(candidate) => {
                self.apply(step, |session, ctx| {
                    let signup = candidate.validate(ctx)?;
                    session.update_user(signup.into());
                    Ok(())
                })
                .await
            }
            StepSubmission::Login(candidate) => {
                self.apply(step, |session, ctx| {
                    let login = candidate.validate(ctx)?;
                    session.update_user(UserSection {
                        email: Some(login.email),
                        auth_provider: Some(AuthProvider::Email),
                        ..Default::default()
                    });
                    Ok(())
                })
                .await
            }
            StepSubmission::Assessment(candidate) => {
                self.apply(step, |session, ctx| {
                    session.update_assessment(candidate.validate(ctx)?);
                    Ok(())
                })
                .await
            }
            StepSubmission::Profile(candidate) => {
                self.apply(step, |session, ctx| {
                    session.update_user(candidate.validate(ctx)?);
                    Ok(())
                })
                .await
            }
            StepSubmission::Waiver(candidate) => {
                self.apply(step, |session, ctx| {
                    session.update_waiver(candidate.validate(ctx)?);
                    Ok(())
                })
                .await
            }
            StepSubmission::Emergency(candidate) => {
                self.apply(step, |session, ctx| {
                    session.update_emergency_contact(candidate.validate(ctx)?);
                    Ok(())
                })
                .await
            }
            StepSubmission::Recommendations(choice) => {
                self.apply(step, |session, _| {
                    let lesson = Self::choose_lesson(session, &choice)?;
                    if session.booking.lesson_id.as_deref() != Some(lesson.id) {
                        // Slots and price belong to the previous lesson.
                        session.available_slots = None;
                        session.booking = Booking::default();
                    }
                    session.update_booking(Booking {
                        lesson_id: Some(lesson.id.to_string()),
                        lesson_title: Some(lesson.title.to_string()),
                        duration_minutes: Some(lesson.duration_minutes),
                        location: Some(lesson.location.to_string()),
                        ..Default::default()
                    });
                    Ok(())
                })
                .await
            }
            StepSubmission::Booking(candidate) => self.submit_booking(candidate).await,
            StepSubmission::Payment(candidate) => {
                self.pay(candidate).await?;
                let session = self.session.read().await;
                Ok(StepOutcome {
                    completed: step,
                    current_step: session.current_step,
                    progress: access::progress(session.current_step, &session.completed_steps),
                })
            }
        }
    }

    /// Gate, then merge and advance under one write lock.
    async fn apply<F>(&self, step: Step, merge: F) -> Result<StepOutcome>
    where
        F: FnOnce(&mut OnboardingSession, &ValidationContext) -> Result<()>,
    {
        let mut session = self.session.write().await;
        Self::ensure_access(&session, step)?;
        let ctx = self.context(&session);
        merge(&mut session, &ctx)?;
        Ok(Self::complete(&mut session, step))
    }

    fn choose_lesson(
        session: &OnboardingSession,
        choice: &LessonChoice,
    ) -> std::result::Result<&'static catalog::Lesson, FieldErrors> {
        let Some(id) = choice.lesson_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Err(FieldErrors::single("lessonId", "Please choose a lesson"));
        };
        let Some(lesson) = catalog::find(id) else {
            return Err(FieldErrors::single("lessonId", "Unknown lesson"));
        };
        if !lessons::recommend::is_recommended(&session.assessment, lesson.id) {
            return Err(FieldErrors::single(
                "lessonId",
                "This lesson doesn't match your assessment",
            ));
        }
        Ok(lesson)
    }

    fn chosen_lesson(session: &OnboardingSession, step: Step) -> Result<&'static catalog::Lesson> {
        session
            .booking
            .lesson_id
            .as_deref()
            .and_then(catalog::find)
            .ok_or_else(|| {
                SessionError::MissingPrerequisite {
                    step,
                    missing: "a chosen lesson".into(),
                }
                .into()
            })
    }

    async fn submit_booking(&self, candidate: BookingCandidate) -> Result<StepOutcome> {
        let (lesson, selection, cached) = {
            let session = self.session.read().await;
            Self::ensure_access(&session, Step::Booking)?;
            let lesson = Self::chosen_lesson(&session, Step::Booking)?;
            let selection = candidate.validate(&self.context(&session))?;
            let cached = session
                .available_slots
                .clone()
                .filter(|availability| availability.date == selection.date);
            (lesson, selection, cached)
        };

        let availability = match cached {
            Some(availability) => availability,
            None => self.fetch_slots(selection.date).await?,
        };

        let mut errors = FieldErrors::new();
        if selection.participants > lesson.max_participants {
            errors.add(
                "participants",
                format!(
                    "{} takes at most {} participant(s)",
                    lesson.title, lesson.max_participants
                ),
            );
        }
        let slot = availability
            .slots
            .iter()
            .find(|slot| slot.start == selection.start_time);
        match slot {
            None => errors.add(
                "startTime",
                format!("No lesson starts at {} on {}", selection.start_time.format("%H:%M"), selection.date),
            ),
            Some(slot) if slot.spots_left < selection.participants => errors.add(
                "participants",
                format!("Only {} spot(s) left at that time", slot.spots_left),
            ),
            Some(_) => {}
        }
        let slot = errors.into_result(slot)?;

        let mut session = self.session.write().await;
        Self::ensure_access(&session, Step::Booking)?;
        if session.booking.lesson_id.as_deref() != Some(lesson.id) {
            return Err(SessionError::MissingPrerequisite {
                step: Step::Booking,
                missing: "a chosen lesson".into(),
            }
            .into());
        }
        session.update_booking(Booking {
            date: Some(selection.date),
            start_time: Some(selection.start_time),
            participants: Some(selection.participants),
            instructor: slot.map(|s| s.instructor.clone()),
            total_price: Some(catalog::price_for(lesson, selection.participants, None)),
            special_requests: selection.special_requests,
            ..Default::default()
        });
        Ok(Self::complete(&mut session, Step::Booking))
    }

    /// Move to `requested`, or to the furthest reachable step before it.
    pub async fn navigate(&self, requested: Step) -> NavigationOutcome {
        let mut session = self.session.write().await;
        let landed =
            access::nearest_accessible(requested, session.current_step, &session.completed_steps);
        session.set_current_step(landed);
        let redirected = landed != requested;
        if redirected {
            info!(
                session_id = %session.session_id,
                %requested,
                %landed,
                "Navigation redirected to nearest accessible step"
            );
        }
        NavigationOutcome {
            requested,
            landed,
            redirected,
        }
    }

    /// Skip the emergency contact step. Nothing changes unless `confirmed`.
    pub async fn skip_emergency(&self, confirmed: bool) -> Result<StepOutcome> {
        if !confirmed {
            return Err(SessionError::SkipNotConfirmed {
                step: Step::Emergency,
            }
            .into());
        }
        let mut session = self.session.write().await;
        Self::ensure_access(&session, Step::Emergency)?;
        session.skip_emergency_contact();
        Ok(Self::complete(&mut session, Step::Emergency))
    }

    pub async fn recommendations(&self) -> Vec<Recommendation> {
        let session = self.session.read().await;
        lessons::recommend(&session.assessment)
    }

    /// Look up slots for the chosen lesson on `date`.
    ///
    /// Each call takes a fresh request token. The result is committed only
    /// if no newer request started meanwhile; otherwise it is dropped and
    /// [`SessionError::StaleResult`] is returned.
    pub async fn fetch_slots(&self, date: NaiveDate) -> Result<SlotAvailability> {
        let lesson = {
            let session = self.session.read().await;
            Self::ensure_access(&session, Step::Booking)?;
            let ctx = self.context(&session);
            let horizon = ctx.today + chrono::Days::new(u64::from(ctx.booking_horizon_days));
            if date < ctx.today || date > horizon {
                return Err(FieldErrors::single("date", "Date is outside the bookable range").into());
            }
            Self::chosen_lesson(&session, Step::Booking)?
        };

        let token = self.slot_requests.fetch_add(1, Ordering::SeqCst) + 1;
        let mut tracker = RetryTracker::new(self.config.retry_policy());
        let provider = &self.slots;
        let slots = tracker
            .run("slot_fetch", |_| provider.available_slots(lesson, date))
            .await?;

        let mut session = self.session.write().await;
        let latest = self.slot_requests.load(Ordering::SeqCst);
        if token != latest {
            warn!(
                session_id = %session.session_id,
                token,
                latest,
                %date,
                "Discarding superseded slot lookup"
            );
            return Err(SessionError::StaleResult { token, latest }.into());
        }
        let availability = SlotAvailability {
            date,
            request_token: token,
            slots,
        };
        session.available_slots = Some(availability.clone());
        Ok(availability)
    }

    /// Validate and charge the payment, then finish the wizard.
    ///
    /// Payments on one session run one at a time. A session that is already
    /// paid returns its confirmation without charging again, including a
    /// call that was waiting behind the charge that paid it.
    pub async fn pay(&self, candidate: PaymentCandidate) -> Result<Confirmation> {
        let mut tracker = self.payment_retry.lock().await;

        let (session_id, details, amount) = {
            let mut session = self.session.write().await;
            if session.payment.status == Some(PaymentStatus::Completed) {
                return Confirmation::from_session(&session);
            }
            Self::ensure_access(&session, Step::Payment)?;
            let amount = session.booking.total_price.ok_or_else(|| {
                SessionError::MissingPrerequisite {
                    step: Step::Payment,
                    missing: "a booked time slot".into(),
                }
            })?;
            let details = candidate.validate(&self.context(&session))?;
            session.update_payment(PaymentRecord {
                method: Some(details.method()),
                status: Some(PaymentStatus::Processing),
                amount: Some(amount),
                masked_details: Some(details.masked()),
                ..Default::default()
            });
            (session.session_id, details, amount)
        };

        let processor = &self.payments;
        let details = &details;
        let outcome = tracker
            .run("payment", |attempt| processor.charge(details, amount, attempt))
            .await;

        let mut session = self.session.write().await;
        if session.session_id != session_id {
            tracker.reset();
            warn!(%session_id, "Session was reset while the payment was processing");
            return Err(SessionError::NotFound { id: session_id }.into());
        }
        match outcome {
            Ok(receipt) => {
                session.update_payment(PaymentRecord {
                    status: Some(PaymentStatus::Completed),
                    transaction_id: Some(receipt.transaction_id),
                    paid_at: Some(receipt.processed_at),
                    ..Default::default()
                });
                session.booking_reference = Some(payments::booking_reference());
                Self::complete(&mut session, Step::Payment);
                session.mark_step_completed(Step::Confirmation);
                Confirmation::from_session(&session)
            }
            Err(report) => {
                session.update_payment(PaymentRecord {
                    status: Some(PaymentStatus::Failed),
                    ..Default::default()
                });
                Err(report.into())
            }
        }
    }

    pub async fn confirmation(&self) -> Result<Confirmation> {
        Confirmation::from_session(&*self.session.read().await)
    }

    /// Start over under a new session id, returned.
    ///
    /// In-flight slot lookups become stale and a payment still processing
    /// is discarded when it finishes.
    pub async fn reset(&self) -> Uuid {
        let mut session = self.session.write().await;
        session.reset_onboarding();
        self.slot_requests.fetch_add(1, Ordering::SeqCst);
        // A payment in flight holds the tracker and clears it when it sees the new id.
        if let Ok(mut tracker) = self.payment_retry.try_lock() {
            tracker.reset();
        }
        session.session_id
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;

    use crate::lessons::{Lesson, SimulatedSlotProvider, TimeSlot};
    use crate::payments::{DECLINED_CARD, PaymentReceipt, SimulatedPaymentProcessor};
    use crate::retry::{FailureKind, RequestFailure};
    use crate::validation::PaymentDetails;

    fn manager_with(payments: SimulatedPaymentProcessor) -> OnboardingManager {
        OnboardingManager::new(
            Arc::new(WizardConfig::for_tests()),
            Arc::new(SimulatedSlotProvider::new(Duration::ZERO)),
            Arc::new(payments),
        )
    }

    fn manager() -> OnboardingManager {
        manager_with(SimulatedPaymentProcessor::new(Duration::ZERO))
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn signup() -> StepSubmission {
        StepSubmission::Signup(SignupCandidate {
            email: Some("Ana@Example.com".into()),
            password: Some("Aa1!aaaa".into()),
            confirm_password: Some("Aa1!aaaa".into()),
            first_name: Some("Ana".into()),
            last_name: Some("Lima".into()),
            accept_terms: Some(true),
            marketing_opt_in: None,
        })
    }

    fn assessment() -> StepSubmission {
        StepSubmission::Assessment(AssessmentCandidate {
            sport: Some("surf".into()),
            skill_level: Some("beginner".into()),
            years_experience: Some(0),
            swimming_ability: Some("confident".into()),
            previous_lessons: Some(false),
            goals: Some(vec!["Stand up on my first wave".into()]),
            fitness_level: Some("moderate".into()),
        })
    }

    fn profile() -> StepSubmission {
        let dob = today() - chrono::Days::new(365 * 30);
        StepSubmission::Profile(ProfileCandidate {
            first_name: Some("Ana".into()),
            last_name: Some("Lima".into()),
            date_of_birth: Some(dob.format("%Y-%m-%d").to_string()),
            phone: Some("+351 912 345 678".into()),
            country: Some("PT".into()),
            height_cm: Some(168),
            weight_kg: Some(60),
            wetsuit_size: Some("M".into()),
        })
    }

    fn waiver() -> StepSubmission {
        StepSubmission::Waiver(WaiverCandidate {
            accepted_terms: Some(true),
            accepted_liability: Some(true),
            accepted_medical: Some(true),
            signature: Some("ana lima".into()),
            medical_conditions: None,
        })
    }

    async fn through_waiver(mgr: &OnboardingManager) {
        for submission in [StepSubmission::Welcome, signup(), assessment(), profile(), waiver()] {
            mgr.submit(submission).await.unwrap();
        }
    }

    async fn through_recommendations(mgr: &OnboardingManager) {
        through_waiver(mgr).await;
        mgr.skip_emergency(true).await.unwrap();
        mgr.submit(StepSubmission::Recommendations(LessonChoice {
            lesson_id: Some("surf-intro-group".into()),
        }))
        .await
        .unwrap();
    }

    /// First date within the next two weeks that has a slot for one person.
    async fn open_slot(mgr: &OnboardingManager) -> (NaiveDate, TimeSlot) {
        for offset in 1..15 {
            let date = today() + chrono::Days::new(offset);
            let availability = mgr.fetch_slots(date).await.unwrap();
            if let Some(slot) = availability.slots.into_iter().next() {
                return (date, slot);
            }
        }
        panic!("no open slot in two weeks");
    }

    async fn through_booking(mgr: &OnboardingManager) {
        through_recommendations(mgr).await;
        let (date, slot) = open_slot(mgr).await;
        mgr.submit(StepSubmission::Booking(BookingCandidate {
            date: Some(date.format("%Y-%m-%d").to_string()),
            start_time: Some(slot.start.format("%H:%M").to_string()),
            participants: Some(1),
            special_requests: None,
        }))
        .await
        .unwrap();
    }

    fn card(number: &str) -> PaymentCandidate {
        PaymentCandidate {
            method: Some("card".into()),
            card_number: Some(number.into()),
            card_holder: Some("Ana Lima".into()),
            expiry: Some("12/39".into()),
            cvv: Some("123".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn submission_advances_and_marks_completed() {
        let mgr = manager();
        let outcome = mgr.submit(StepSubmission::Welcome).await.unwrap();
        assert_eq!(outcome.completed, Step::Welcome);
        assert_eq!(outcome.current_step, Step::Auth);

        mgr.submit(signup()).await.unwrap();
        let session = mgr.snapshot().await;
        assert_eq!(session.current_step, Step::Assessment);
        assert!(session.completed_steps.contains(&Step::Auth));
        assert_eq!(session.user.email.as_deref(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn locked_step_is_rejected_with_redirect() {
        let mgr = manager();
        let err = mgr.submit(assessment()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Session(SessionError::StepLocked {
                requested: Step::Assessment,
                redirect: Step::Welcome,
            })
        ));
        assert!(mgr.snapshot().await.completed_steps.is_empty());
    }

    #[tokio::test]
    async fn invalid_data_leaves_session_untouched() {
        let mgr = manager();
        mgr.submit(StepSubmission::Welcome).await.unwrap();
        let bad = StepSubmission::Signup(SignupCandidate {
            password: Some("Aa1!aaaa".into()),
            confirm_password: Some("Aa1!aaab".into()),
            ..Default::default()
        });
        let err = mgr.submit(bad).await.unwrap_err();
        let crate::Error::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert!(fields.has("confirmPassword"));
        let session = mgr.snapshot().await;
        assert!(!session.completed_steps.contains(&Step::Auth));
        assert!(session.user.email.is_none());
    }

    #[tokio::test]
    async fn navigation_redirects_to_nearest_accessible() {
        let mgr = manager();
        mgr.submit(StepSubmission::Welcome).await.unwrap();
        let outcome = mgr.navigate(Step::Payment).await;
        assert_eq!(outcome.landed, Step::Auth);
        assert!(outcome.redirected);

        let back = mgr.navigate(Step::Welcome).await;
        assert!(!back.redirected);
        assert_eq!(mgr.current_step().await, Step::Welcome);
    }

    #[tokio::test]
    async fn skip_requires_confirmation() {
        let mgr = manager();
        through_waiver(&mgr).await;
        let err = mgr.skip_emergency(false).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Session(SessionError::SkipNotConfirmed { .. })
        ));
        assert!(!mgr.snapshot().await.completed_steps.contains(&Step::Emergency));
    }

    #[tokio::test]
    async fn skipped_emergency_unlocks_later_steps() {
        let mgr = manager();
        through_waiver(&mgr).await;
        let outcome = mgr.skip_emergency(true).await.unwrap();
        assert_eq!(outcome.current_step, Step::Recommendations);

        let session = mgr.snapshot().await;
        assert!(session.completed_steps.contains(&Step::Emergency));
        assert!(!session.emergency_contact.has_contact());
        assert_eq!(session.emergency_contact.skipped, Some(true));
        assert!(session.can_access_step(Step::Recommendations));
    }

    #[tokio::test]
    async fn waiver_signature_must_match_profile_name() {
        let mgr = manager();
        for submission in [StepSubmission::Welcome, signup(), assessment(), profile()] {
            mgr.submit(submission).await.unwrap();
        }
        let forged = StepSubmission::Waiver(WaiverCandidate {
            accepted_terms: Some(true),
            accepted_liability: Some(true),
            accepted_medical: Some(true),
            signature: Some("Someone Else".into()),
            medical_conditions: None,
        });
        let err = mgr.submit(forged).await.unwrap_err();
        assert!(matches!(err, crate::Error::Validation(ref f) if f.has("signature")));
    }

    #[tokio::test]
    async fn lesson_must_match_assessment() {
        let mgr = manager();
        through_waiver(&mgr).await;
        mgr.skip_emergency(true).await.unwrap();
        let err = mgr
            .submit(StepSubmission::Recommendations(LessonChoice {
                lesson_id: Some("kite-jump-clinic".into()),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Validation(ref f) if f.has("lessonId")));
        assert!(!mgr.recommendations().await.is_empty());
    }

    #[tokio::test]
    async fn booking_prices_the_chosen_slot() {
        let mgr = manager();
        through_booking(&mgr).await;
        let session = mgr.snapshot().await;
        assert_eq!(session.current_step, Step::Payment);
        assert_eq!(session.booking.total_price, Some(dec!(65)));
        assert!(session.booking.instructor.is_some());
    }

    #[tokio::test]
    async fn booking_rejects_unknown_start_time() {
        let mgr = manager();
        through_recommendations(&mgr).await;
        let date = today() + chrono::Days::new(3);
        let err = mgr
            .submit(StepSubmission::Booking(BookingCandidate {
                date: Some(date.format("%Y-%m-%d").to_string()),
                start_time: Some("06:15".into()),
                participants: Some(1),
                special_requests: None,
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Validation(ref f) if f.has("startTime")));
    }

    #[tokio::test]
    async fn payment_completes_the_wizard() {
        let mgr = manager();
        through_booking(&mgr).await;
        assert!(matches!(
            mgr.confirmation().await,
            Err(crate::Error::Session(SessionError::NotCompleted))
        ));

        let confirmation = mgr.pay(card("4242 4242 4242 4242")).await.unwrap();
        assert!(confirmation.booking_reference.starts_with("SURF-"));
        assert_eq!(confirmation.amount, Some(dec!(65)));
        assert_eq!(confirmation.payment.as_deref(), Some("Visa •••• 4242"));

        let session = mgr.snapshot().await;
        assert_eq!(session.current_step, Step::Confirmation);
        assert!(session.completed_at.is_some());
        assert!(session.completed_steps.contains(&Step::Confirmation));
        assert_eq!(session.payment.status, Some(PaymentStatus::Completed));

        let again = mgr.pay(card("4242 4242 4242 4242")).await.unwrap();
        assert_eq!(again.booking_reference, confirmation.booking_reference);
    }

    #[tokio::test]
    async fn transient_payment_failures_are_retried() {
        let mgr = manager_with(
            SimulatedPaymentProcessor::new(Duration::ZERO)
                .with_failures([FailureKind::Network, FailureKind::Timeout]),
        );
        through_booking(&mgr).await;
        assert!(mgr.pay(card("4242424242424242")).await.is_ok());
    }

    #[tokio::test]
    async fn declined_card_marks_payment_failed() {
        let mgr = manager();
        through_booking(&mgr).await;
        let err = mgr.pay(card(DECLINED_CARD)).await.unwrap_err();
        let crate::Error::Request(report) = err else {
            panic!("expected request failure");
        };
        assert_eq!(report.kind, FailureKind::Auth);
        assert!(!report.retryable);
        let session = mgr.snapshot().await;
        assert_eq!(session.payment.status, Some(PaymentStatus::Failed));
        assert_eq!(session.current_step, Step::Payment);
    }

    #[tokio::test]
    async fn exhausted_retries_give_terminal_report() {
        let mgr = manager_with(
            SimulatedPaymentProcessor::new(Duration::ZERO).with_failures([FailureKind::Server; 4]),
        );
        through_booking(&mgr).await;
        let err = mgr.pay(card("4242424242424242")).await.unwrap_err();
        assert!(matches!(err, crate::Error::Request(ref r) if r.terminal));
    }

    #[tokio::test]
    async fn reset_starts_over() {
        let mgr = manager();
        through_waiver(&mgr).await;
        let before = mgr.session_id().await;
        let after = mgr.reset().await;
        assert_ne!(before, after);
        let session = mgr.snapshot().await;
        assert!(session.completed_steps.is_empty());
        assert!(session.can_access_step(Step::Welcome));
        assert!(!session.can_access_step(Step::Auth));
    }

    /// Slot source whose calls finish after scripted delays.
    struct SlowSlots {
        delays: std::sync::Mutex<VecDeque<Duration>>,
    }

    #[async_trait]
    impl SlotProvider for SlowSlots {
        async fn available_slots(
            &self,
            _lesson: &Lesson,
            _date: NaiveDate,
        ) -> std::result::Result<Vec<TimeSlot>, RequestFailure> {
            let delay = self
                .delays
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Duration::ZERO);
            tokio::time::sleep(delay).await;
            Ok(vec![TimeSlot {
                start: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
                end: NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
                spots_left: 4,
                instructor: "Kai".into(),
            }])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_slot_fetch_is_discarded() {
        let slots = SlowSlots {
            delays: std::sync::Mutex::new(VecDeque::from([
                Duration::from_millis(500),
                Duration::from_millis(10),
            ])),
        };
        let mgr = OnboardingManager::new(
            Arc::new(WizardConfig::for_tests()),
            Arc::new(slots),
            Arc::new(SimulatedPaymentProcessor::new(Duration::ZERO)),
        );
        through_recommendations(&mgr).await;

        let first_day = today() + chrono::Days::new(2);
        let second_day = today() + chrono::Days::new(3);
        let (first, second) = tokio::join!(mgr.fetch_slots(first_day), async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            mgr.fetch_slots(second_day).await
        });

        assert!(matches!(
            first,
            Err(crate::Error::Session(SessionError::StaleResult { token: 1, latest: 2 }))
        ));
        assert_eq!(second.unwrap().date, second_day);
        let stored = mgr.snapshot().await.available_slots.unwrap();
        assert_eq!(stored.date, second_day);
        assert_eq!(stored.request_token, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_pending_slot_lookup() {
        let slots = SlowSlots {
            delays: std::sync::Mutex::new(VecDeque::from([Duration::from_millis(500)])),
        };
        let mgr = OnboardingManager::new(
            Arc::new(WizardConfig::for_tests()),
            Arc::new(slots),
            Arc::new(SimulatedPaymentProcessor::new(Duration::ZERO)),
        );
        through_recommendations(&mgr).await;

        let day = today() + chrono::Days::new(2);
        let (lookup, new_id) = tokio::join!(mgr.fetch_slots(day), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mgr.reset().await
        });

        assert!(matches!(
            lookup,
            Err(crate::Error::Session(SessionError::StaleResult { token: 1, latest: 2 }))
        ));
        let session = mgr.snapshot().await;
        assert_eq!(session.session_id, new_id);
        assert!(session.available_slots.is_none());
        assert!(session.completed_steps.is_empty());
    }

    /// Payment processor that counts the charges it receives.
    struct CountingPayments {
        inner: SimulatedPaymentProcessor,
        charges: Arc<AtomicU32>,
    }

    #[async_trait]
    impl PaymentProcessor for CountingPayments {
        async fn charge(
            &self,
            details: &PaymentDetails,
            amount: Decimal,
            attempt: u32,
        ) -> std::result::Result<PaymentReceipt, RequestFailure> {
            self.charges.fetch_add(1, Ordering::SeqCst);
            self.inner.charge(details, amount, attempt).await
        }
    }

    fn counting_manager(delay: Duration) -> (OnboardingManager, Arc<AtomicU32>) {
        let charges = Arc::new(AtomicU32::new(0));
        let payments = CountingPayments {
            inner: SimulatedPaymentProcessor::new(delay),
            charges: Arc::clone(&charges),
        };
        let mgr = OnboardingManager::new(
            Arc::new(WizardConfig::for_tests()),
            Arc::new(SimulatedSlotProvider::new(Duration::ZERO)),
            Arc::new(payments),
        );
        (mgr, charges)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_payments_charge_once() {
        let (mgr, charges) = counting_manager(Duration::from_millis(100));
        through_booking(&mgr).await;

        let (first, second) = tokio::join!(
            mgr.pay(card("4242424242424242")),
            mgr.pay(card("4242424242424242"))
        );
        let first = first.unwrap();
        let second = second.unwrap();

        assert_eq!(charges.load(Ordering::SeqCst), 1);
        assert_eq!(first.booking_reference, second.booking_reference);
        assert_eq!(first.transaction_id, second.transaction_id);
        let session = mgr.snapshot().await;
        assert_eq!(session.booking_reference.as_deref(), Some(first.booking_reference.as_str()));
        assert_eq!(session.payment.transaction_id, first.transaction_id);
    }

    #[tokio::test(start_paused = true)]
    async fn payment_finishing_after_reset_leaves_new_session_alone() {
        let (mgr, charges) = counting_manager(Duration::from_millis(100));
        through_booking(&mgr).await;
        let old_id = mgr.session_id().await;

        let (paid, new_id) = tokio::join!(mgr.pay(card("4242424242424242")), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mgr.reset().await
        });

        assert!(matches!(
            paid,
            Err(crate::Error::Session(SessionError::NotFound { id })) if id == old_id
        ));
        assert_eq!(charges.load(Ordering::SeqCst), 1);
        let session = mgr.snapshot().await;
        assert_eq!(session.session_id, new_id);
        assert_eq!(session.payment, PaymentRecord::default());
        assert!(session.booking_reference.is_none());
        assert!(session.completed_steps.is_empty());
        assert!(matches!(
            mgr.confirmation().await,
            Err(crate::Error::Session(SessionError::NotCompleted))
        ));
    }
}
