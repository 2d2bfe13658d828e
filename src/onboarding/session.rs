//! Onboarding session: the state store for one customer's wizard run.
//!
//! The store operations are unguarded: `set_current_step` does
//! not consult the access policy and `mark_step_completed` does not
//! validate anything. Gating and validation are the manager's job.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::access;
use super::model::{Assessment, Booking, EmergencyContact, PaymentRecord, UserSection, Waiver};
use super::step::Step;
use crate::lessons::slots::TimeSlot;

/// Slots fetched for a date, tagged with the request that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub date: NaiveDate,
    pub request_token: u64,
    pub slots: Vec<TimeSlot>,
}

/// All progress and collected data for one wizard run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingSession {
    pub session_id: Uuid,
    pub current_step: Step,
    pub completed_steps: BTreeSet<Step>,
    pub user: UserSection,
    pub assessment: Assessment,
    pub emergency_contact: EmergencyContact,
    pub waiver: Waiver,
    pub booking: Booking,
    pub payment: PaymentRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_slots: Option<SlotAvailability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_reference: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
}

impl Default for OnboardingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingSession {
    /// Start a fresh session on the first step.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            current_step: Step::FIRST,
            completed_steps: BTreeSet::new(),
            user: UserSection::default(),
            assessment: Assessment::default(),
            emergency_contact: EmergencyContact::default(),
            waiver: Waiver::default(),
            booking: Booking::default(),
            payment: PaymentRecord::default(),
            available_slots: None,
            booking_reference: None,
            started_at: now,
            completed_at: None,
            last_activity_at: now,
        }
    }

    /// Move to `step` without consulting the access policy.
    ///
    /// Reaching the terminal step stamps `completed_at` once.
    pub fn set_current_step(&mut self, step: Step) {
        self.current_step = step;
        if step.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        self.touch();
    }

    /// Add `step` to the completed set. Idempotent.
    pub fn mark_step_completed(&mut self, step: Step) {
        if self.completed_steps.insert(step) {
            debug!(session_id = %self.session_id, %step, "Step marked completed");
        }
        self.touch();
    }

    pub fn update_user(&mut self, patch: UserSection) {
        self.user.merge(patch);
        self.touch();
    }

    pub fn update_assessment(&mut self, patch: Assessment) {
        self.assessment.merge(patch);
        self.touch();
    }

    pub fn update_emergency_contact(&mut self, patch: EmergencyContact) {
        self.emergency_contact.merge(patch);
        self.touch();
    }

    pub fn update_waiver(&mut self, patch: Waiver) {
        self.waiver.merge(patch);
        self.touch();
    }

    pub fn update_booking(&mut self, patch: Booking) {
        self.booking.merge(patch);
        self.touch();
    }

    pub fn update_payment(&mut self, patch: PaymentRecord) {
        self.payment.merge(patch);
        self.touch();
    }

    /// Wipe everything and start over under a new session id.
    pub fn reset_onboarding(&mut self) {
        let previous = self.session_id;
        *self = Self::new();
        debug!(%previous, session_id = %self.session_id, "Onboarding session reset");
    }

    /// Whether `step` is reachable right now.
    pub fn can_access_step(&self, step: Step) -> bool {
        access::can_access_step(step, self.current_step, &self.completed_steps)
    }

    /// Record an explicit skip of the emergency contact step.
    ///
    /// Contact fields stay empty; only the skip flag is set and the step
    /// counts as completed for gating.
    pub fn skip_emergency_contact(&mut self) {
        self.update_emergency_contact(EmergencyContact {
            skipped: Some(true),
            ..Default::default()
        });
        self.mark_step_completed(Step::Emergency);
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Whether the session has been idle longer than `ttl` at `now`.
    pub fn is_idle(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.last_activity_at > ttl
    }

    fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }
}
