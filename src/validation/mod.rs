//! Validation schema layer.
//!
//! Each step has a *candidate* type (everything optional, exactly as a form
//! submits it) implementing [`Schema`]. Validation either yields the
//! normalized record for the step or a [`FieldErrors`] list keyed by field
//! path. Expected failures never panic.

pub mod assessment;
pub mod auth;
pub mod booking;
pub mod emergency;
pub mod payment;
pub mod profile;
pub mod rules;
pub mod waiver;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use assessment::AssessmentCandidate;
pub use auth::{LoginCandidate, SignupCandidate};
pub use booking::{BookingCandidate, BookingSelection};
pub use emergency::EmergencyContactCandidate;
pub use payment::{PaymentCandidate, PaymentDetails};
pub use profile::ProfileCandidate;
pub use waiver::WaiverCandidate;

/// A single failed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// camelCase path of the offending field, e.g. `confirmPassword` or
    /// `payment.cardNumber`.
    pub path: String,
    pub message: String,
}

/// Every field that failed validation in one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{} field(s) failed validation", .errors.len())]
pub struct FieldErrors {
    pub errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list holding exactly one error.
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(path, message);
        errors
    }

    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            path: path.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// First message recorded for `path`.
    pub fn message_for(&self, path: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.message.as_str())
    }

    pub fn has(&self, path: &str) -> bool {
        self.message_for(path).is_some()
    }

    /// Merge another list in, prefixing its paths with `prefix.`.
    pub fn absorb(&mut self, prefix: &str, other: FieldErrors) {
        for e in other.errors {
            self.add(format!("{prefix}.{}", e.path), e.message);
        }
    }

    /// `Ok(value)` when no errors were recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// How age is derived from a date of birth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeRule {
    /// `today.year - birth.year`, ignoring whether the birthday has passed.
    CalendarYear,
    /// Completed years, counting the birthday itself.
    Exact,
}

impl Default for AgeRule {
    fn default() -> Self {
        Self::CalendarYear
    }
}

/// Facts a schema may need beyond the candidate itself.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub today: NaiveDate,
    pub min_age: u32,
    pub age_rule: AgeRule,
    pub booking_horizon_days: u32,
    /// Full name already on the session, used to check waiver signatures.
    pub user_full_name: Option<String>,
    /// The customer's own phone, which an emergency contact must differ from.
    pub user_phone: Option<String>,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self {
            today: Utc::now().date_naive(),
            min_age: 13,
            age_rule: AgeRule::default(),
            booking_horizon_days: 90,
            user_full_name: None,
            user_phone: None,
        }
    }
}

impl ValidationContext {
    pub fn on(today: NaiveDate) -> Self {
        Self {
            today,
            ..Default::default()
        }
    }
}

/// A per-step rule set over a submitted candidate.
pub trait Schema {
    /// The normalized record produced on success.
    type Output;

    fn validate(&self, ctx: &ValidationContext) -> Result<Self::Output, FieldErrors>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_result_passes_value_through_when_clean() {
        assert_eq!(FieldErrors::new().into_result(7), Ok(7));
    }

    #[test]
    fn into_result_fails_with_errors() {
        let errors = FieldErrors::single("email", "Email is required");
        let result = errors.clone().into_result(());
        assert_eq!(result, Err(errors));
    }

    #[test]
    fn absorb_prefixes_paths() {
        let mut outer = FieldErrors::new();
        outer.absorb("payment", FieldErrors::single("cardNumber", "Card number is invalid"));
        assert_eq!(outer.message_for("payment.cardNumber"), Some("Card number is invalid"));
        assert!(!outer.has("cardNumber"));
    }

    #[test]
    fn display_counts_errors() {
        let mut errors = FieldErrors::new();
        errors.add("a", "x");
        errors.add("b", "y");
        assert_eq!(errors.to_string(), "2 field(s) failed validation");
    }
}
