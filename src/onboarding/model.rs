//! Onboarding section records: the partial data each step accumulates.
//!
//! Every section is a record of optional fields. Steps never replace a
//! section wholesale: [`merge`](UserSection::merge) copies only the fields
//! present in the patch and leaves the rest untouched.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Copy every `Some` field of `$patch` over `$target`.
macro_rules! shallow_merge {
    ($target:expr, $patch:expr; $($field:ident),+ $(,)?) => {
        $(
            if $patch.$field.is_some() {
                $target.$field = $patch.$field;
            }
        )+
    };
}

/// Which sport the customer wants lessons in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    Surf,
    Kitesurf,
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Surf => write!(f, "surf"),
            Self::Kitesurf => write!(f, "kitesurf"),
        }
    }
}

/// Self-assessed skill level, ordered from least to most experienced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl std::fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        };
        write!(f, "{s}")
    }
}

/// How comfortable the customer is in open water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwimmingAbility {
    None,
    Basic,
    Confident,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessLevel {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WetsuitSize {
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

/// How the account was created during the auth step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    Email,
    Guest,
}

/// Payment method tag. The details for each method live in
/// [`crate::validation::payment::PaymentDetails`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Paypal,
    BankTransfer,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Card => "card",
            Self::Paypal => "paypal",
            Self::BankTransfer => "bank_transfer",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Account and profile data, written by the auth and profile steps.
///
/// Passwords are validated but never stored here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wetsuit_size: Option<WetsuitSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_opt_in: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider: Option<AuthProvider>,
}

impl UserSection {
    pub fn merge(&mut self, patch: UserSection) {
        shallow_merge!(self, patch;
            email, first_name, last_name, phone, date_of_birth, country,
            height_cm, weight_kg, wetsuit_size, marketing_opt_in, auth_provider,
        );
    }

    /// "First Last", or whichever half is known.
    pub fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }
}

/// Sport and skill assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<Sport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<SkillLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swimming_ability: Option<SwimmingAbility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_lessons: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitness_level: Option<FitnessLevel>,
}

impl Assessment {
    pub fn merge(&mut self, patch: Assessment) {
        shallow_merge!(self, patch;
            sport, skill_level, years_experience, swimming_ability,
            previous_lessons, goals, fitness_level,
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Set when the user confirmed the skip path instead of filling the form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
}

impl EmergencyContact {
    pub fn merge(&mut self, patch: EmergencyContact) {
        shallow_merge!(self, patch; name, relationship, phone, email, skipped);
    }

    /// Whether any contact field (not the skip flag) has been filled.
    pub fn has_contact(&self) -> bool {
        self.name.is_some() || self.phone.is_some() || self.email.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waiver {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_terms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_liability: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_medical: Option<bool>,
    /// Typed full-name signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_conditions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiver_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
}

impl Waiver {
    pub fn merge(&mut self, patch: Waiver) {
        shallow_merge!(self, patch;
            accepted_terms, accepted_liability, accepted_medical, signature,
            medical_conditions, waiver_version, signed_at,
        );
    }
}

/// The chosen lesson and slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
}

impl Booking {
    pub fn merge(&mut self, patch: Booking) {
        shallow_merge!(self, patch;
            lesson_id, lesson_title, date, start_time, duration_minutes,
            participants, instructor, location, total_price, special_requests,
        );
    }
}

/// Outcome of the payment step. Never holds full card or account numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// e.g. "Visa •••• 4242" or "j***@example.com".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    pub fn merge(&mut self, patch: PaymentRecord) {
        shallow_merge!(self, patch;
            method, status, amount, transaction_id, masked_details, paid_at,
        );
    }
}
