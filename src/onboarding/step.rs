//! Wizard step enumeration. All step ordering comes from here.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The steps of the onboarding and booking wizard.
///
/// Progresses linearly: Welcome → Auth → Assessment → Profile → Waiver →
/// Emergency → Recommendations → Booking → Payment → Confirmation.
///
/// `Ord` follows the wizard order, so a `BTreeSet<Step>` iterates in
/// progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Welcome,
    Auth,
    Assessment,
    Profile,
    Waiver,
    Emergency,
    Recommendations,
    Booking,
    Payment,
    Confirmation,
}

impl Step {
    /// Every step in wizard order. Consumed by the access policy and the
    /// progress indicators alike.
    pub const ORDER: [Step; 10] = [
        Step::Welcome,
        Step::Auth,
        Step::Assessment,
        Step::Profile,
        Step::Waiver,
        Step::Emergency,
        Step::Recommendations,
        Step::Booking,
        Step::Payment,
        Step::Confirmation,
    ];

    /// The entry step of every session.
    pub const FIRST: Step = Step::Welcome;

    /// Zero-based position in [`Step::ORDER`].
    pub fn position(self) -> usize {
        Self::ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }

    /// The step after this one, if any.
    pub fn next(self) -> Option<Step> {
        Self::ORDER.get(self.position() + 1).copied()
    }

    /// The step before this one, if any.
    pub fn previous(self) -> Option<Step> {
        self.position()
            .checked_sub(1)
            .and_then(|i| Self::ORDER.get(i).copied())
    }

    /// Whether this is the confirmation step (wizard done).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmation)
    }

    /// Human-readable label for progress indicators.
    pub fn label(self) -> &'static str {
        match self {
            Self::Welcome => "Welcome",
            Self::Auth => "Create Account",
            Self::Assessment => "Skill Assessment",
            Self::Profile => "Your Profile",
            Self::Waiver => "Liability Waiver",
            Self::Emergency => "Emergency Contact",
            Self::Recommendations => "Recommended Lessons",
            Self::Booking => "Pick a Time",
            Self::Payment => "Payment",
            Self::Confirmation => "Confirmation",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Auth => "auth",
            Self::Assessment => "assessment",
            Self::Profile => "profile",
            Self::Waiver => "waiver",
            Self::Emergency => "emergency",
            Self::Recommendations => "recommendations",
            Self::Booking => "booking",
            Self::Payment => "payment",
            Self::Confirmation => "confirmation",
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::FIRST
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("Unknown step '{s}'"))
    }
}
