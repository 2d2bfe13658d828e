//! Liability waiver step.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::rules;
use super::{FieldErrors, Schema, ValidationContext};
use crate::onboarding::model::Waiver;

/// Version stamped on every signed waiver.
pub const WAIVER_VERSION: &str = "2024-03";

const MAX_MEDICAL_LEN: usize = 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaiverCandidate {
    pub accepted_terms: Option<bool>,
    pub accepted_liability: Option<bool>,
    pub accepted_medical: Option<bool>,
    pub signature: Option<String>,
    pub medical_conditions: Option<String>,
}

fn normalize_signature(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Schema for WaiverCandidate {
    type Output = Waiver;

    fn validate(&self, ctx: &ValidationContext) -> Result<Waiver, FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.accepted_terms != Some(true) {
            errors.add("acceptedTerms", "You must accept the terms and conditions");
        }
        if self.accepted_liability != Some(true) {
            errors.add("acceptedLiability", "You must acknowledge the liability release");
        }
        if self.accepted_medical != Some(true) {
            errors.add(
                "acceptedMedical",
                "You must confirm you are medically fit to take part",
            );
        }

        let signature = rules::person_name(&mut errors, "signature", &self.signature, "Signature");
        if let (Some(sig), Some(expected)) = (&signature, &ctx.user_full_name) {
            if normalize_signature(sig) != normalize_signature(expected) {
                errors.add("signature", "Signature must match your full name");
            }
        }

        let medical_conditions = rules::optional_text(
            &mut errors,
            "medicalConditions",
            &self.medical_conditions,
            "Medical conditions",
            MAX_MEDICAL_LEN,
        );

        errors.into_result(Waiver {
            accepted_terms: Some(true),
            accepted_liability: Some(true),
            accepted_medical: Some(true),
            signature,
            medical_conditions,
            waiver_version: Some(WAIVER_VERSION.to_string()),
            signed_at: Some(Utc::now()),
        })
    }
}
