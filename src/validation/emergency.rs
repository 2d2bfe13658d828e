//! Emergency contact step. The step itself can be skipped; see
//! `OnboardingManager::skip_emergency`.

use serde::{Deserialize, Serialize};

use super::rules;
use super::{FieldErrors, Schema, ValidationContext};
use crate::onboarding::model::EmergencyContact;

/// Relationships offered by the form.
pub const RELATIONSHIPS: [&str; 6] = ["parent", "spouse", "partner", "sibling", "friend", "other"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContactCandidate {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Schema for EmergencyContactCandidate {
    type Output = EmergencyContact;

    fn validate(&self, ctx: &ValidationContext) -> Result<EmergencyContact, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = rules::person_name(&mut errors, "name", &self.name, "Contact name");
        let relationship = rules::required_text(&mut errors, "relationship", &self.relationship, "Relationship")
            .map(|r| r.to_lowercase())
            .and_then(|r| {
                if RELATIONSHIPS.contains(&r.as_str()) {
                    Some(r)
                } else {
                    errors.add(
                        "relationship",
                        format!("Relationship must be one of: {}", RELATIONSHIPS.join(", ")),
                    );
                    None
                }
            });
        let phone = rules::phone(&mut errors, "phone", &self.phone);
        let email = rules::optional_email(&mut errors, "email", &self.email);

        if let (Some(contact_phone), Some(own_phone)) = (&phone, &ctx.user_phone) {
            if *contact_phone == rules::normalize_phone(own_phone) {
                errors.add("phone", "Emergency contact must have a different phone number than yours");
            }
        }

        errors.into_result(EmergencyContact {
            name,
            relationship,
            phone,
            email,
            skipped: Some(false),
        })
    }
}
