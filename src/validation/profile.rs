//! Profile step: personal details, age eligibility and gear sizing.

use serde::{Deserialize, Serialize};

use super::rules;
use super::{FieldErrors, Schema, ValidationContext};
use crate::onboarding::model::{UserSection, WetsuitSize};

const MAX_AGE: i32 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCandidate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `YYYY-MM-DD`.
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub height_cm: Option<u16>,
    pub weight_kg: Option<u16>,
    pub wetsuit_size: Option<String>,
}

impl Schema for ProfileCandidate {
    type Output = UserSection;

    fn validate(&self, ctx: &ValidationContext) -> Result<UserSection, FieldErrors> {
        let mut errors = FieldErrors::new();

        let first_name = rules::person_name(&mut errors, "firstName", &self.first_name, "First name");
        let last_name = rules::person_name(&mut errors, "lastName", &self.last_name, "Last name");
        let phone = rules::phone(&mut errors, "phone", &self.phone);
        let country = rules::optional_text(&mut errors, "country", &self.country, "Country", 56);
        let height_cm = rules::in_range(&mut errors, "heightCm", self.height_cm, "Height (cm)", 100, 230);
        let weight_kg = rules::in_range(&mut errors, "weightKg", self.weight_kg, "Weight (kg)", 30, 200);
        let wetsuit_size: Option<WetsuitSize> = rules::optional_choice(
            &mut errors,
            "wetsuitSize",
            &self.wetsuit_size,
            "Wetsuit size",
            "XS, S, M, L, XL, XXL",
        );

        let date_of_birth = rules::date(&mut errors, "dateOfBirth", &self.date_of_birth, "Date of birth")
            .and_then(|dob| {
                if dob > ctx.today {
                    errors.add("dateOfBirth", "Date of birth cannot be in the future");
                    return None;
                }
                let age = rules::age_on(dob, ctx.today, ctx.age_rule);
                if age < ctx.min_age as i32 {
                    errors.add(
                        "dateOfBirth",
                        format!("You must be at least {} years old", ctx.min_age),
                    );
                    return None;
                }
                if age > MAX_AGE {
                    errors.add("dateOfBirth", "Please enter a valid date of birth");
                    return None;
                }
                Some(dob)
            });

        errors.into_result(UserSection {
            first_name,
            last_name,
            phone,
            date_of_birth,
            country,
            height_cm,
            weight_kg,
            wetsuit_size,
            ..Default::default()
        })
    }
}
