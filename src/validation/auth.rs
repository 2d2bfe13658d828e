//! Account step: signup and login forms.

use serde::{Deserialize, Serialize};

use super::rules;
use super::{FieldErrors, Schema, ValidationContext};
use crate::onboarding::model::{AuthProvider, UserSection};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

/// Signup form as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupCandidate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub accept_terms: Option<bool>,
    pub marketing_opt_in: Option<bool>,
}

/// A validated signup. The password is checked and then dropped; credential
/// storage belongs to the account service, not the wizard.
#[derive(Debug, Clone, PartialEq)]
pub struct Signup {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub marketing_opt_in: bool,
}

impl From<Signup> for UserSection {
    fn from(s: Signup) -> Self {
        UserSection {
            email: Some(s.email),
            first_name: Some(s.first_name),
            last_name: Some(s.last_name),
            marketing_opt_in: Some(s.marketing_opt_in),
            auth_provider: Some(AuthProvider::Email),
            ..Default::default()
        }
    }
}

/// Which strength requirements `password` misses.
pub fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        problems.push("Password must be at least 8 characters");
    }
    if len > MAX_PASSWORD_LEN {
        problems.push("Password must be at most 128 characters");
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        problems.push("Password must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        problems.push("Password must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain a number");
    }
    if password.chars().all(|c| c.is_alphanumeric() || c.is_whitespace()) {
        problems.push("Password must contain a special character");
    }
    problems
}

impl Schema for SignupCandidate {
    type Output = Signup;

    fn validate(&self, _ctx: &ValidationContext) -> Result<Signup, FieldErrors> {
        let mut errors = FieldErrors::new();

        let email = rules::email(&mut errors, "email", &self.email);
        let first_name = rules::person_name(&mut errors, "firstName", &self.first_name, "First name");
        let last_name = rules::person_name(&mut errors, "lastName", &self.last_name, "Last name");

        match self.password.as_deref() {
            None | Some("") => errors.add("password", "Password is required"),
            Some(password) => {
                for problem in password_problems(password) {
                    errors.add("password", problem);
                }
            }
        }

        match (self.password.as_deref(), self.confirm_password.as_deref()) {
            (_, None | Some("")) => errors.add("confirmPassword", "Please confirm your password"),
            (Some(password), Some(confirm)) if password != confirm => {
                errors.add("confirmPassword", "Passwords don't match")
            }
            _ => {}
        }

        if self.accept_terms != Some(true) {
            errors.add("acceptTerms", "You must accept the terms of service");
        }

        match (email, first_name, last_name) {
            (Some(email), Some(first_name), Some(last_name)) if errors.is_empty() => Ok(Signup {
                email,
                first_name,
                last_name,
                marketing_opt_in: self.marketing_opt_in.unwrap_or(false),
            }),
            _ => Err(errors),
        }
    }
}

/// Login form for returning customers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCandidate {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Login {
    pub email: String,
}

impl Schema for LoginCandidate {
    type Output = Login;

    fn validate(&self, _ctx: &ValidationContext) -> Result<Login, FieldErrors> {
        let mut errors = FieldErrors::new();
        let email = rules::email(&mut errors, "email", &self.email);
        if self.password.as_deref().is_none_or(str::is_empty) {
            errors.add("password", "Password is required");
        }
        match email {
            Some(email) if errors.is_empty() => Ok(Login { email }),
            _ => Err(errors),
        }
    }
}
