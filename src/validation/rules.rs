//! Field-level rules shared by the step schemas.
//!
//! Each helper records its own message on failure and returns the
//! normalized value on success, so schemas can run every rule and report
//! all problems at once.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveTime};
use regex::Regex;
use serde::de::DeserializeOwned;
use validator::ValidateEmail;

use super::{AgeRule, FieldErrors};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}[\p{L} '.\-]*$").expect("name regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ().\-]+$").expect("phone regex"));

/// Trimmed, non-empty text or a "{label} is required" error.
pub fn required_text(
    errors: &mut FieldErrors,
    path: &str,
    value: &Option<String>,
    label: &str,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            errors.add(path, format!("{label} is required"));
            None
        }
    }
}

/// Trimmed optional text; empty strings collapse to `None`.
pub fn optional_text(
    errors: &mut FieldErrors,
    path: &str,
    value: &Option<String>,
    label: &str,
    max_len: usize,
) -> Option<String> {
    let v = value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
    if v.chars().count() > max_len {
        errors.add(path, format!("{label} must be at most {max_len} characters"));
        return None;
    }
    Some(v.to_string())
}

/// A person's first/last/full name: letters, spaces, apostrophes, dots and
/// hyphens, 2 to 50 characters.
pub fn person_name(
    errors: &mut FieldErrors,
    path: &str,
    value: &Option<String>,
    label: &str,
) -> Option<String> {
    let name = required_text(errors, path, value, label)?;
    let len = name.chars().count();
    if len < 2 {
        errors.add(path, format!("{label} must be at least 2 characters"));
        None
    } else if len > 50 {
        errors.add(path, format!("{label} must be at most 50 characters"));
        None
    } else if !NAME_RE.is_match(&name) {
        errors.add(path, format!("{label} contains invalid characters"));
        None
    } else {
        Some(name)
    }
}

/// Lower-cased email address.
pub fn email(errors: &mut FieldErrors, path: &str, value: &Option<String>) -> Option<String> {
    let address = required_text(errors, path, value, "Email")?.to_lowercase();
    if address.validate_email() {
        Some(address)
    } else {
        errors.add(path, "Enter a valid email address");
        None
    }
}

/// Optional email: absent is fine, present must be valid.
pub fn optional_email(
    errors: &mut FieldErrors,
    path: &str,
    value: &Option<String>,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => email(errors, path, value),
        _ => None,
    }
}

/// Strip formatting from a phone number, keeping a leading `+`.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        digits
    }
}

/// Phone number with 7 to 15 digits, returned normalized.
pub fn phone(errors: &mut FieldErrors, path: &str, value: &Option<String>) -> Option<String> {
    let raw = required_text(errors, path, value, "Phone number")?;
    let digit_count = raw.chars().filter(char::is_ascii_digit).count();
    if !PHONE_RE.is_match(&raw) || !(7..=15).contains(&digit_count) {
        errors.add(path, "Enter a valid phone number");
        return None;
    }
    Some(normalize_phone(&raw))
}

/// Parse a required enum-valued field from its wire string.
///
/// `options` is the human list shown when the value is missing or unknown.
pub fn choice<T: DeserializeOwned>(
    errors: &mut FieldErrors,
    path: &str,
    value: &Option<String>,
    label: &str,
    options: &str,
) -> Option<T> {
    let Some(raw) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
        errors.add(path, format!("{label} is required"));
        return None;
    };
    match serde_json::from_value(serde_json::Value::String(raw.to_string())) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.add(path, format!("{label} must be one of: {options}"));
            None
        }
    }
}

/// Like [`choice`], but absence is not an error.
pub fn optional_choice<T: DeserializeOwned>(
    errors: &mut FieldErrors,
    path: &str,
    value: &Option<String>,
    label: &str,
    options: &str,
) -> Option<T> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => choice(errors, path, value, label, options),
        _ => None,
    }
}

/// `YYYY-MM-DD` date.
pub fn date(
    errors: &mut FieldErrors,
    path: &str,
    value: &Option<String>,
    label: &str,
) -> Option<NaiveDate> {
    let raw = required_text(errors, path, value, label)?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            errors.add(path, format!("{label} must be a valid date (YYYY-MM-DD)"));
            None
        }
    }
}

/// `HH:MM` (24h) time of day.
pub fn time_of_day(
    errors: &mut FieldErrors,
    path: &str,
    value: &Option<String>,
    label: &str,
) -> Option<NaiveTime> {
    let raw = required_text(errors, path, value, label)?;
    match NaiveTime::parse_from_str(&raw, "%H:%M") {
        Ok(t) => Some(t),
        Err(_) => {
            errors.add(path, format!("{label} must be a time like 09:30"));
            None
        }
    }
}

/// Age on `today` for someone born on `dob`.
///
/// [`AgeRule::CalendarYear`] only subtracts years, so someone whose birthday
/// is later this year already counts as a year older.
pub fn age_on(dob: NaiveDate, today: NaiveDate, rule: AgeRule) -> i32 {
    let years = today.year() - dob.year();
    match rule {
        AgeRule::CalendarYear => years,
        AgeRule::Exact => {
            if (today.month(), today.day()) < (dob.month(), dob.day()) {
                years - 1
            } else {
                years
            }
        }
    }
}

/// Inclusive numeric range check on an optional value.
pub fn in_range<T>(errors: &mut FieldErrors, path: &str, value: Option<T>, label: &str, min: T, max: T) -> Option<T>
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    let v = value?;
    if v < min || v > max {
        errors.add(path, format!("{label} must be between {min} and {max}"));
        return None;
    }
    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::Sport;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn required_text_trims_and_rejects_blank() {
        let mut errors = FieldErrors::new();
        assert_eq!(required_text(&mut errors, "a", &s("  hi "), "A"), Some("hi".into()));
        assert_eq!(required_text(&mut errors, "b", &s("   "), "B"), None);
        assert_eq!(required_text(&mut errors, "c", &None, "C"), None);
        assert_eq!(errors.message_for("b"), Some("B is required"));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn email_is_lowercased_and_checked() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            email(&mut errors, "email", &s("Kai@Example.COM")),
            Some("kai@example.com".into())
        );
        assert!(email(&mut errors, "bad", &s("not-an-email")).is_none());
        assert_eq!(errors.message_for("bad"), Some("Enter a valid email address"));
    }

    #[test]
    fn phone_normalizes_formatting() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            phone(&mut errors, "phone", &s("+1 (555) 123-4567")),
            Some("+15551234567".into())
        );
        assert!(phone(&mut errors, "short", &s("12345")).is_none());
        assert!(phone(&mut errors, "letters", &s("555-CALL-NOW")).is_none());
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn names_reject_digits() {
        let mut errors = FieldErrors::new();
        assert!(person_name(&mut errors, "n", &s("Kai"), "Name").is_some());
        assert!(person_name(&mut errors, "n", &s("Ana-María O'Neil"), "Name").is_some());
        assert!(person_name(&mut errors, "x", &s("K4i"), "Name").is_none());
        assert!(person_name(&mut errors, "y", &s("K"), "Name").is_none());
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn choice_parses_wire_names() {
        let mut errors = FieldErrors::new();
        let sport: Option<Sport> = choice(&mut errors, "sport", &s("kitesurf"), "Sport", "surf, kitesurf");
        assert_eq!(sport, Some(Sport::Kitesurf));
        let bad: Option<Sport> = choice(&mut errors, "sport", &s("windsurf"), "Sport", "surf, kitesurf");
        assert!(bad.is_none());
        assert_eq!(errors.message_for("sport"), Some("Sport must be one of: surf, kitesurf"));
    }

    #[test]
    fn calendar_year_age_ignores_birthday() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let dob = NaiveDate::from_ymd_opt(2013, 12, 31).unwrap();
        assert_eq!(age_on(dob, today, AgeRule::CalendarYear), 13);
        assert_eq!(age_on(dob, today, AgeRule::Exact), 12);
    }

    #[test]
    fn exact_age_counts_birthday_itself() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        let dob = NaiveDate::from_ymd_opt(2013, 6, 15).unwrap();
        assert_eq!(age_on(dob, today, AgeRule::Exact), 13);
    }

    #[test]
    fn dates_and_times_parse_strictly() {
        let mut errors = FieldErrors::new();
        assert!(date(&mut errors, "d", &s("2026-02-30"), "Date").is_none());
        assert!(time_of_day(&mut errors, "t", &s("9am"), "Time").is_none());
        assert!(time_of_day(&mut errors, "ok", &s("09:30"), "Time").is_some());
        assert_eq!(errors.len(), 2);
    }
}
