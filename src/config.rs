//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::validation::{AgeRule, ValidationContext};

/// Wizard service configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// HTTP port for the JSON API.
    pub port: u16,
    /// Sessions idle for longer than this are discarded.
    pub session_ttl: Duration,
    /// How often the expiry sweep runs.
    pub sweep_interval: Duration,
    /// Minimum customer age for the profile step.
    pub min_age: u32,
    /// How age is derived from the date of birth.
    pub age_rule: AgeRule,
    /// Retries after the first failed attempt of a simulated request.
    pub max_retries: u32,
    /// Countdown before an automatic retry. `None` leaves retries to the user.
    pub auto_retry_after: Option<Duration>,
    /// Simulated latency of the time-slot lookup.
    pub slot_fetch_delay: Duration,
    /// Simulated latency of payment processing.
    pub payment_delay: Duration,
    /// How many days ahead lessons can be booked.
    pub booking_horizon_days: u32,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            session_ttl: Duration::from_secs(60 * 60), // 1 hour
            sweep_interval: Duration::from_secs(60),
            min_age: 13,
            age_rule: AgeRule::CalendarYear,
            max_retries: 3,
            auto_retry_after: Some(Duration::from_secs(5)),
            slot_fetch_delay: Duration::from_millis(300),
            payment_delay: Duration::from_millis(800),
            booking_horizon_days: 90,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl WizardConfig {
    /// Build from `SURF_ONBOARD_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let age_rule = match std::env::var("SURF_ONBOARD_AGE_RULE").as_deref() {
            Ok("exact") => AgeRule::Exact,
            Ok("calendar_year") => AgeRule::CalendarYear,
            _ => defaults.age_rule,
        };

        // 0 disables automatic retries
        let auto_retry_after = match env_parse::<u64>("SURF_ONBOARD_AUTO_RETRY_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.auto_retry_after,
        };

        Self {
            port: env_parse("SURF_ONBOARD_PORT").unwrap_or(defaults.port),
            session_ttl: env_parse::<u64>("SURF_ONBOARD_SESSION_TTL_MIN")
                .map(|m| Duration::from_secs(m * 60))
                .unwrap_or(defaults.session_ttl),
            sweep_interval: env_parse::<u64>("SURF_ONBOARD_SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            min_age: env_parse("SURF_ONBOARD_MIN_AGE").unwrap_or(defaults.min_age),
            age_rule,
            max_retries: env_parse("SURF_ONBOARD_MAX_RETRIES").unwrap_or(defaults.max_retries),
            auto_retry_after,
            slot_fetch_delay: env_parse::<u64>("SURF_ONBOARD_SLOT_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.slot_fetch_delay),
            payment_delay: env_parse::<u64>("SURF_ONBOARD_PAYMENT_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.payment_delay),
            booking_horizon_days: env_parse("SURF_ONBOARD_BOOKING_HORIZON_DAYS")
                .unwrap_or(defaults.booking_horizon_days),
        }
    }

    /// Reject values the wizard cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_age == 0 || self.min_age > 99 {
            return Err(ConfigError::InvalidValue {
                key: "SURF_ONBOARD_MIN_AGE".into(),
                message: format!("{} is outside 1..=99", self.min_age),
            });
        }
        if self.max_retries > 10 {
            return Err(ConfigError::InvalidValue {
                key: "SURF_ONBOARD_MAX_RETRIES".into(),
                message: format!("{} retries is more than the allowed 10", self.max_retries),
            });
        }
        if self.session_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "SURF_ONBOARD_SESSION_TTL_MIN".into(),
                message: "session TTL must be positive".into(),
            });
        }
        if self.booking_horizon_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SURF_ONBOARD_BOOKING_HORIZON_DAYS".into(),
                message: "booking horizon must be at least one day".into(),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            auto_retry_after: self.auto_retry_after,
        }
    }

    /// Validation context for `today` with this config's limits applied.
    pub fn validation_context(&self, today: chrono::NaiveDate) -> ValidationContext {
        ValidationContext {
            today,
            min_age: self.min_age,
            age_rule: self.age_rule,
            booking_horizon_days: self.booking_horizon_days,
            user_full_name: None,
            user_phone: None,
        }
    }

    /// Instant config for tests: no simulated latency, no retry countdown.
    pub fn for_tests() -> Self {
        Self {
            auto_retry_after: Some(Duration::ZERO),
            slot_fetch_delay: Duration::ZERO,
            payment_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = WizardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_age, 13);
        assert_eq!(config.age_rule, AgeRule::CalendarYear);
    }

    #[test]
    fn zero_min_age_rejected() {
        let config = WizardConfig {
            min_age: 0,
            ..WizardConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SURF_ONBOARD_MIN_AGE"));
    }

    #[test]
    fn retry_policy_mirrors_config() {
        let config = WizardConfig {
            max_retries: 2,
            auto_retry_after: None,
            ..WizardConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 2);
        assert!(policy.auto_retry_after.is_none());
    }

    #[test]
    fn validation_context_carries_limits() {
        let config = WizardConfig {
            min_age: 16,
            booking_horizon_days: 30,
            ..WizardConfig::default()
        };
        let today = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let ctx = config.validation_context(today);
        assert_eq!(ctx.min_age, 16);
        assert_eq!(ctx.booking_horizon_days, 30);
        assert_eq!(ctx.today, today);
    }
}
