//! Failure classification and bounded retries for simulated remote calls.
//!
//! Slot lookups and payment processing can fail. Each failure is classified
//! into a [`FailureKind`] with its own customer-facing message. Retryable
//! kinds are retried up to [`RetryPolicy::max_retries`] times, either
//! automatically after a countdown or by the customer pressing retry. Once
//! retries run out the report is terminal and offers a way back, home, or
//! to support.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Category of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Auth,
    Validation,
    Server,
    Timeout,
    Unknown,
}

impl FailureKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::Network => "Connection problem",
            Self::Auth => "Authorization failed",
            Self::Validation => "Request rejected",
            Self::Server => "Something went wrong on our side",
            Self::Timeout => "Request timed out",
            Self::Unknown => "Unexpected error",
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            Self::Network => "We couldn't reach the server. Check your connection and try again.",
            Self::Auth => "The request was declined. Please check your details or use another method.",
            Self::Validation => "Some of the submitted information was rejected. Please review it and try again.",
            Self::Server => "Our booking system hit a problem. We'll try again shortly.",
            Self::Timeout => "This is taking longer than expected. We'll try again shortly.",
            Self::Unknown => "Something unexpected happened. Please try again.",
        }
    }

    /// Auth and validation failures need different input, not another try.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Auth | Self::Validation)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::Server => "server",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A single failed attempt reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} failure: {detail}")]
pub struct RequestFailure {
    pub kind: FailureKind,
    /// Technical detail for logs; never shown to customers.
    pub detail: String,
}

impl RequestFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// What the customer can do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOption {
    Retry,
    GoBack,
    GoHome,
    ContactSupport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Countdown before an automatic retry; `None` means manual retry only.
    pub auto_retry_after: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            auto_retry_after: None,
        }
    }
}

/// Customer-facing description of the latest failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{title} (attempt {attempt}, {kind})")]
pub struct FailureReport {
    pub kind: FailureKind,
    pub title: String,
    pub message: String,
    pub attempt: u32,
    pub retries_left: u32,
    pub retryable: bool,
    /// Seconds until the next automatic retry, when one is scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_secs: Option<u64>,
    /// Retries are exhausted; show the failure screen.
    pub terminal: bool,
    pub recovery: Vec<RecoveryOption>,
}

/// Counts attempts of one logical operation across calls.
///
/// With manual retries each call to [`run`](RetryTracker::run) is one
/// attempt, so the count has to outlive the call. It resets on success.
#[derive(Debug, Clone)]
pub struct RetryTracker {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Build the report for a failure on the current attempt.
    pub fn report(&self, failure: &RequestFailure) -> FailureReport {
        let allowed = self.policy.max_retries + 1;
        let retries_left = allowed.saturating_sub(self.attempts);
        let retryable = failure.kind.is_retryable() && retries_left > 0;
        let terminal = failure.kind.is_retryable() && retries_left == 0;

        let recovery = if terminal {
            vec![
                RecoveryOption::GoBack,
                RecoveryOption::GoHome,
                RecoveryOption::ContactSupport,
            ]
        } else if retryable {
            vec![RecoveryOption::Retry, RecoveryOption::GoBack]
        } else {
            vec![RecoveryOption::GoBack]
        };

        let message = if terminal {
            "We still couldn't complete this after several tries. You can go back, return home, or contact support.".to_string()
        } else {
            failure.kind.user_message().to_string()
        };

        FailureReport {
            kind: failure.kind,
            title: failure.kind.title().to_string(),
            message,
            attempt: self.attempts,
            retries_left,
            retryable,
            retry_in_secs: if retryable {
                self.policy.auto_retry_after.map(|d| d.as_secs())
            } else {
                None
            },
            terminal,
            recovery,
        }
    }

    /// Run `op`, retrying retryable failures within the policy.
    ///
    /// With an auto-retry countdown the loop sleeps and tries again until it
    /// succeeds or the retries run out. Without one, the first failure of
    /// this call is returned and the next call counts as the retry.
    pub async fn run<T, F, Fut>(&mut self, label: &str, mut op: F) -> Result<T, FailureReport>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RequestFailure>>,
    {
        loop {
            // A terminal report from an earlier call starts a fresh round.
            if self.attempts > self.policy.max_retries {
                self.attempts = 0;
            }
            self.attempts += 1;

            match op(self.attempts).await {
                Ok(value) => {
                    self.attempts = 0;
                    return Ok(value);
                }
                Err(failure) => {
                    let report = self.report(&failure);
                    warn!(
                        operation = label,
                        attempt = self.attempts,
                        kind = %failure.kind,
                        detail = %failure.detail,
                        retries_left = report.retries_left,
                        "Request attempt failed"
                    );
                    if !failure.kind.is_retryable() {
                        self.attempts = 0;
                        return Err(report);
                    }
                    match (report.retryable, self.policy.auto_retry_after) {
                        (true, Some(countdown)) => tokio::time::sleep(countdown).await,
                        _ => return Err(report),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn auto(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            auto_retry_after: Some(Duration::from_secs(5)),
        }
    }

    type Attempt = std::future::Ready<Result<u32, RequestFailure>>;

    fn flaky(fail_times: u32, kind: FailureKind) -> (Arc<AtomicU32>, impl FnMut(u32) -> Attempt) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let op = move |attempt: u32| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n <= fail_times {
                Err(RequestFailure::new(kind, "simulated"))
            } else {
                Ok(attempt)
            })
        };
        (calls, op)
    }

    #[test]
    fn every_kind_has_distinct_message() {
        let kinds = [
            FailureKind::Network,
            FailureKind::Auth,
            FailureKind::Validation,
            FailureKind::Server,
            FailureKind::Timeout,
            FailureKind::Unknown,
        ];
        let mut messages: Vec<&str> = kinds.iter().map(|k| k.user_message()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), kinds.len());
        assert!(!FailureKind::Auth.is_retryable());
        assert!(FailureKind::Timeout.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_retry_recovers_within_budget() {
        let mut tracker = RetryTracker::new(auto(3));
        let (calls, op) = flaky(2, FailureKind::Network);
        let result = tracker.run("test", op).await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_retries_is_terminal() {
        let mut tracker = RetryTracker::new(auto(2));
        let (calls, op) = flaky(10, FailureKind::Server);
        let report = tracker.run("test", op).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(report.terminal);
        assert!(!report.retryable);
        assert_eq!(report.retries_left, 0);
        assert_eq!(
            report.recovery,
            vec![RecoveryOption::GoBack, RecoveryOption::GoHome, RecoveryOption::ContactSupport]
        );
    }

    #[tokio::test]
    async fn non_retryable_failure_returns_immediately() {
        let mut tracker = RetryTracker::new(auto(3));
        let (calls, op) = flaky(1, FailureKind::Auth);
        let report = tracker.run("test", op).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!report.terminal);
        assert!(!report.retryable);
        assert_eq!(report.recovery, vec![RecoveryOption::GoBack]);
        assert_eq!(tracker.attempts(), 0);
    }

    #[tokio::test]
    async fn manual_retry_counts_across_calls() {
        let mut tracker = RetryTracker::new(RetryPolicy {
            max_retries: 1,
            auto_retry_after: None,
        });

        let (_, op) = flaky(5, FailureKind::Timeout);
        let first = tracker.run("test", op).await.unwrap_err();
        assert!(first.retryable);
        assert_eq!(first.retries_left, 1);
        assert!(first.retry_in_secs.is_none());
        assert_eq!(first.recovery[0], RecoveryOption::Retry);

        let (_, op) = flaky(5, FailureKind::Timeout);
        let second = tracker.run("test", op).await.unwrap_err();
        assert!(second.terminal);
        assert_eq!(second.attempt, 2);
    }

    #[test]
    fn report_announces_countdown() {
        let tracker = RetryTracker {
            policy: auto(3),
            attempts: 1,
        };
        let report = tracker.report(&RequestFailure::new(FailureKind::Network, "reset"));
        assert_eq!(report.retry_in_secs, Some(5));
        assert_eq!(report.retries_left, 3);
    }
}
