//! Payment processing seam and its simulated implementation.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::retry::{FailureKind, RequestFailure};
use crate::validation::PaymentDetails;

/// Proof of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub processed_at: DateTime<Utc>,
}

/// Charges validated payment details.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Attempt a charge. `attempt` starts at 1 and grows with each retry.
    async fn charge(
        &self,
        details: &PaymentDetails,
        amount: Decimal,
        attempt: u32,
    ) -> Result<PaymentReceipt, RequestFailure>;
}

/// Card numbers that make the simulated processor fail a certain way.
pub const DECLINED_CARD: &str = "4000000000000002";
pub const PROCESSOR_ERROR_CARD: &str = "4000000000000119";
pub const INSUFFICIENT_FUNDS_CARD: &str = "4000000000009995";

/// Processor that succeeds unless told otherwise.
///
/// Scripted failures are consumed one per charge, before the test-card
/// rules are consulted.
#[derive(Debug, Default)]
pub struct SimulatedPaymentProcessor {
    delay: Duration,
    scripted: Mutex<VecDeque<FailureKind>>,
}

impl SimulatedPaymentProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            scripted: Mutex::new(VecDeque::new()),
        }
    }

    /// Fail the next charges with `kinds`, in order.
    pub fn with_failures(self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        Self {
            scripted: Mutex::new(kinds.into_iter().collect()),
            ..self
        }
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedPaymentProcessor {
    async fn charge(
        &self,
        details: &PaymentDetails,
        amount: Decimal,
        attempt: u32,
    ) -> Result<PaymentReceipt, RequestFailure> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(kind) = self.scripted.lock().await.pop_front() {
            return Err(RequestFailure::new(kind, format!("scripted failure on attempt {attempt}")));
        }

        if let PaymentDetails::Card(card) = details {
            match card.number.as_str() {
                DECLINED_CARD => {
                    return Err(RequestFailure::new(FailureKind::Auth, "card declined by issuer"));
                }
                PROCESSOR_ERROR_CARD => {
                    return Err(RequestFailure::new(FailureKind::Server, "processor returned 500"));
                }
                INSUFFICIENT_FUNDS_CARD => {
                    return Err(RequestFailure::new(FailureKind::Validation, "insufficient funds"));
                }
                _ => {}
            }
        }

        if amount <= Decimal::ZERO {
            return Err(RequestFailure::new(
                FailureKind::Validation,
                format!("refusing to charge {amount}"),
            ));
        }

        let receipt = PaymentReceipt {
            transaction_id: format!("txn_{}", Uuid::new_v4().simple()),
            processed_at: Utc::now(),
        };
        info!(
            method = %details.method(),
            %amount,
            attempt,
            transaction_id = %receipt.transaction_id,
            "Payment charged"
        );
        Ok(receipt)
    }
}

/// Customer-facing booking reference, e.g. `SURF-7KQ2XM`.
pub fn booking_reference() -> String {
    let code: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("SURF-{code}")
}
