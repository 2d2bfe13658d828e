//! In-memory session registry with idle expiry and the operator funnel view.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::WizardConfig;
use crate::error::{Result, SessionError};
use crate::lessons::{SimulatedSlotProvider, SlotProvider};
use crate::payments::{PaymentProcessor, SimulatedPaymentProcessor};

use super::manager::OnboardingManager;
use super::model::PaymentStatus;
use super::step::Step;

/// Sessions currently sitting on one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCount {
    pub step: Step,
    pub label: &'static str,
    pub sessions: usize,
}

/// Operator dashboard numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSummary {
    pub active_sessions: usize,
    pub completed_sessions: usize,
    pub by_step: Vec<StepCount>,
    pub revenue: Decimal,
    pub sessions_created: u64,
    pub sessions_expired: u64,
    pub express_checkouts: u64,
}

/// Owns every live [`OnboardingManager`], keyed by session id.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<OnboardingManager>>>,
    config: Arc<WizardConfig>,
    slots: Arc<dyn SlotProvider>,
    payments: Arc<dyn PaymentProcessor>,
    created: AtomicU64,
    expired: AtomicU64,
    express: AtomicU64,
}

impl SessionRegistry {
    pub fn new(
        config: Arc<WizardConfig>,
        slots: Arc<dyn SlotProvider>,
        payments: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            slots,
            payments,
            created: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            express: AtomicU64::new(0),
        }
    }

    /// Registry backed by the simulated slot and payment providers.
    pub fn simulated(config: WizardConfig) -> Self {
        let slots = Arc::new(SimulatedSlotProvider::new(config.slot_fetch_delay));
        let payments = Arc::new(SimulatedPaymentProcessor::new(config.payment_delay));
        Self::new(Arc::new(config), slots, payments)
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn slot_provider(&self) -> Arc<dyn SlotProvider> {
        Arc::clone(&self.slots)
    }

    pub fn payment_processor(&self) -> Arc<dyn PaymentProcessor> {
        Arc::clone(&self.payments)
    }

    fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365))
    }

    /// Start a new wizard session.
    pub async fn create(&self) -> Arc<OnboardingManager> {
        let manager = Arc::new(OnboardingManager::new(
            Arc::clone(&self.config),
            Arc::clone(&self.slots),
            Arc::clone(&self.payments),
        ));
        let id = manager.session_id().await;
        self.sessions.write().await.insert(id, Arc::clone(&manager));
        self.created.fetch_add(1, Ordering::Relaxed);
        info!(session_id = %id, "Onboarding session created");
        manager
    }

    /// Look up a live session. Idle sessions are evicted on access.
    pub async fn get(&self, id: Uuid) -> Result<Arc<OnboardingManager>> {
        let manager = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound { id })?;

        if manager.is_idle(self.ttl(), Utc::now()).await {
            if self.sessions.write().await.remove(&id).is_some() {
                self.expired.fetch_add(1, Ordering::Relaxed);
                info!(session_id = %id, "Onboarding session expired");
            }
            return Err(SessionError::Expired { id }.into());
        }
        Ok(manager)
    }

    /// Reset a session in place; it is re-registered under its new id.
    pub async fn reset(&self, id: Uuid) -> Result<Arc<OnboardingManager>> {
        let manager = self.get(id).await?;
        let new_id = manager.reset().await;
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id);
        sessions.insert(new_id, Arc::clone(&manager));
        info!(previous = %id, session_id = %new_id, "Onboarding session reset");
        Ok(manager)
    }

    /// Tear down a session. Returns false if it was not registered.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Onboarding session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every session idle longer than the TTL. Returns how many went.
    pub async fn expire_idle(&self) -> usize {
        let ttl = self.ttl();
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let mut idle = Vec::new();
        for (id, manager) in sessions.iter() {
            if manager.is_idle(ttl, now).await {
                idle.push(*id);
            }
        }
        for id in &idle {
            sessions.remove(id);
            debug!(session_id = %id, "Onboarding session expired");
        }

        if !idle.is_empty() {
            self.expired.fetch_add(idle.len() as u64, Ordering::Relaxed);
            info!(count = idle.len(), remaining = sessions.len(), "Expired idle sessions");
        }
        idle.len()
    }

    pub fn record_express_checkout(&self) {
        self.express.fetch_add(1, Ordering::Relaxed);
    }

    /// Sessions per current step, completions and paid revenue.
    pub async fn funnel_summary(&self) -> OperatorSummary {
        let managers: Vec<Arc<OnboardingManager>> =
            self.sessions.read().await.values().cloned().collect();

        let mut per_step: HashMap<Step, usize> = HashMap::new();
        let mut completed_sessions = 0;
        let mut revenue = Decimal::ZERO;
        for manager in &managers {
            let session = manager.snapshot().await;
            *per_step.entry(session.current_step).or_default() += 1;
            if session.is_completed() {
                completed_sessions += 1;
            }
            if session.payment.status == Some(PaymentStatus::Completed) {
                revenue += session.payment.amount.unwrap_or_default();
            }
        }

        OperatorSummary {
            active_sessions: managers.len(),
            completed_sessions,
            by_step: Step::ORDER
                .iter()
                .map(|&step| StepCount {
                    step,
                    label: step.label(),
                    sessions: per_step.get(&step).copied().unwrap_or(0),
                })
                .collect(),
            revenue,
            sessions_created: self.created.load(Ordering::Relaxed),
            sessions_expired: self.expired.load(Ordering::Relaxed),
            express_checkouts: self.express.load(Ordering::Relaxed),
        }
    }
}

/// Sweep idle sessions on the configured interval.
pub fn spawn_expiry_task(registry: Arc<SessionRegistry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(registry.config().sweep_interval);
        loop {
            interval.tick().await;
            registry.expire_idle().await;
        }
    })
}
