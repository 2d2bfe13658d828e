//! Guest and partner express checkout: the whole booking in one request,
//! without an account or a wizard session.

pub mod routes;

use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, NaiveTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::WizardConfig;
use crate::error::Result;
use crate::lessons::{Lesson, Partner, SlotProvider, catalog};
use crate::onboarding::model::{AuthProvider, UserSection};
use crate::payments::{self, PaymentProcessor};
use crate::retry::RetryTracker;
use crate::validation::{
    BookingCandidate, FieldErrors, PaymentCandidate, Schema, ValidationContext, WaiverCandidate,
    rules,
};

static PARTNER_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9]{4,12}$").expect("partner code regex is valid")
});

/// Contact details for a customer booking without an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCandidate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Schema for GuestCandidate {
    type Output = UserSection;

    fn validate(&self, _ctx: &ValidationContext) -> std::result::Result<UserSection, FieldErrors> {
        let mut errors = FieldErrors::new();
        let first_name = rules::person_name(&mut errors, "firstName", &self.first_name, "First name");
        let last_name = rules::person_name(&mut errors, "lastName", &self.last_name, "Last name");
        let email = rules::email(&mut errors, "email", &self.email);
        let phone = rules::phone(&mut errors, "phone", &self.phone);
        errors.into_result(UserSection {
            first_name,
            last_name,
            email,
            phone,
            auth_provider: Some(AuthProvider::Guest),
            ..Default::default()
        })
    }
}

/// A complete express booking as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressCheckoutCandidate {
    #[serde(default)]
    pub guest: GuestCandidate,
    pub partner_code: Option<String>,
    pub lesson_id: Option<String>,
    #[serde(default)]
    pub booking: BookingCandidate,
    #[serde(default)]
    pub waiver: WaiverCandidate,
    #[serde(default)]
    pub payment: PaymentCandidate,
}

/// Receipt for a paid express booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressConfirmation {
    pub booking_reference: String,
    pub guest_name: Option<String>,
    pub email: Option<String>,
    pub lesson_id: &'static str,
    pub lesson_title: &'static str,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub instructor: String,
    pub participants: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner: Option<Partner>,
    pub amount: Decimal,
    pub payment: String,
    pub transaction_id: String,
}

fn partner_code(errors: &mut FieldErrors, value: &Option<String>) -> Option<Partner> {
    let code = value.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
    let code = code.to_ascii_uppercase();
    if !PARTNER_CODE_RE.is_match(&code) {
        errors.add("partnerCode", "Partner code must be 4-12 letters or digits");
        return None;
    }
    let partner = catalog::partner(&code);
    if partner.is_none() {
        errors.add("partnerCode", "Unknown partner code");
    }
    partner
}

fn lookup_lesson(errors: &mut FieldErrors, value: &Option<String>) -> Option<&'static Lesson> {
    let id = rules::required_text(errors, "lessonId", value, "Lesson")?;
    let lesson = catalog::find(&id);
    if lesson.is_none() {
        errors.add("lessonId", "Unknown lesson");
    }
    lesson
}

/// Runs express bookings against the shared slot and payment providers.
pub struct ExpressCheckout {
    config: Arc<WizardConfig>,
    slots: Arc<dyn SlotProvider>,
    payments: Arc<dyn PaymentProcessor>,
}

impl ExpressCheckout {
    pub fn new(
        config: Arc<WizardConfig>,
        slots: Arc<dyn SlotProvider>,
        payments: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self {
            config,
            slots,
            payments,
        }
    }

    /// Validate every part together, confirm the slot, then charge.
    ///
    /// Field errors from all parts come back at once, prefixed with the
    /// part they belong to (`guest.email`, `payment.cardNumber`, ...).
    pub async fn checkout(&self, candidate: ExpressCheckoutCandidate) -> Result<ExpressConfirmation> {
        let mut ctx = self.config.validation_context(Utc::now().date_naive());
        let mut errors = FieldErrors::new();

        let guest = match candidate.guest.validate(&ctx) {
            Ok(guest) => Some(guest),
            Err(e) => {
                errors.absorb("guest", e);
                None
            }
        };
        ctx.user_full_name = guest.as_ref().and_then(UserSection::display_name);

        let partner = partner_code(&mut errors, &candidate.partner_code);
        let lesson = lookup_lesson(&mut errors, &candidate.lesson_id);

        let selection = candidate
            .booking
            .validate(&ctx)
            .map_err(|e| errors.absorb("booking", e))
            .ok();
        if let (Some(lesson), Some(selection)) = (lesson, &selection) {
            if selection.participants > lesson.max_participants {
                errors.add(
                    "booking.participants",
                    format!("{} takes at most {} participant(s)", lesson.title, lesson.max_participants),
                );
            }
        }

        let waiver = candidate.waiver.validate(&ctx).map_err(|e| errors.absorb("waiver", e)).ok();
        let details = candidate.payment.validate(&ctx).map_err(|e| errors.absorb("payment", e)).ok();

        let (Some(guest), Some(lesson), Some(selection), Some(_waiver), Some(details)) =
            (guest, lesson, selection, waiver, details)
        else {
            return Err(errors.into());
        };
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let slots = {
            let mut tracker = RetryTracker::new(self.config.retry_policy());
            let provider = &self.slots;
            tracker
                .run("express_slot_fetch", |_| provider.available_slots(lesson, selection.date))
                .await?
        };
        let slot = slots
            .into_iter()
            .find(|slot| slot.start == selection.start_time)
            .ok_or_else(|| {
                FieldErrors::single("booking.startTime", "That start time is not available")
            })?;
        if slot.spots_left < selection.participants {
            return Err(FieldErrors::single(
                "booking.participants",
                format!("Only {} spot(s) left at that time", slot.spots_left),
            )
            .into());
        }

        let amount = catalog::price_for(
            lesson,
            selection.participants,
            partner.as_ref().map(|p| p.discount_percent),
        );

        let receipt = {
            let mut tracker = RetryTracker::new(self.config.retry_policy());
            let processor = &self.payments;
            let details = &details;
            tracker
                .run("express_payment", |attempt| processor.charge(details, amount, attempt))
                .await?
        };

        let confirmation = ExpressConfirmation {
            booking_reference: payments::booking_reference(),
            guest_name: guest.display_name(),
            email: guest.email,
            lesson_id: lesson.id,
            lesson_title: lesson.title,
            date: selection.date,
            start_time: selection.start_time,
            instructor: slot.instructor,
            participants: selection.participants,
            partner,
            amount,
            payment: details.masked(),
            transaction_id: receipt.transaction_id,
        };
        info!(
            booking_reference = %confirmation.booking_reference,
            lesson = lesson.id,
            partner = confirmation.partner.as_ref().map_or("none", |p| p.code),
            %amount,
            "Express checkout completed"
        );
        Ok(confirmation)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::lessons::SimulatedSlotProvider;
    use crate::payments::{DECLINED_CARD, SimulatedPaymentProcessor};

    fn checkout() -> ExpressCheckout {
        ExpressCheckout::new(
            Arc::new(WizardConfig::for_tests()),
            Arc::new(SimulatedSlotProvider::new(Duration::ZERO)),
            Arc::new(SimulatedPaymentProcessor::new(Duration::ZERO)),
        )
    }

    async fn open_slot(lesson_id: &str) -> (NaiveDate, NaiveTime) {
        let provider = SimulatedSlotProvider::new(Duration::ZERO);
        let lesson = catalog::find(lesson_id).unwrap();
        for offset in 1..15 {
            let date = Utc::now().date_naive() + chrono::Days::new(offset);
            let slots = provider.available_slots(lesson, date).await.unwrap();
            if let Some(slot) = slots.first() {
                return (date, slot.start);
            }
        }
        panic!("no open slot in two weeks");
    }

    async fn candidate(card_number: &str) -> ExpressCheckoutCandidate {
        let (date, start) = open_slot("surf-intro-group").await;
        ExpressCheckoutCandidate {
            guest: GuestCandidate {
                first_name: Some("Noa".into()),
                last_name: Some("Reyes".into()),
                email: Some("noa@example.com".into()),
                phone: Some("+34 600 123 456".into()),
            },
            partner_code: Some("surfshack".into()),
            lesson_id: Some("surf-intro-group".into()),
            booking: BookingCandidate {
                date: Some(date.format("%Y-%m-%d").to_string()),
                start_time: Some(start.format("%H:%M").to_string()),
                participants: Some(1),
                special_requests: None,
            },
            waiver: WaiverCandidate {
                accepted_terms: Some(true),
                accepted_liability: Some(true),
                accepted_medical: Some(true),
                signature: Some("Noa Reyes".into()),
                medical_conditions: None,
            },
            payment: PaymentCandidate {
                method: Some("card".into()),
                card_number: Some(card_number.into()),
                card_holder: Some("Noa Reyes".into()),
                expiry: Some("10/38".into()),
                cvv: Some("321".into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn partner_booking_gets_discount() {
        let confirmation = checkout().checkout(candidate("4242424242424242").await).await.unwrap();
        assert!(confirmation.booking_reference.starts_with("SURF-"));
        assert_eq!(confirmation.partner.as_ref().map(|p| p.code), Some("SURFSHACK"));
        assert_eq!(confirmation.amount, dec!(58.50));
        assert_eq!(confirmation.guest_name.as_deref(), Some("Noa Reyes"));
    }

    #[tokio::test]
    async fn errors_from_every_part_are_aggregated() {
        let mut c = candidate("4242424242424242").await;
        c.guest.email = Some("not-an-email".into());
        c.partner_code = Some("NOPE1".into());
        c.payment.paypal_email = Some("noa@example.com".into());
        c.waiver.accepted_liability = None;

        let err = checkout().checkout(c).await.unwrap_err();
        let crate::Error::Validation(fields) = err else {
            panic!("expected validation errors");
        };
        assert!(fields.has("guest.email"));
        assert!(fields.has("partnerCode"));
        assert!(fields.has("payment.paypalEmail"));
        assert!(fields.has("waiver.acceptedLiability"));
    }

    #[tokio::test]
    async fn malformed_partner_code_is_rejected() {
        let mut c = candidate("4242424242424242").await;
        c.partner_code = Some("x!".into());
        let err = checkout().checkout(c).await.unwrap_err();
        assert!(matches!(err, crate::Error::Validation(ref f) if f.has("partnerCode")));
    }

    #[tokio::test]
    async fn waiver_must_be_signed_by_guest() {
        let mut c = candidate("4242424242424242").await;
        c.waiver.signature = Some("Someone Else".into());
        let err = checkout().checkout(c).await.unwrap_err();
        assert!(matches!(err, crate::Error::Validation(ref f) if f.has("waiver.signature")));
    }

    #[tokio::test]
    async fn declined_card_surfaces_failure_report() {
        let err = checkout().checkout(candidate(DECLINED_CARD).await).await.unwrap_err();
        assert!(matches!(err, crate::Error::Request(ref r) if !r.retryable));
    }
}
