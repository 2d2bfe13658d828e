//! Payment step: discriminated validation keyed by the `method` tag.
//!
//! The candidate is a flat form. Validation dispatches on `method` into
//! [`PaymentDetails`], where each variant carries only its own fields.
//! Fields that belong to a different method are rejected rather than
//! ignored, so a card payment carrying a PayPal email fails.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::rules;
use super::{FieldErrors, Schema, ValidationContext};
use crate::onboarding::model::PaymentMethod;

static IBAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z0-9]{11,30}$").expect("iban regex"));

static EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/([0-9]{2})$").expect("expiry regex"));

/// Flat payment form as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCandidate {
    pub method: Option<String>,
    // card
    pub card_number: Option<String>,
    pub card_holder: Option<String>,
    /// `MM/YY`.
    pub expiry: Option<String>,
    pub cvv: Option<String>,
    // paypal
    pub paypal_email: Option<String>,
    // bank transfer
    pub account_holder: Option<String>,
    pub iban: Option<String>,
    pub account_number: Option<String>,
    pub routing_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Other,
}

impl CardBrand {
    pub fn detect(digits: &str) -> Self {
        let prefix2: u32 = digits.get(..2).and_then(|p| p.parse().ok()).unwrap_or(0);
        let prefix4: u32 = digits.get(..4).and_then(|p| p.parse().ok()).unwrap_or(0);
        if digits.starts_with('4') {
            Self::Visa
        } else if (51..=55).contains(&prefix2) || (2221..=2720).contains(&prefix4) {
            Self::Mastercard
        } else if prefix2 == 34 || prefix2 == 37 {
            Self::Amex
        } else {
            Self::Other
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Visa => "Visa",
            Self::Mastercard => "Mastercard",
            Self::Amex => "Amex",
            Self::Other => "Card",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDetails {
    /// Digits only.
    pub number: String,
    pub brand: CardBrand,
    pub holder: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankAccount {
    Iban(String),
    Domestic {
        account_number: String,
        routing_number: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankDetails {
    pub account_holder: String,
    pub account: BankAccount,
}

/// Validated payment details, one variant per method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentDetails {
    Card(CardDetails),
    Paypal { email: String },
    BankTransfer(BankDetails),
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::Card(_) => PaymentMethod::Card,
            Self::Paypal { .. } => PaymentMethod::Paypal,
            Self::BankTransfer(_) => PaymentMethod::BankTransfer,
        }
    }

    /// Display form that never exposes a full number or address.
    pub fn masked(&self) -> String {
        match self {
            Self::Card(card) => {
                let last4 = &card.number[card.number.len().saturating_sub(4)..];
                format!("{} •••• {last4}", card.brand.label())
            }
            Self::Paypal { email } => {
                let (local, domain) = email.split_once('@').unwrap_or((email.as_str(), ""));
                let first = local.chars().next().unwrap_or('*');
                format!("PayPal {first}***@{domain}")
            }
            Self::BankTransfer(bank) => {
                let tail = match &bank.account {
                    BankAccount::Iban(iban) => &iban[iban.len().saturating_sub(4)..],
                    BankAccount::Domestic { account_number, .. } => {
                        &account_number[account_number.len().saturating_sub(4)..]
                    }
                };
                format!("Bank transfer •••• {tail}")
            }
        }
    }
}

/// Luhn checksum over an all-digit string.
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    !digits.is_empty() && sum % 10 == 0
}

/// ISO 13616 mod-97 check on a compact, upper-cased IBAN.
pub fn iban_valid(iban: &str) -> bool {
    if !IBAN_RE.is_match(iban) {
        return false;
    }
    let rearranged = iban[4..].chars().chain(iban[..4].chars());
    let mut remainder: u32 = 0;
    for c in rearranged {
        let value = match c.to_digit(36) {
            Some(v) => v,
            None => return false,
        };
        // Letters expand to two digits (A = 10 .. Z = 35).
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    remainder == 1
}

fn compact(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl PaymentCandidate {
    fn reject_foreign_fields(&self, method: PaymentMethod, errors: &mut FieldErrors) {
        let fields: [(&str, &Option<String>, PaymentMethod); 9] = [
            ("cardNumber", &self.card_number, PaymentMethod::Card),
            ("cardHolder", &self.card_holder, PaymentMethod::Card),
            ("expiry", &self.expiry, PaymentMethod::Card),
            ("cvv", &self.cvv, PaymentMethod::Card),
            ("paypalEmail", &self.paypal_email, PaymentMethod::Paypal),
            ("accountHolder", &self.account_holder, PaymentMethod::BankTransfer),
            ("iban", &self.iban, PaymentMethod::BankTransfer),
            ("accountNumber", &self.account_number, PaymentMethod::BankTransfer),
            ("routingNumber", &self.routing_number, PaymentMethod::BankTransfer),
        ];
        for (path, value, owner) in fields {
            if owner != method && present(value) {
                errors.add(path, format!("Not used for {method} payments"));
            }
        }
    }

    fn validate_card(&self, today: NaiveDate, errors: &mut FieldErrors) -> Option<CardDetails> {
        let number = rules::required_text(errors, "cardNumber", &self.card_number, "Card number")
            .map(|n| compact(&n))
            .and_then(|n| {
                if !n.chars().all(|c| c.is_ascii_digit()) || !(13..=19).contains(&n.len()) {
                    errors.add("cardNumber", "Card number must be 13 to 19 digits");
                    None
                } else if !luhn_valid(&n) {
                    errors.add("cardNumber", "Card number is invalid");
                    None
                } else {
                    Some(n)
                }
            });
        let holder = rules::person_name(errors, "cardHolder", &self.card_holder, "Cardholder name");

        let expiry = rules::required_text(errors, "expiry", &self.expiry, "Expiry date").and_then(|raw| {
            let Some(caps) = EXPIRY_RE.captures(&raw) else {
                errors.add("expiry", "Expiry must look like MM/YY");
                return None;
            };
            let month: u32 = caps[1].parse().ok()?;
            let year: i32 = 2000 + caps[2].parse::<i32>().ok()?;
            if (year, month) < (today.year(), today.month()) {
                errors.add("expiry", "Card has expired");
                return None;
            }
            Some((month, year))
        });

        let brand = number.as_deref().map(CardBrand::detect);
        let cvv_len = if brand == Some(CardBrand::Amex) { 4 } else { 3 };
        match self.cvv.as_deref().map(str::trim) {
            None | Some("") => errors.add("cvv", "Security code is required"),
            Some(cvv) if cvv.len() != cvv_len || !cvv.chars().all(|c| c.is_ascii_digit()) => {
                errors.add("cvv", format!("Security code must be {cvv_len} digits"))
            }
            _ => {}
        }

        let (number, holder, (expiry_month, expiry_year)) = (number?, holder?, expiry?);
        Some(CardDetails {
            brand: CardBrand::detect(&number),
            number,
            holder,
            expiry_month,
            expiry_year,
        })
    }

    fn validate_bank(&self, errors: &mut FieldErrors) -> Option<BankDetails> {
        let account_holder =
            rules::person_name(errors, "accountHolder", &self.account_holder, "Account holder");

        let has_iban = present(&self.iban);
        let has_account = present(&self.account_number);
        let has_routing = present(&self.routing_number);

        let account = if has_iban {
            let iban = compact(self.iban.as_deref().unwrap_or_default()).to_uppercase();
            if iban_valid(&iban) {
                Some(BankAccount::Iban(iban))
            } else {
                errors.add("iban", "IBAN is invalid");
                None
            }
        } else if has_account || has_routing {
            let account_number = compact(self.account_number.as_deref().unwrap_or_default());
            let routing_number = compact(self.routing_number.as_deref().unwrap_or_default());
            let mut ok = true;
            if !has_account {
                errors.add("accountNumber", "Account number is required with a routing number");
                ok = false;
            } else if !(4..=17).contains(&account_number.len())
                || !account_number.chars().all(|c| c.is_ascii_digit())
            {
                errors.add("accountNumber", "Account number must be 4 to 17 digits");
                ok = false;
            }
            if !has_routing {
                errors.add("routingNumber", "Routing number is required with an account number");
                ok = false;
            } else if routing_number.len() != 9 || !routing_number.chars().all(|c| c.is_ascii_digit()) {
                errors.add("routingNumber", "Routing number must be 9 digits");
                ok = false;
            }
            ok.then_some(BankAccount::Domestic {
                account_number,
                routing_number,
            })
        } else {
            errors.add("iban", "Provide an IBAN or an account and routing number");
            None
        };

        Some(BankDetails {
            account_holder: account_holder?,
            account: account?,
        })
    }
}

impl Schema for PaymentCandidate {
    type Output = PaymentDetails;

    fn validate(&self, ctx: &ValidationContext) -> Result<PaymentDetails, FieldErrors> {
        let mut errors = FieldErrors::new();
        let Some(method) = rules::choice::<PaymentMethod>(
            &mut errors,
            "method",
            &self.method,
            "Payment method",
            "card, paypal, bank_transfer",
        ) else {
            return Err(errors);
        };

        self.reject_foreign_fields(method, &mut errors);

        let details = match method {
            PaymentMethod::Card => self.validate_card(ctx.today, &mut errors).map(PaymentDetails::Card),
            PaymentMethod::Paypal => rules::email(&mut errors, "paypalEmail", &self.paypal_email)
                .map(|email| PaymentDetails::Paypal { email }),
            PaymentMethod::BankTransfer => self.validate_bank(&mut errors).map(PaymentDetails::BankTransfer),
        };

        match details {
            Some(details) if errors.is_empty() => Ok(details),
            _ => Err(errors),
        }
    }
}
