//! Booking step: date, slot and party size.
//!
//! Slot availability and pricing depend on the lesson catalog and the
//! fetched slots, so those checks happen in the manager after this schema
//! passes.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::rules;
use super::{FieldErrors, Schema, ValidationContext};

pub const MAX_PARTICIPANTS: u8 = 6;
const MAX_REQUESTS_LEN: usize = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCandidate {
    /// `YYYY-MM-DD`.
    pub date: Option<String>,
    /// `HH:MM`.
    pub start_time: Option<String>,
    pub participants: Option<u8>,
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingSelection {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub participants: u8,
    pub special_requests: Option<String>,
}

impl Schema for BookingCandidate {
    type Output = BookingSelection;

    fn validate(&self, ctx: &ValidationContext) -> Result<BookingSelection, FieldErrors> {
        let mut errors = FieldErrors::new();

        let date = rules::date(&mut errors, "date", &self.date, "Lesson date").and_then(|date| {
            let horizon = ctx.today + chrono::Days::new(u64::from(ctx.booking_horizon_days));
            if date < ctx.today {
                errors.add("date", "Lesson date cannot be in the past");
                None
            } else if date > horizon {
                errors.add(
                    "date",
                    format!(
                        "Lessons can be booked at most {} days ahead",
                        ctx.booking_horizon_days
                    ),
                );
                None
            } else {
                Some(date)
            }
        });

        let start_time = rules::time_of_day(&mut errors, "startTime", &self.start_time, "Start time");

        let participants = match self.participants {
            None => {
                errors.add("participants", "Number of participants is required");
                None
            }
            Some(n) => rules::in_range(
                &mut errors,
                "participants",
                Some(n),
                "Participants",
                1,
                MAX_PARTICIPANTS,
            ),
        };

        let special_requests = rules::optional_text(
            &mut errors,
            "specialRequests",
            &self.special_requests,
            "Special requests",
            MAX_REQUESTS_LEN,
        );

        match (date, start_time, participants) {
            (Some(date), Some(start_time), Some(participants)) if errors.is_empty() => {
                Ok(BookingSelection {
                    date,
                    start_time,
                    participants,
                    special_requests,
                })
            }
            _ => Err(errors),
        }
    }
}
