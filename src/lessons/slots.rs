//! Time-slot availability lookup.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::Lesson;
use crate::retry::{FailureKind, RequestFailure};

/// One bookable start time for a lesson on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub spots_left: u8,
    pub instructor: String,
}

/// Source of slot availability.
#[async_trait]
pub trait SlotProvider: Send + Sync {
    async fn available_slots(
        &self,
        lesson: &Lesson,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, RequestFailure>;
}

const INSTRUCTORS: [&str; 5] = ["Kai", "Leilani", "Mateo", "Sofia", "Tane"];

/// Lesson starts offered each day, as (hour, minute).
const STARTS: [(u32, u32); 4] = [(8, 0), (10, 30), (13, 0), (15, 30)];

/// Latest time a lesson may finish.
const LAST_FINISH_HOUR: u32 = 18;

/// Deterministic availability with simulated latency.
///
/// The same lesson and date always produce the same slots, so a repeated
/// lookup agrees with the one the customer picked from.
#[derive(Debug, Clone)]
pub struct SimulatedSlotProvider {
    delay: Duration,
}

impl SimulatedSlotProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

fn seed_for(lesson: &Lesson, date: NaiveDate) -> u64 {
    let day = date.num_days_from_ce() as u64;
    lesson
        .id
        .bytes()
        .fold(day, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}

#[async_trait]
impl SlotProvider for SimulatedSlotProvider {
    async fn available_slots(
        &self,
        lesson: &Lesson,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, RequestFailure> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut rng = StdRng::seed_from_u64(seed_for(lesson, date));
        let duration = chrono::Duration::minutes(i64::from(lesson.duration_minutes));
        let mut slots = Vec::new();

        for (hour, minute) in STARTS {
            let start = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
                RequestFailure::new(FailureKind::Unknown, format!("bad start {hour}:{minute}"))
            })?;
            let (end, wrapped) = start.overflowing_add_signed(duration);
            let past_close = end.hour() > LAST_FINISH_HOUR
                || (end.hour() == LAST_FINISH_HOUR && end.minute() > 0);
            if wrapped != 0 || past_close {
                continue;
            }

            let spots_left = rng.gen_range(0..=lesson.max_participants);
            if spots_left == 0 {
                continue;
            }
            let instructor = INSTRUCTORS[rng.gen_range(0..INSTRUCTORS.len())].to_string();
            slots.push(TimeSlot {
                start,
                end,
                spots_left,
                instructor,
            });
        }

        debug!(lesson = lesson.id, %date, count = slots.len(), "Slots generated");
        Ok(slots)
    }
}
