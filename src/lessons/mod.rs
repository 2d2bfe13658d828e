//! Lesson catalog, recommendations and slot availability.

pub mod catalog;
pub mod recommend;
pub mod slots;

pub use catalog::{Lesson, LessonFormat, Partner};
pub use recommend::{Recommendation, recommend};
pub use slots::{SimulatedSlotProvider, SlotProvider, TimeSlot};
