//! Onboarding and booking wizard for surf and kitesurf lessons.

pub mod config;
pub mod error;
pub mod express;
pub mod lessons;
pub mod onboarding;
pub mod payments;
pub mod retry;
pub mod server;
pub mod validation;

pub use error::{Error, Result};
