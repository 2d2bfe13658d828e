//! Step access policy and progress indicators.
//!
//! A step is reachable when it is the first step, when it is at or before
//! the current step, or when the step right before it has been completed.
//! Forward progress is therefore gated by completion while backward
//! navigation to anything already visited stays free.

use std::collections::BTreeSet;

use serde::Serialize;

use super::step::Step;

/// Whether `step` is reachable from `current` given the completed set.
pub fn can_access_step(step: Step, current: Step, completed: &BTreeSet<Step>) -> bool {
    if step == Step::FIRST || step.position() <= current.position() {
        return true;
    }
    step.previous()
        .is_some_and(|prev| completed.contains(&prev))
}

/// Where a navigation request for `requested` actually lands.
///
/// Returns `requested` when it is reachable, otherwise the furthest
/// reachable step before it. The first step is always reachable, so this
/// never fails.
pub fn nearest_accessible(requested: Step, current: Step, completed: &BTreeSet<Step>) -> Step {
    Step::ORDER[..=requested.position()]
        .iter()
        .rev()
        .copied()
        .find(|step| can_access_step(*step, current, completed))
        .unwrap_or(Step::FIRST)
}

/// Display status of a single step indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorStatus {
    Completed,
    Current,
    Available,
    Locked,
}

/// One entry of the navigation shell's step list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepIndicator {
    pub step: Step,
    pub label: &'static str,
    pub position: usize,
    pub status: IndicatorStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub steps: Vec<StepIndicator>,
    pub completed_count: usize,
    pub total: usize,
    /// Whole-number percentage of completed steps.
    pub percent: u8,
}

/// Build the indicator list for the navigation shell.
pub fn progress(current: Step, completed: &BTreeSet<Step>) -> Progress {
    let steps: Vec<StepIndicator> = Step::ORDER
        .iter()
        .map(|&step| {
            let status = if step == current {
                IndicatorStatus::Current
            } else if completed.contains(&step) {
                IndicatorStatus::Completed
            } else if can_access_step(step, current, completed) {
                IndicatorStatus::Available
            } else {
                IndicatorStatus::Locked
            };
            StepIndicator {
                step,
                label: step.label(),
                position: step.position() + 1,
                status,
            }
        })
        .collect();

    let total = Step::ORDER.len();
    let completed_count = completed.len();
    let percent = ((completed_count * 100) / total) as u8;

    Progress {
        steps,
        completed_count,
        total,
        percent,
    }
}
