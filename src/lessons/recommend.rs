//! Rank catalog lessons against a completed assessment.

use serde::Serialize;

use super::catalog::{self, Lesson, LessonFormat};
use crate::onboarding::model::{Assessment, SkillLevel};

/// Score for a lesson whose level range covers the customer.
const LEVEL_MATCH: u32 = 60;
/// Score for a lesson one level above or below the customer.
const LEVEL_ADJACENT: u32 = 30;
const FIRST_TIMER_GROUP: u32 = 15;
const GOAL_MATCH: u32 = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub lesson: &'static Lesson,
    pub score: u32,
    pub reasons: Vec<String>,
}

fn level_distance(lesson: &Lesson, level: SkillLevel) -> u8 {
    let level = level as u8;
    let (min, max) = (lesson.min_level as u8, lesson.max_level as u8);
    if level < min {
        min - level
    } else {
        level.saturating_sub(max)
    }
}

/// Lessons suited to `assessment`, best first.
///
/// Empty until both sport and skill level are known. Lessons that need a
/// stronger swimmer than the customer are never offered.
pub fn recommend(assessment: &Assessment) -> Vec<Recommendation> {
    let (Some(sport), Some(level)) = (assessment.sport, assessment.skill_level) else {
        return Vec::new();
    };
    let swimming = assessment.swimming_ability;
    let goals: Vec<String> = assessment
        .goals
        .iter()
        .flatten()
        .map(|g| g.to_lowercase())
        .collect();

    let mut ranked: Vec<Recommendation> = catalog::all()
        .iter()
        .filter(|lesson| lesson.sport == sport)
        .filter(|lesson| swimming.is_some_and(|s| s >= lesson.min_swimming))
        .filter_map(|lesson| {
            let mut reasons = Vec::new();
            let mut score = match level_distance(lesson, level) {
                0 => {
                    reasons.push(format!("Matches your {level} level"));
                    LEVEL_MATCH
                }
                1 => {
                    reasons.push("Close to your current level".to_string());
                    LEVEL_ADJACENT
                }
                _ => return None,
            };

            if assessment.previous_lessons == Some(false) && lesson.format == LessonFormat::Group {
                score += FIRST_TIMER_GROUP;
                reasons.push("Relaxed group setting for first-timers".to_string());
            }

            for keyword in lesson.focus {
                if goals.iter().any(|g| g.contains(keyword)) {
                    score += GOAL_MATCH;
                    reasons.push(format!("Works on {keyword}"));
                }
            }

            Some(Recommendation {
                lesson,
                score,
                reasons,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.lesson.price_per_person.cmp(&b.lesson.price_per_person))
    });
    ranked
}

/// Whether `lesson_id` is among the lessons offered for `assessment`.
pub fn is_recommended(assessment: &Assessment, lesson_id: &str) -> bool {
    recommend(assessment).iter().any(|r| r.lesson.id == lesson_id)
}
