//! Sport and skill assessment step.

use serde::{Deserialize, Serialize};

use super::rules;
use super::{FieldErrors, Schema, ValidationContext};
use crate::onboarding::model::{Assessment, FitnessLevel, SkillLevel, Sport, SwimmingAbility};

const MAX_GOALS: usize = 5;
const MAX_GOAL_LEN: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentCandidate {
    pub sport: Option<String>,
    pub skill_level: Option<String>,
    pub years_experience: Option<u8>,
    pub swimming_ability: Option<String>,
    pub previous_lessons: Option<bool>,
    pub goals: Option<Vec<String>>,
    pub fitness_level: Option<String>,
}

impl Schema for AssessmentCandidate {
    type Output = Assessment;

    fn validate(&self, _ctx: &ValidationContext) -> Result<Assessment, FieldErrors> {
        let mut errors = FieldErrors::new();

        let sport: Option<Sport> =
            rules::choice(&mut errors, "sport", &self.sport, "Sport", "surf, kitesurf");
        let skill_level: Option<SkillLevel> = rules::choice(
            &mut errors,
            "skillLevel",
            &self.skill_level,
            "Skill level",
            "beginner, intermediate, advanced, expert",
        );
        let swimming_ability: Option<SwimmingAbility> = rules::choice(
            &mut errors,
            "swimmingAbility",
            &self.swimming_ability,
            "Swimming ability",
            "none, basic, confident, strong",
        );
        let fitness_level: Option<FitnessLevel> = rules::optional_choice(
            &mut errors,
            "fitnessLevel",
            &self.fitness_level,
            "Fitness level",
            "low, moderate, high",
        );
        let years_experience = rules::in_range(
            &mut errors,
            "yearsExperience",
            self.years_experience,
            "Years of experience",
            0,
            60,
        );

        if let (Some(level), Some(years)) = (skill_level, years_experience) {
            if level >= SkillLevel::Advanced && years == 0 {
                errors.add(
                    "yearsExperience",
                    "Advanced and expert riders need at least one year of experience",
                );
            }
        }

        if sport == Some(Sport::Kitesurf) && swimming_ability == Some(SwimmingAbility::None) {
            errors.add(
                "swimmingAbility",
                "Kitesurfing lessons require at least basic swimming ability",
            );
        }

        let goals = self.goals.as_ref().map(|goals| {
            if goals.len() > MAX_GOALS {
                errors.add("goals", format!("Pick at most {MAX_GOALS} goals"));
            }
            goals
                .iter()
                .enumerate()
                .filter_map(|(i, goal)| {
                    let goal = goal.trim();
                    if goal.is_empty() {
                        errors.add(format!("goals.{i}"), "Goal cannot be empty");
                        None
                    } else if goal.chars().count() > MAX_GOAL_LEN {
                        errors.add(
                            format!("goals.{i}"),
                            format!("Goal must be at most {MAX_GOAL_LEN} characters"),
                        );
                        None
                    } else {
                        Some(goal.to_string())
                    }
                })
                .collect::<Vec<_>>()
        });

        errors.into_result(Assessment {
            sport,
            skill_level,
            years_experience,
            swimming_ability,
            previous_lessons: Some(self.previous_lessons.unwrap_or(false)),
            goals,
            fitness_level,
        })
    }
}
