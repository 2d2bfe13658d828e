//! Lesson catalog, partner discounts and pricing.

use std::sync::LazyLock;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::onboarding::model::{SkillLevel, Sport, SwimmingAbility};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonFormat {
    Group,
    SemiPrivate,
    Private,
}

/// A bookable lesson offering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: &'static str,
    pub title: &'static str,
    pub sport: Sport,
    pub min_level: SkillLevel,
    pub max_level: SkillLevel,
    pub format: LessonFormat,
    pub duration_minutes: u16,
    pub price_per_person: Decimal,
    pub max_participants: u8,
    pub min_swimming: SwimmingAbility,
    pub location: &'static str,
    /// Keywords matched against assessment goals.
    #[serde(skip)]
    pub focus: &'static [&'static str],
}

impl Lesson {
    pub fn suits_level(&self, level: SkillLevel) -> bool {
        (self.min_level..=self.max_level).contains(&level)
    }
}

static CATALOG: LazyLock<Vec<Lesson>> = LazyLock::new(|| {
    vec![
        Lesson {
            id: "surf-intro-group",
            title: "Learn to Surf (Group)",
            sport: Sport::Surf,
            min_level: SkillLevel::Beginner,
            max_level: SkillLevel::Beginner,
            format: LessonFormat::Group,
            duration_minutes: 120,
            price_per_person: dec!(65),
            max_participants: 6,
            min_swimming: SwimmingAbility::Basic,
            location: "Main Beach",
            focus: &["stand", "pop up", "first wave", "basics", "fun"],
        },
        Lesson {
            id: "surf-private-foundations",
            title: "Private Surf Foundations",
            sport: Sport::Surf,
            min_level: SkillLevel::Beginner,
            max_level: SkillLevel::Intermediate,
            format: LessonFormat::Private,
            duration_minutes: 90,
            price_per_person: dec!(120),
            max_participants: 2,
            min_swimming: SwimmingAbility::Basic,
            location: "Main Beach",
            focus: &["confidence", "stand", "technique", "one-on-one"],
        },
        Lesson {
            id: "surf-improver-group",
            title: "Green Wave Improver",
            sport: Sport::Surf,
            min_level: SkillLevel::Intermediate,
            max_level: SkillLevel::Intermediate,
            format: LessonFormat::Group,
            duration_minutes: 120,
            price_per_person: dec!(75),
            max_participants: 6,
            min_swimming: SwimmingAbility::Confident,
            location: "Point Break",
            focus: &["green waves", "trim", "paddle", "turn"],
        },
        Lesson {
            id: "surf-video-analysis",
            title: "Video Analysis Session",
            sport: Sport::Surf,
            min_level: SkillLevel::Intermediate,
            max_level: SkillLevel::Expert,
            format: LessonFormat::SemiPrivate,
            duration_minutes: 150,
            price_per_person: dec!(110),
            max_participants: 4,
            min_swimming: SwimmingAbility::Confident,
            location: "Point Break",
            focus: &["video", "style", "turn", "technique"],
        },
        Lesson {
            id: "surf-reef-coaching",
            title: "Reef Break Performance Coaching",
            sport: Sport::Surf,
            min_level: SkillLevel::Advanced,
            max_level: SkillLevel::Expert,
            format: LessonFormat::Private,
            duration_minutes: 120,
            price_per_person: dec!(150),
            max_participants: 2,
            min_swimming: SwimmingAbility::Strong,
            location: "Outer Reef",
            focus: &["barrel", "reef", "big waves", "performance"],
        },
        Lesson {
            id: "kite-discovery",
            title: "Kite Discovery",
            sport: Sport::Kitesurf,
            min_level: SkillLevel::Beginner,
            max_level: SkillLevel::Beginner,
            format: LessonFormat::SemiPrivate,
            duration_minutes: 180,
            price_per_person: dec!(180),
            max_participants: 2,
            min_swimming: SwimmingAbility::Basic,
            location: "Flat Water Lagoon",
            focus: &["kite control", "safety", "body drag", "basics"],
        },
        Lesson {
            id: "kite-waterstart",
            title: "Waterstart Private",
            sport: Sport::Kitesurf,
            min_level: SkillLevel::Beginner,
            max_level: SkillLevel::Intermediate,
            format: LessonFormat::Private,
            duration_minutes: 120,
            price_per_person: dec!(160),
            max_participants: 1,
            min_swimming: SwimmingAbility::Confident,
            location: "Flat Water Lagoon",
            focus: &["waterstart", "board", "ride", "upwind"],
        },
        Lesson {
            id: "kite-freeride",
            title: "Freeride Coaching",
            sport: Sport::Kitesurf,
            min_level: SkillLevel::Intermediate,
            max_level: SkillLevel::Advanced,
            format: LessonFormat::Private,
            duration_minutes: 120,
            price_per_person: dec!(170),
            max_participants: 2,
            min_swimming: SwimmingAbility::Confident,
            location: "North Shore Spot",
            focus: &["upwind", "transition", "carve", "waves"],
        },
        Lesson {
            id: "kite-jump-clinic",
            title: "Jump Clinic",
            sport: Sport::Kitesurf,
            min_level: SkillLevel::Advanced,
            max_level: SkillLevel::Expert,
            format: LessonFormat::Group,
            duration_minutes: 150,
            price_per_person: dec!(140),
            max_participants: 4,
            min_swimming: SwimmingAbility::Strong,
            location: "North Shore Spot",
            focus: &["jump", "air", "kiteloop", "tricks"],
        },
    ]
});

/// Every lesson on offer.
pub fn all() -> &'static [Lesson] {
    &CATALOG
}

pub fn find(id: &str) -> Option<&'static Lesson> {
    CATALOG.iter().find(|l| l.id == id)
}

/// Partners with an express-checkout discount, as (code, name, percent off).
const PARTNERS: [(&str, &str, Decimal); 3] = [
    ("SURFSHACK", "Surf Shack Hostel", dec!(10)),
    ("KITEHOUSE", "Kite House Resort", dec!(15)),
    ("BEACHCAMP", "Beach Camp Tours", dec!(5)),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub code: &'static str,
    pub name: &'static str,
    pub discount_percent: Decimal,
}

pub fn partner(code: &str) -> Option<Partner> {
    PARTNERS
        .iter()
        .find(|(c, _, _)| c.eq_ignore_ascii_case(code))
        .map(|&(code, name, discount_percent)| Partner {
            code,
            name,
            discount_percent,
        })
}

/// Group lessons of three or more get this much off.
const GROUP_DISCOUNT_PERCENT: Decimal = dec!(10);

/// Total for `participants`, with the group discount and an optional
/// partner discount applied, rounded to cents.
pub fn price_for(lesson: &Lesson, participants: u8, partner_discount: Option<Decimal>) -> Decimal {
    let mut total = lesson.price_per_person * Decimal::from(participants);
    if lesson.format == LessonFormat::Group && participants >= 3 {
        total -= total * GROUP_DISCOUNT_PERCENT / dec!(100);
    }
    if let Some(percent) = partner_discount {
        total -= total * percent / dec!(100);
    }
    total.round_dp(2)
}
