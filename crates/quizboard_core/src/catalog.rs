//! Static configuration: the achievement catalog and the daily challenge
//! templates. Loaded once at startup and never mutated afterwards.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::{
    AchievementDefinition, ChallengeTemplate, ChallengeType, ConditionType, Rarity,
};

struct Seed {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    condition_type: ConditionType,
    condition_value: i64,
    reward_points: i64,
    rarity: Rarity,
}

// Ids are persisted in user profiles; never rename one.
const SEEDS: &[Seed] = &[
    Seed {
        id: "first_game",
        name: "First Steps",
        description: "Finish your first game",
        icon: "🎯",
        condition_type: ConditionType::GamesPlayed,
        condition_value: 1,
        reward_points: 10,
        rarity: Rarity::Common,
    },
    Seed {
        id: "perfectionist",
        name: "Perfectionist",
        description: "Answer every question of a game correctly",
        icon: "💯",
        condition_type: ConditionType::PerfectScore,
        condition_value: 1,
        reward_points: 50,
        rarity: Rarity::Rare,
    },
    Seed {
        id: "scholar",
        name: "Scholar",
        description: "Score 80%+ in three different categories",
        icon: "🎓",
        condition_type: ConditionType::CategoryMaster,
        condition_value: 3,
        reward_points: 100,
        rarity: Rarity::Epic,
    },
    Seed {
        id: "marathoner",
        name: "Marathoner",
        description: "Finish a marathon game",
        icon: "🏃",
        condition_type: ConditionType::MarathonCompleted,
        condition_value: 1,
        reward_points: 75,
        rarity: Rarity::Rare,
    },
    Seed {
        id: "streak_master",
        name: "Streak Master",
        description: "Answer 10 questions in a row correctly",
        icon: "🔥",
        condition_type: ConditionType::AnswerStreak,
        condition_value: 10,
        reward_points: 80,
        rarity: Rarity::Rare,
    },
    Seed {
        id: "speed_demon",
        name: "Speed Demon",
        description: "Finish a game in under 2 minutes",
        icon: "⚡",
        condition_type: ConditionType::SpeedCompletion,
        condition_value: 120,
        reward_points: 60,
        rarity: Rarity::Uncommon,
    },
    Seed {
        id: "dedicated_player",
        name: "Dedicated Player",
        description: "Play 7 days in a row",
        icon: "📅",
        condition_type: ConditionType::DailyStreak,
        condition_value: 7,
        reward_points: 150,
        rarity: Rarity::Epic,
    },
    Seed {
        id: "knowledge_seeker",
        name: "Knowledge Seeker",
        description: "Play 100 games",
        icon: "📚",
        condition_type: ConditionType::GamesPlayed,
        condition_value: 100,
        reward_points: 200,
        rarity: Rarity::Legendary,
    },
];

/// The built-in achievement catalog, in seed order.
pub fn default_achievements() -> Vec<AchievementDefinition> {
    SEEDS
        .iter()
        .map(|s| AchievementDefinition {
            id: s.id.to_string(),
            name: s.name.to_string(),
            description: s.description.to_string(),
            icon: s.icon.to_string(),
            condition_type: s.condition_type,
            condition_value: s.condition_value,
            reward_points: s.reward_points,
            rarity: s.rarity,
        })
        .collect()
}

pub const CHALLENGE_TEMPLATES: [ChallengeTemplate; 3] = [
    ChallengeTemplate {
        challenge_type: ChallengeType::GamesCount,
        target_value: 3,
    },
    ChallengeTemplate {
        challenge_type: ChallengeType::CategoryMaster,
        target_value: 80,
    },
    ChallengeTemplate {
        challenge_type: ChallengeType::PerfectAnswers,
        target_value: 5,
    },
];

/// Uniform pick among [`CHALLENGE_TEMPLATES`].
pub fn pick_template<R: Rng + ?Sized>(rng: &mut R) -> ChallengeTemplate {
    *CHALLENGE_TEMPLATES
        .choose(rng)
        .unwrap_or(&CHALLENGE_TEMPLATES[0])
}

pub fn describe_challenge(challenge_type: ChallengeType, target_value: i64) -> String {
    match challenge_type {
        ChallengeType::GamesCount => format!("Play {} games today", target_value),
        ChallengeType::CategoryMaster => "Score 80%+ in any category".to_string(),
        ChallengeType::PerfectAnswers => {
            format!("Answer {} questions correctly", target_value)
        }
    }
}
