//! Pure progression rules.
//!
//! Achievement conditions are dispatched through a function table keyed by
//! [`ConditionType`]: adding a variant without an evaluator fails to compile.
//! Challenge progress, streak and level arithmetic live here too so that the
//! store only has to load rows, call these, and write back.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::model::{
    AchievementDefinition, ChallengeType, ConditionType, DailyChallenge, GameMode, GameOutcome,
    UserProfile,
};

// ============================================================================
// Achievement conditions
// ============================================================================

/// Post-submission snapshot an achievement condition is checked against.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Profile after the outcome was recorded.
    pub profile: &'a UserProfile,
    pub outcome: &'a GameOutcome,
    /// Distinct categories with any game at or above the mastery percentage.
    pub mastered_categories: i64,
}

/// Condition check: `(context, condition_value) -> satisfied`.
pub type ConditionFn = fn(&EvaluationContext<'_>, i64) -> bool;

fn games_played(ctx: &EvaluationContext<'_>, value: i64) -> bool {
    ctx.profile.total_games >= value
}

fn perfect_score(ctx: &EvaluationContext<'_>, _value: i64) -> bool {
    ctx.outcome.is_perfect()
}

fn category_master(ctx: &EvaluationContext<'_>, value: i64) -> bool {
    ctx.mastered_categories >= value
}

fn marathon_completed(ctx: &EvaluationContext<'_>, _value: i64) -> bool {
    ctx.outcome.game_mode == GameMode::Marathon
}

fn answer_streak(ctx: &EvaluationContext<'_>, value: i64) -> bool {
    ctx.outcome.answer_streak >= value
}

// Ceiling, not floor: faster is better.
fn speed_completion(ctx: &EvaluationContext<'_>, value: i64) -> bool {
    ctx.outcome.time_spent <= value
}

fn daily_streak(ctx: &EvaluationContext<'_>, value: i64) -> bool {
    ctx.profile.current_streak >= value
}

impl ConditionType {
    pub fn evaluator(self) -> ConditionFn {
        match self {
            ConditionType::GamesPlayed => games_played,
            ConditionType::PerfectScore => perfect_score,
            ConditionType::CategoryMaster => category_master,
            ConditionType::MarathonCompleted => marathon_completed,
            ConditionType::AnswerStreak => answer_streak,
            ConditionType::SpeedCompletion => speed_completion,
            ConditionType::DailyStreak => daily_streak,
        }
    }

    /// Whether evaluating this condition needs a scan of the user's history.
    pub fn needs_history(self) -> bool {
        matches!(self, ConditionType::CategoryMaster)
    }
}

/// Catalog entries not yet unlocked whose condition holds, in catalog order.
pub fn newly_unlocked<'c>(
    catalog: &'c [AchievementDefinition],
    ctx: &EvaluationContext<'_>,
) -> Vec<&'c AchievementDefinition> {
    let unlocked: HashSet<&str> = ctx
        .profile
        .unlocked_achievement_ids
        .iter()
        .map(String::as_str)
        .collect();

    catalog
        .iter()
        .filter(|a| !unlocked.contains(a.id.as_str()))
        .filter(|a| (a.condition_type.evaluator())(ctx, a.condition_value))
        .collect()
}

// ============================================================================
// Daily challenge progress
// ============================================================================

/// Progress a challenge row should move to after one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressStep {
    pub progress: i64,
    pub completed: bool,
}

/// Next state of `challenge` after `outcome`, or `None` when the game does
/// not apply or the row is already completed.
pub fn next_progress(
    challenge: &DailyChallenge,
    outcome: &GameOutcome,
    mastery_percentage: f64,
) -> Option<ProgressStep> {
    if challenge.completed {
        return None;
    }
    let current = challenge.current_progress;
    let target = challenge.target_value;

    let progress = match challenge.challenge_type {
        ChallengeType::GamesCount => current + 1,
        ChallengeType::CategoryMaster if outcome.reaches(mastery_percentage) => {
            current.max(target)
        }
        ChallengeType::PerfectAnswers if outcome.is_perfect() => {
            (current + outcome.total).min(target).max(current)
        }
        _ => return None,
    };

    if progress == current {
        return None;
    }
    Some(ProgressStep {
        progress,
        completed: progress >= target,
    })
}

// ============================================================================
// Streaks and levels
// ============================================================================

/// Consecutive-day streak after playing on `today`.
pub fn next_day_streak(last_played_on: Option<NaiveDate>, current: i64, today: NaiveDate) -> i64 {
    match last_played_on {
        None => 1,
        Some(last) if last >= today => current.max(1),
        Some(last) if last.succ_opt() == Some(today) => current + 1,
        Some(_) => 1,
    }
}

pub fn level_for_experience(experience_points: i64, xp_per_level: i64) -> i64 {
    1 + experience_points.max(0) / xp_per_level.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_achievements;
    use crate::model::percentage;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn profile(total_games: i64) -> UserProfile {
        UserProfile {
            user_id: "u1".into(),
            username: String::new(),
            first_name: "Player".into(),
            last_name: String::new(),
            total_games,
            total_score: 0,
            best_streak: 1,
            current_streak: 1,
            unlocked_achievement_ids: vec![],
            level: 1,
            experience_points: 0,
            challenge_points: 0,
            last_played_on: Some(day(1)),
            version: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn outcome(score: i64, total: i64) -> GameOutcome {
        GameOutcome {
            id: 1,
            user_id: "u1".into(),
            category: "science".into(),
            difficulty: "easy".into(),
            score,
            total,
            percentage: percentage(score, total),
            time_spent: 300,
            hints_used: 0,
            game_mode: GameMode::Normal,
            answer_streak: 0,
            submission_id: None,
            played_on: day(1),
            created_at: 0,
        }
    }

    fn challenge(kind: ChallengeType, target: i64, progress: i64) -> DailyChallenge {
        DailyChallenge {
            id: 1,
            user_id: "u1".into(),
            challenge_date: day(1),
            challenge_type: kind,
            target_value: target,
            current_progress: progress,
            completed: progress >= target,
            reward_claimed: false,
            created_at: 0,
        }
    }

    fn unlocked_ids(p: &UserProfile, o: &GameOutcome, mastered: i64) -> Vec<String> {
        let catalog = default_achievements();
        let ctx = EvaluationContext {
            profile: p,
            outcome: o,
            mastered_categories: mastered,
        };
        newly_unlocked(&catalog, &ctx)
            .into_iter()
            .map(|a| a.id.clone())
            .collect()
    }

    #[test]
    fn test_first_perfect_game_unlocks_first_game_and_perfectionist() {
        let ids = unlocked_ids(&profile(1), &outcome(10, 10), 1);
        assert_eq!(ids, vec!["first_game", "perfectionist"]);
    }

    #[test]
    fn test_already_unlocked_is_skipped() {
        let mut p = profile(2);
        p.unlocked_achievement_ids = vec!["first_game".into(), "perfectionist".into()];
        assert!(unlocked_ids(&p, &outcome(10, 10), 1).is_empty());
    }

    #[test]
    fn test_category_master_threshold() {
        assert!(!unlocked_ids(&profile(2), &outcome(8, 10), 2).contains(&"scholar".to_string()));
        assert!(unlocked_ids(&profile(3), &outcome(8, 10), 3).contains(&"scholar".to_string()));
    }

    #[test]
    fn test_speed_completion_is_a_ceiling() {
        let mut o = outcome(5, 10);
        o.time_spent = 120;
        assert!(unlocked_ids(&profile(1), &o, 0).contains(&"speed_demon".to_string()));
        o.time_spent = 121;
        assert!(!unlocked_ids(&profile(1), &o, 0).contains(&"speed_demon".to_string()));
    }

    #[test]
    fn test_marathon_and_streak_conditions() {
        let mut o = outcome(10, 12);
        o.game_mode = GameMode::Marathon;
        o.answer_streak = 10;
        let mut p = profile(1);
        p.current_streak = 7;
        let ids = unlocked_ids(&p, &o, 0);
        assert!(ids.contains(&"marathoner".to_string()));
        assert!(ids.contains(&"streak_master".to_string()));
        assert!(ids.contains(&"dedicated_player".to_string()));
    }

    #[test]
    fn test_games_count_progress() {
        let c = challenge(ChallengeType::GamesCount, 3, 2);
        let step = next_progress(&c, &outcome(0, 10), 80.0).unwrap();
        assert_eq!(step, ProgressStep { progress: 3, completed: true });
    }

    #[test]
    fn test_category_master_challenge_jumps_to_target() {
        let c = challenge(ChallengeType::CategoryMaster, 80, 0);
        assert_eq!(next_progress(&c, &outcome(7, 10), 80.0), None);
        let step = next_progress(&c, &outcome(8, 10), 80.0).unwrap();
        assert_eq!(step, ProgressStep { progress: 80, completed: true });
    }

    #[test]
    fn test_perfect_answers_caps_at_target() {
        let c = challenge(ChallengeType::PerfectAnswers, 5, 0);
        assert_eq!(next_progress(&c, &outcome(9, 10), 80.0), None);
        let step = next_progress(&c, &outcome(3, 3), 80.0).unwrap();
        assert_eq!(step, ProgressStep { progress: 3, completed: false });
        let c = challenge(ChallengeType::PerfectAnswers, 5, 3);
        let step = next_progress(&c, &outcome(10, 10), 80.0).unwrap();
        assert_eq!(step, ProgressStep { progress: 5, completed: true });
    }

    #[test]
    fn test_completed_challenge_is_terminal() {
        let c = challenge(ChallengeType::GamesCount, 3, 3);
        assert_eq!(next_progress(&c, &outcome(10, 10), 80.0), None);
    }

    #[test]
    fn test_next_day_streak() {
        assert_eq!(next_day_streak(None, 0, day(3)), 1);
        assert_eq!(next_day_streak(Some(day(3)), 4, day(3)), 4);
        assert_eq!(next_day_streak(Some(day(2)), 4, day(3)), 5);
        assert_eq!(next_day_streak(Some(day(1)), 4, day(3)), 1);
    }

    #[test]
    fn test_level_for_experience() {
        assert_eq!(level_for_experience(0, 100), 1);
        assert_eq!(level_for_experience(99, 100), 1);
        assert_eq!(level_for_experience(260, 100), 3);
        assert_eq!(level_for_experience(50, 0), 51);
    }
}
