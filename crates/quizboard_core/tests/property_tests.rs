//! Property-based tests for quizboard_core.
//!
//! Uses proptest to verify invariants of the pure progression rules for
//! arbitrary games, challenge rows and profiles.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use quizboard_core::{
    default_achievements, level_for_experience, newly_unlocked, next_day_streak, next_progress,
    ChallengeType, DailyChallenge, DisplayInfo, EvaluationContext, GameMode, GameOutcome,
    GameSubmission, UserProfile, CHALLENGE_TEMPLATES,
};

// ============================================================================
// Strategies
// ============================================================================

fn day0() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

/// A valid submission: 1 <= total, score <= total, streak <= score.
fn arb_submission() -> impl Strategy<Value = GameSubmission> {
    (1u32..=50)
        .prop_flat_map(|total| (Just(total), 0..=total))
        .prop_flat_map(|(total, score)| (Just(total), Just(score), 0..=score, 0u32..=900, any::<bool>()))
        .prop_map(|(total, score, streak, time_spent, marathon)| GameSubmission {
            user_id: "prop-user".into(),
            display: DisplayInfo::default(),
            category: "science".into(),
            difficulty: "medium".into(),
            score,
            total,
            time_spent,
            hints_used: 0,
            game_mode: if marathon { GameMode::Marathon } else { GameMode::Normal },
            answer_streak: streak,
            submission_id: None,
        })
}

fn arb_outcome() -> impl Strategy<Value = GameOutcome> {
    arb_submission().prop_map(|s| {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        s.into_outcome(now).expect("strategy produces valid submissions").1
    })
}

fn arb_challenge() -> impl Strategy<Value = DailyChallenge> {
    (0usize..CHALLENGE_TEMPLATES.len(), 0i64..=100).prop_map(|(i, progress)| {
        let t = CHALLENGE_TEMPLATES[i];
        let progress = progress.min(t.target_value);
        DailyChallenge {
            id: 1,
            user_id: "prop-user".into(),
            challenge_date: day0(),
            challenge_type: t.challenge_type,
            target_value: t.target_value,
            current_progress: progress,
            completed: progress >= t.target_value,
            reward_claimed: false,
            created_at: 0,
        }
    })
}

fn arb_profile() -> impl Strategy<Value = UserProfile> {
    (1i64..=200, 1i64..=30, proptest::collection::vec(any::<bool>(), 8)).prop_map(
        |(games, streak, mask)| {
            let unlocked = default_achievements()
                .into_iter()
                .zip(mask)
                .filter(|(_, keep)| *keep)
                .map(|(a, _)| a.id)
                .collect();
            UserProfile {
                user_id: "prop-user".into(),
                username: String::new(),
                first_name: "Player".into(),
                last_name: String::new(),
                total_games: games,
                total_score: 0,
                best_streak: streak,
                current_streak: streak,
                unlocked_achievement_ids: unlocked,
                level: 1,
                experience_points: 0,
                challenge_points: 0,
                last_played_on: Some(day0()),
                version: 0,
                created_at: 0,
                updated_at: 0,
            }
        },
    )
}

// ============================================================================
// Outcome properties
// ============================================================================

proptest! {
    /// Percentage is derived from score/total and stays in [0, 100].
    #[test]
    fn percentage_matches_score_over_total(outcome in arb_outcome()) {
        let expected = 100.0 * outcome.score as f64 / outcome.total as f64;
        prop_assert!((outcome.percentage - expected).abs() < 1e-9);
        prop_assert!(outcome.percentage >= 0.0 && outcome.percentage <= 100.0);
        prop_assert_eq!(outcome.is_perfect(), outcome.percentage == 100.0);
    }

    /// A submission whose score exceeds its total never becomes an outcome.
    #[test]
    fn oversized_score_is_rejected(total in 1u32..100, extra in 1u32..100) {
        let s = GameSubmission {
            user_id: "u".into(),
            display: DisplayInfo::default(),
            category: "c".into(),
            difficulty: "d".into(),
            score: total + extra,
            total,
            time_spent: 0,
            hints_used: 0,
            game_mode: GameMode::Normal,
            answer_streak: 0,
            submission_id: None,
        };
        prop_assert!(s.into_outcome(Utc::now()).is_err());
    }
}

// ============================================================================
// Achievement properties
// ============================================================================

proptest! {
    /// Never re-grants an unlocked id; never reports an id twice.
    #[test]
    fn newly_unlocked_excludes_already_unlocked(
        profile in arb_profile(),
        outcome in arb_outcome(),
        mastered in 0i64..6,
    ) {
        let catalog = default_achievements();
        let ctx = EvaluationContext { profile: &profile, outcome: &outcome, mastered_categories: mastered };
        let fresh = newly_unlocked(&catalog, &ctx);
        let mut seen = std::collections::HashSet::new();
        for a in &fresh {
            prop_assert!(!profile.has_unlocked(&a.id), "re-granted {}", a.id);
            prop_assert!(seen.insert(a.id.clone()), "duplicate {}", a.id);
        }
    }

    /// Evaluating again after applying the result yields nothing new.
    #[test]
    fn evaluation_is_idempotent(
        profile in arb_profile(),
        outcome in arb_outcome(),
        mastered in 0i64..6,
    ) {
        let catalog = default_achievements();
        let ctx = EvaluationContext { profile: &profile, outcome: &outcome, mastered_categories: mastered };
        let fresh: Vec<String> = newly_unlocked(&catalog, &ctx).into_iter().map(|a| a.id.clone()).collect();

        let mut after = profile.clone();
        after.unlocked_achievement_ids.extend(fresh);
        let ctx = EvaluationContext { profile: &after, outcome: &outcome, mastered_categories: mastered };
        prop_assert!(newly_unlocked(&catalog, &ctx).is_empty());
    }
}

// ============================================================================
// Challenge properties
// ============================================================================

proptest! {
    /// Progress never decreases, never exceeds the target, and a completed
    /// row stays completed over any sequence of games.
    #[test]
    fn challenge_progress_is_monotonic(
        challenge in arb_challenge(),
        games in proptest::collection::vec(arb_outcome(), 0..20),
    ) {
        let mut c = challenge;
        for game in &games {
            let before = c.clone();
            if let Some(step) = next_progress(&c, game, 80.0) {
                prop_assert!(step.progress > before.current_progress);
                prop_assert_eq!(step.completed, step.progress >= c.target_value);
                c.current_progress = step.progress;
                c.completed = step.completed;
            }
            prop_assert!(c.current_progress >= before.current_progress);
            prop_assert!(!before.completed || c.completed);
            if c.challenge_type != ChallengeType::GamesCount {
                prop_assert!(c.current_progress <= c.target_value);
            }
        }
    }
}

// ============================================================================
// Streak and level properties
// ============================================================================

proptest! {
    #[test]
    fn day_streak_is_at_least_one(current in 0i64..365, gap in 0i64..10) {
        let today = day0() + chrono::Duration::days(gap);
        let next = next_day_streak(Some(day0()), current, today);
        prop_assert!(next >= 1);
        if gap == 1 {
            prop_assert_eq!(next, current + 1);
        }
    }

    #[test]
    fn level_is_monotonic_in_experience(xp in 0i64..100_000, delta in 0i64..10_000, step in 1i64..1000) {
        prop_assert!(level_for_experience(xp + delta, step) >= level_for_experience(xp, step));
        prop_assert!(level_for_experience(xp, step) >= 1);
    }
}
