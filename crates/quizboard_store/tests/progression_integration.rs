//! Integration tests for ProgressionEngine
//!
//! Uses tempfile::TempDir for isolated SQLite databases. Two engines opened
//! on the same file stand in for two server processes.

use chrono::{TimeZone, Utc};
use quizboard_core::{
    ClaimOutcome, Clock, DisplayInfo, FixedClock, GameMode, GameSubmission, ProgressionConfig,
};
use quizboard_store::{ProgressionEngine, SqliteStore};
use std::collections::HashSet;
use std::sync::Arc;

async fn open_engine(dir: &tempfile::TempDir, clock: Arc<FixedClock>) -> Arc<ProgressionEngine> {
    let db_path = dir.path().join("quiz.db");
    let db = Arc::new(SqliteStore::new(db_path.to_str().unwrap()).await.unwrap());
    Arc::new(
        ProgressionEngine::with_clock(db, ProgressionConfig::default(), clock)
            .await
            .unwrap(),
    )
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 9, 2, 8, 30, 0).unwrap()))
}

fn game(user: &str, score: u32, total: u32) -> GameSubmission {
    GameSubmission {
        user_id: user.into(),
        display: DisplayInfo::default(),
        category: "science".into(),
        difficulty: "hard".into(),
        score,
        total,
        time_spent: 200,
        hints_used: 1,
        game_mode: GameMode::Normal,
        answer_streak: 0,
        submission_id: None,
    }
}

/// Test 1: Concurrent same-user submissions don't lose increments
#[tokio::test]
async fn test_concurrent_submissions_same_user() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = open_engine(&dir, clock()).await;

    let mut handles = Vec::new();
    for i in 0..20u32 {
        let e = engine.clone();
        handles.push(tokio::spawn(async move {
            e.submit_game(game("racer", i % 11, 10)).await
        }));
    }
    let mut unlocked = Vec::new();
    for h in handles {
        let receipt = h.await.unwrap().unwrap();
        assert!(!receipt.degraded, "warnings: {:?}", receipt.warnings);
        unlocked.extend(receipt.new_achievements.into_iter().map(|a| a.id));
    }

    let profile = engine.store().fetch_profile("racer").await.unwrap().unwrap();
    assert_eq!(profile.total_games, 20);
    assert_eq!(engine.store().count_outcomes("racer").await.unwrap(), 20);
    assert_eq!(unlocked.iter().filter(|id| *id == "first_game").count(), 1);

    let ids: HashSet<_> = profile.unlocked_achievement_ids.iter().collect();
    assert_eq!(ids.len(), profile.unlocked_achievement_ids.len());
}

/// Test 2: Two engines on one database keep counters and unlocks consistent
#[tokio::test]
async fn test_two_engines_share_one_database() {
    let dir = tempfile::TempDir::new().unwrap();
    let clock = clock();
    let a = open_engine(&dir, clock.clone()).await;
    let b = open_engine(&dir, clock.clone()).await;

    let mut handles = Vec::new();
    for i in 0..10u32 {
        let e = if i % 2 == 0 { a.clone() } else { b.clone() };
        handles.push(tokio::spawn(async move { e.submit_game(game("shared", 10, 10)).await }));
    }
    let mut perfectionist_grants = 0;
    for h in handles {
        let receipt = h.await.unwrap().unwrap();
        perfectionist_grants += receipt
            .new_achievements
            .iter()
            .filter(|x| x.id == "perfectionist")
            .count();
    }
    assert_eq!(perfectionist_grants, 1);

    let profile = b.store().fetch_profile("shared").await.unwrap().unwrap();
    assert_eq!(profile.total_games, 10);
    assert_eq!(profile.total_score, 100);
    let expected: i64 = a
        .catalog()
        .iter()
        .filter(|x| profile.has_unlocked(&x.id))
        .map(|x| x.reward_points)
        .sum();
    assert_eq!(profile.experience_points, expected);
}

/// Test 3: Concurrent daily challenge creation yields a single row
#[tokio::test]
async fn test_concurrent_ensure_challenge_creates_one_row() {
    let dir = tempfile::TempDir::new().unwrap();
    let clock = clock();
    let a = open_engine(&dir, clock.clone()).await;
    let b = open_engine(&dir, clock.clone()).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let e = if i % 2 == 0 { a.clone() } else { b.clone() };
        handles.push(tokio::spawn(async move { e.get_daily_challenge("daily").await }));
    }
    let mut views = Vec::new();
    for h in handles {
        views.push(h.await.unwrap().unwrap());
    }
    assert!(views.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(
        a.challenges().count_for("daily", clock.today()).await.unwrap(),
        1
    );
}

/// Test 4: A completed challenge pays out exactly once across engines
#[tokio::test]
async fn test_concurrent_claims_pay_once() {
    let dir = tempfile::TempDir::new().unwrap();
    let clock = clock();
    let a = open_engine(&dir, clock.clone()).await;
    let b = open_engine(&dir, clock.clone()).await;

    a.get_daily_challenge("claimer").await.unwrap();
    // Three perfect ten-question games complete every template.
    for _ in 0..3 {
        a.submit_game(game("claimer", 10, 10)).await.unwrap();
    }
    assert!(b.get_daily_challenge("claimer").await.unwrap().completed);

    let (ra, rb) = tokio::join!(a.claim_daily_reward("claimer"), b.claim_daily_reward("claimer"));
    let results = [ra.unwrap(), rb.unwrap()];
    let claimed = results
        .iter()
        .filter(|r| matches!(r, ClaimOutcome::Claimed { .. }))
        .count();
    assert_eq!(claimed, 1);
    assert!(results.contains(&ClaimOutcome::AlreadyClaimed));

    let profile = a.store().fetch_profile("claimer").await.unwrap().unwrap();
    assert_eq!(profile.challenge_points, 25);
}

/// Test 5: Reopening keeps history and does not duplicate the catalog
#[tokio::test]
async fn test_reopen_preserves_state() {
    let dir = tempfile::TempDir::new().unwrap();
    let clock = clock();
    {
        let engine = open_engine(&dir, clock.clone()).await;
        engine.submit_game(game("keeper", 7, 10)).await.unwrap();
        engine.get_daily_challenge("keeper").await.unwrap();
    }

    let engine = open_engine(&dir, clock.clone()).await;
    let health = engine.health().await.unwrap();
    assert_eq!(health.achievements_seeded, 8);
    assert_eq!(health.users_count, 1);

    let view = engine.get_profile("keeper").await.unwrap();
    assert_eq!(view.profile.total_games, 1);
    assert_eq!(view.recent_games[0].percentage, 70.0);
    assert!(view.profile.has_unlocked("first_game"));
    assert_eq!(
        engine.challenges().count_for("keeper", clock.today()).await.unwrap(),
        1
    );
}
