//! ProgressionEngine: the façade the gateway and CLI talk to.
//!
//! A submission runs Profile Manager, then Achievement Evaluator, then Daily
//! Challenge Tracker while holding the user's lock. Only the first step can
//! fail the request; later failures mark the receipt as degraded.

use std::sync::Arc;

use quizboard_core::{
    default_achievements, AchievementDefinition, AppStats, BoardScope, ChallengeView,
    ClaimOutcome, Clock, DisplayInfo, GameSubmission, HealthReport, LeaderboardEntry,
    ProfileView, ProgressionConfig, Result, SubmissionReceipt, SystemClock, UserProfile,
};

use crate::achievements::AchievementEvaluator;
use crate::challenges::{challenge_view, DailyChallengeTracker};
use crate::leaderboard::LeaderboardAggregator;
use crate::locks::UserLocks;
use crate::profiles::ProfileManager;
use crate::sqlite::SqliteStore;

pub struct ProgressionEngine {
    db: Arc<SqliteStore>,
    profiles: ProfileManager,
    achievements: AchievementEvaluator,
    challenges: DailyChallengeTracker,
    leaderboard: LeaderboardAggregator,
    locks: UserLocks,
    clock: Arc<dyn Clock>,
}

impl ProgressionEngine {
    pub async fn new(db: Arc<SqliteStore>, config: ProgressionConfig) -> Result<Self> {
        Self::with_clock(db, config, Arc::new(SystemClock)).await
    }

    /// Seed the achievement catalog and wire the components together.
    pub async fn with_clock(
        db: Arc<SqliteStore>,
        config: ProgressionConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        db.seed_achievements(&default_achievements()).await?;
        let catalog = Arc::new(db.load_achievements().await?);
        tracing::info!("Progression engine ready with {} achievements", catalog.len());

        Ok(Self {
            profiles: ProfileManager::new(db.clone(), config.recent_games_limit),
            achievements: AchievementEvaluator::new(
                db.clone(),
                catalog,
                config.mastery_percentage,
                config.xp_per_level,
                config.cas_retries,
            ),
            challenges: DailyChallengeTracker::new(
                db.clone(),
                config.mastery_percentage,
                config.challenge_reward_points,
                config.xp_per_level,
                config.cas_retries,
            ),
            leaderboard: LeaderboardAggregator::new(
                db.clone(),
                config.leaderboard_limit,
                config.overall_min_games,
                config.category_min_games,
            ),
            locks: UserLocks::new(),
            clock,
            db,
        })
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.db
    }

    pub fn catalog(&self) -> &[AchievementDefinition] {
        self.achievements.catalog()
    }

    pub fn profiles(&self) -> &ProfileManager {
        &self.profiles
    }

    pub fn achievements(&self) -> &AchievementEvaluator {
        &self.achievements
    }

    pub fn challenges(&self) -> &DailyChallengeTracker {
        &self.challenges
    }

    pub fn leaderboard(&self) -> &LeaderboardAggregator {
        &self.leaderboard
    }

    /// Record one finished game and apply its bonuses.
    pub async fn submit_game(&self, submission: GameSubmission) -> Result<SubmissionReceipt> {
        let now = self.clock.now();
        let (display, outcome) = submission.into_outcome(now)?;
        let ts = now.timestamp();

        let _guard = self.locks.acquire(&outcome.user_id).await;

        let recorded = self.profiles.record_game_outcome(&display, &outcome).await?;
        let outcome = recorded.outcome;
        if recorded.duplicate {
            return Ok(SubmissionReceipt {
                outcome_id: outcome.id,
                percentage: outcome.percentage,
                new_achievements: Vec::new(),
                duplicate: true,
                degraded: false,
                warnings: Vec::new(),
            });
        }

        let mut warnings = Vec::new();

        let new_achievements = match self.achievements.evaluate(&outcome, ts).await {
            Ok(unlocked) => unlocked,
            Err(e) => {
                tracing::warn!("Achievement evaluation failed for {}: {}", outcome.user_id, e);
                warnings.push(format!("achievement evaluation failed: {}", e));
                Vec::new()
            }
        };

        if let Err(e) = self.challenges.advance(&outcome).await {
            tracing::warn!("Daily challenge update failed for {}: {}", outcome.user_id, e);
            warnings.push(format!("daily challenge update failed: {}", e));
        }

        tracing::info!(
            "Game {} saved for {}: {}/{} {} ({:.1}%), {} new achievements",
            outcome.id,
            outcome.user_id,
            outcome.score,
            outcome.total,
            outcome.category,
            outcome.percentage,
            new_achievements.len()
        );

        Ok(SubmissionReceipt {
            outcome_id: outcome.id,
            percentage: outcome.percentage,
            new_achievements,
            duplicate: false,
            degraded: !warnings.is_empty(),
            warnings,
        })
    }

    /// Create or refresh a profile's display fields.
    pub async fn upsert_profile(&self, user_id: &str, display: &DisplayInfo) -> Result<UserProfile> {
        let ts = self.clock.now().timestamp();
        self.profiles.upsert_profile(user_id, display, ts).await
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<ProfileView> {
        let ts = self.clock.now().timestamp();
        self.profiles.profile_view(user_id, self.catalog(), ts).await
    }

    /// `category` is a category name or `"overall"`.
    pub async fn get_leaderboard(&self, category: &str, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>> {
        self.leaderboard.rank(&BoardScope::parse_str(category), limit).await
    }

    pub async fn get_daily_challenge(&self, user_id: &str) -> Result<ChallengeView> {
        let now = self.clock.now();
        let challenge = self
            .challenges
            .ensure_challenge(user_id, now.date_naive(), now.timestamp())
            .await?;
        Ok(challenge_view(&challenge))
    }

    pub async fn claim_daily_reward(&self, user_id: &str) -> Result<ClaimOutcome> {
        let now = self.clock.now();
        let user_id = quizboard_core::normalize_user_id(user_id)?;
        let _guard = self.locks.acquire(&user_id).await;
        self.challenges
            .claim_reward(&user_id, now.date_naive(), now.timestamp())
            .await
    }

    pub async fn get_app_stats(&self) -> Result<AppStats> {
        self.leaderboard.app_stats().await
    }

    pub async fn health(&self) -> Result<HealthReport> {
        Ok(HealthReport {
            status: "healthy".to_string(),
            users_count: self.db.count_users().await?,
            achievements_seeded: self.db.count_achievements().await?,
        })
    }
}
