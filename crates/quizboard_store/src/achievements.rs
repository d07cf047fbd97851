//! Achievement Evaluator
//!
//! Checks the catalog against a freshly recorded outcome and persists any new
//! unlocks. The write is a compare-and-swap on the profile `version`, so two
//! evaluators racing on one user never drop or double-grant an unlock.

use std::sync::Arc;

use quizboard_core::{
    level_for_experience, newly_unlocked, AchievementDefinition, EvaluationContext, GameOutcome,
    ProgressError, Result,
};

use crate::sqlite::{SqliteStore, StoreResultExt};

pub struct AchievementEvaluator {
    db: Arc<SqliteStore>,
    catalog: Arc<Vec<AchievementDefinition>>,
    mastery_percentage: f64,
    xp_per_level: i64,
    cas_retries: u32,
}

impl AchievementEvaluator {
    pub fn new(
        db: Arc<SqliteStore>,
        catalog: Arc<Vec<AchievementDefinition>>,
        mastery_percentage: f64,
        xp_per_level: i64,
        cas_retries: u32,
    ) -> Self {
        Self {
            db,
            catalog,
            mastery_percentage,
            xp_per_level,
            cas_retries: cas_retries.max(1),
        }
    }

    pub fn catalog(&self) -> &[AchievementDefinition] {
        &self.catalog
    }

    /// Unlock every catalog entry the outcome newly satisfies.
    ///
    /// Returns the new unlocks in catalog order; an empty list is the normal
    /// case. Re-running for the same outcome returns nothing.
    pub async fn evaluate(&self, outcome: &GameOutcome, now: i64) -> Result<Vec<AchievementDefinition>> {
        let needs_history = self
            .catalog
            .iter()
            .any(|a| a.condition_type.needs_history());

        for attempt in 1..=self.cas_retries {
            let profile = self
                .db
                .fetch_profile(&outcome.user_id)
                .await?
                .ok_or_else(|| ProgressError::not_found(format!("profile {}", outcome.user_id)))?;

            let mastered_categories = if needs_history {
                self.db
                    .count_mastered_categories(&profile.user_id, self.mastery_percentage)
                    .await?
            } else {
                0
            };

            let ctx = EvaluationContext {
                profile: &profile,
                outcome,
                mastered_categories,
            };
            let fresh: Vec<AchievementDefinition> =
                newly_unlocked(&self.catalog, &ctx).into_iter().cloned().collect();
            if fresh.is_empty() {
                return Ok(fresh);
            }

            let mut ids = profile.unlocked_achievement_ids.clone();
            ids.extend(fresh.iter().map(|a| a.id.clone()));
            let ids_json = serde_json::to_string(&ids)
                .map_err(|e| ProgressError::internal(format!("Failed to encode achievements: {}", e)))?;
            let experience_points =
                profile.experience_points + fresh.iter().map(|a| a.reward_points).sum::<i64>();
            let level =
                level_for_experience(experience_points + profile.challenge_points, self.xp_per_level);

            let result = sqlx::query(
                r#"
                UPDATE user_profiles SET
                    achievements = ?,
                    experience_points = ?,
                    level = ?,
                    version = version + 1,
                    updated_at = ?
                WHERE user_id = ? AND version = ?
                "#,
            )
            .bind(&ids_json)
            .bind(experience_points)
            .bind(level)
            .bind(now)
            .bind(&profile.user_id)
            .bind(profile.version)
            .execute(self.db.pool())
            .await
            .store_context("Failed to persist achievements")?;

            if result.rows_affected() == 1 {
                tracing::info!(
                    "User {} unlocked {:?} (+{} xp, level {})",
                    profile.user_id,
                    fresh.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
                    experience_points - profile.experience_points,
                    level
                );
                return Ok(fresh);
            }

            tracing::debug!(
                "Achievement write for {} lost a version race (attempt {})",
                profile.user_id,
                attempt
            );
            tokio::task::yield_now().await;
        }

        Err(ProgressError::StoreUnavailable(format!(
            "achievement evaluation for {} kept conflicting after {} attempts",
            outcome.user_id, self.cas_retries
        )))
    }
}
