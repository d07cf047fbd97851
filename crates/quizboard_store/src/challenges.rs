//! Daily Challenge Tracker
//!
//! One challenge row per user per day, advanced by the games played that day.
//! Rows move `Pending(progress) -> Completed` and never back.

use std::sync::Arc;

use chrono::NaiveDate;
use quizboard_core::{
    describe_challenge, next_progress, normalize_user_id, pick_template, ChallengeTemplate,
    ChallengeView, ClaimOutcome, DailyChallenge, GameOutcome, ProgressError, Result,
};
use sqlx::Row;

use crate::sqlite::{
    challenge_columns, date_to_sql, fetch_profile_in, row_to_challenge, SqliteStore,
    StoreResultExt,
};

pub struct DailyChallengeTracker {
    db: Arc<SqliteStore>,
    mastery_percentage: f64,
    reward_points: i64,
    xp_per_level: i64,
    cas_retries: u32,
}

impl DailyChallengeTracker {
    pub fn new(
        db: Arc<SqliteStore>,
        mastery_percentage: f64,
        reward_points: i64,
        xp_per_level: i64,
        cas_retries: u32,
    ) -> Self {
        Self {
            db,
            mastery_percentage,
            reward_points,
            xp_per_level: xp_per_level.max(1),
            cas_retries: cas_retries.max(1),
        }
    }

    /// Today's challenge for `user_id`, created from a random template if the
    /// user has none for `date` yet.
    pub async fn ensure_challenge(
        &self,
        user_id: &str,
        date: NaiveDate,
        now: i64,
    ) -> Result<DailyChallenge> {
        let user_id = normalize_user_id(user_id)?;
        let day = date_to_sql(date);
        let template = {
            let mut rng = rand::thread_rng();
            pick_template(&mut rng)
        };

        match self.insert_challenge(&user_id, &day, &template, now).await {
            Ok(()) => tracing::info!(
                "Created {} challenge for {} on {}",
                template.challenge_type.as_str(),
                user_id,
                day
            ),
            Err(ProgressError::ConflictIgnored(msg)) => tracing::debug!("Kept existing {}", msg),
            Err(e) => return Err(e),
        }

        self.challenge_for(&user_id, date)
            .await?
            .ok_or_else(|| ProgressError::internal("Daily challenge vanished after insert"))
    }

    /// Guarded insert. A concurrent caller that already created the row for
    /// this day wins and this returns `ConflictIgnored`.
    pub(crate) async fn insert_challenge(
        &self,
        user_id: &str,
        day: &str,
        template: &ChallengeTemplate,
        now: i64,
    ) -> Result<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO daily_challenges
                (user_id, challenge_date, challenge_type, target_value, current_progress,
                 completed, reward_claimed, created_at)
            SELECT ?, ?, ?, ?, 0, 0, 0, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM daily_challenges WHERE user_id = ? AND challenge_date = ?
            )
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(day)
        .bind(template.challenge_type.as_str())
        .bind(template.target_value)
        .bind(now)
        .bind(user_id)
        .bind(day)
        .execute(self.db.pool())
        .await
        .store_context("Failed to create daily challenge")?;

        if inserted.rows_affected() == 0 {
            return Err(ProgressError::ConflictIgnored(format!(
                "challenge for {} on {}",
                user_id, day
            )));
        }
        Ok(())
    }

    /// Newest challenge row for (user, date), if any.
    pub async fn challenge_for(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyChallenge>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM daily_challenges WHERE user_id = ? AND challenge_date = ? \
             ORDER BY id DESC LIMIT 1",
            challenge_columns()
        ))
        .bind(user_id)
        .bind(date_to_sql(date))
        .fetch_optional(self.db.pool())
        .await
        .store_context("Failed to query daily challenge")?;

        row.map(|r| row_to_challenge(&r)).transpose()
    }

    async fn open_challenges(&self, user_id: &str, date: NaiveDate) -> Result<Vec<DailyChallenge>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM daily_challenges WHERE user_id = ? AND challenge_date = ? AND completed = 0",
            challenge_columns()
        ))
        .bind(user_id)
        .bind(date_to_sql(date))
        .fetch_all(self.db.pool())
        .await
        .store_context("Failed to query open challenges")?;

        rows.iter().map(row_to_challenge).collect()
    }

    async fn reload(&self, id: i64) -> Result<Option<DailyChallenge>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM daily_challenges WHERE id = ?",
            challenge_columns()
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await
        .store_context("Failed to reload challenge")?;

        row.map(|r| row_to_challenge(&r)).transpose()
    }

    /// Apply one game to every open challenge of the game's day.
    ///
    /// Returns the rows that moved. Each write is conditional on the progress
    /// it was computed from; a lost race re-reads the row and tries again.
    pub async fn advance(&self, outcome: &GameOutcome) -> Result<Vec<DailyChallenge>> {
        let mut moved = Vec::new();

        for mut challenge in self.open_challenges(&outcome.user_id, outcome.played_on).await? {
            for _ in 0..self.cas_retries {
                let Some(step) = next_progress(&challenge, outcome, self.mastery_percentage) else {
                    break;
                };

                let result = sqlx::query(
                    r#"
                    UPDATE daily_challenges SET current_progress = ?, completed = ?
                    WHERE id = ? AND current_progress = ? AND completed = 0
                    "#,
                )
                .bind(step.progress)
                .bind(step.completed as i64)
                .bind(challenge.id)
                .bind(challenge.current_progress)
                .execute(self.db.pool())
                .await
                .store_context("Failed to advance challenge")?;

                if result.rows_affected() == 1 {
                    tracing::debug!(
                        "Challenge {} for {}: {} -> {}{}",
                        challenge.id,
                        challenge.user_id,
                        challenge.current_progress,
                        step.progress,
                        if step.completed { " (completed)" } else { "" }
                    );
                    challenge.current_progress = step.progress;
                    challenge.completed = step.completed;
                    moved.push(challenge.clone());
                    break;
                }

                match self.reload(challenge.id).await? {
                    Some(fresh) => challenge = fresh,
                    None => break,
                }
            }
        }

        Ok(moved)
    }

    /// Credit the reward of the completed challenge dated `date`.
    pub async fn claim_reward(&self, user_id: &str, date: NaiveDate, now: i64) -> Result<ClaimOutcome> {
        let user_id = normalize_user_id(user_id)?;
        let challenge = self
            .challenge_for(&user_id, date)
            .await?
            .ok_or_else(|| ProgressError::not_found(format!("no challenge for {} on {}", user_id, date)))?;

        if !challenge.completed {
            return Ok(ClaimOutcome::NotCompleted {
                progress: challenge.current_progress,
                target: challenge.target_value,
            });
        }
        if challenge.reward_claimed {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .store_context("Failed to begin reward claim")?;

        let flipped = sqlx::query(
            "UPDATE daily_challenges SET reward_claimed = 1 WHERE id = ? AND completed = 1 AND reward_claimed = 0",
        )
        .bind(challenge.id)
        .execute(&mut *tx)
        .await
        .store_context("Failed to mark reward claimed")?;
        if flipped.rows_affected() == 0 {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }

        let credited = sqlx::query(
            r#"
            UPDATE user_profiles SET
                challenge_points = challenge_points + ?1,
                level = 1 + MAX(experience_points + challenge_points + ?1, 0) / ?2,
                version = version + 1,
                updated_at = ?3
            WHERE user_id = ?4
            "#,
        )
        .bind(self.reward_points)
        .bind(self.xp_per_level)
        .bind(now)
        .bind(&user_id)
        .execute(&mut *tx)
        .await
        .store_context("Failed to credit challenge reward")?;
        if credited.rows_affected() == 0 {
            return Err(ProgressError::not_found(format!("profile {}", user_id)));
        }

        let profile = fetch_profile_in(&mut tx, &user_id)
            .await?
            .ok_or_else(|| ProgressError::internal("Profile vanished during claim"))?;
        tx.commit()
            .await
            .store_context("Failed to commit reward claim")?;

        tracing::info!(
            "User {} claimed {} points for challenge {}",
            user_id,
            self.reward_points,
            challenge.id
        );
        Ok(ClaimOutcome::Claimed {
            points: self.reward_points,
            challenge_points: profile.challenge_points,
            level: profile.level,
        })
    }

    /// Number of challenge rows stored for a user on a day.
    pub async fn count_for(&self, user_id: &str, date: NaiveDate) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM daily_challenges WHERE user_id = ? AND challenge_date = ?",
        )
        .bind(user_id)
        .bind(date_to_sql(date))
        .fetch_one(self.db.pool())
        .await
        .store_context("Failed to count challenges")?;
        row.try_get("n").store_context("Failed to decode challenge count")
    }
}

/// Client-facing view of a challenge row.
pub fn challenge_view(challenge: &DailyChallenge) -> ChallengeView {
    ChallengeView {
        challenge_type: challenge.challenge_type,
        description: describe_challenge(challenge.challenge_type, challenge.target_value),
        target: challenge.target_value,
        progress: challenge.current_progress,
        completed: challenge.completed,
        reward_claimed: challenge.reward_claimed,
        date: challenge.challenge_date,
    }
}
