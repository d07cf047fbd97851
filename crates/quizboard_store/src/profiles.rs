//! Profile Manager
//!
//! Owns the profile columns that move with every game: display fields,
//! counters, day streaks and `last_played_on`. Recording an outcome and
//! bumping those counters happen in one transaction.

use std::sync::Arc;

use quizboard_core::{
    next_day_streak, normalize_user_id, round1, AchievementDefinition, AchievementStatus,
    CategoryStats, DisplayInfo, GameOutcome, ProfileView, ProgressError, RecentGame, Result,
    UserProfile,
};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

use crate::sqlite::{
    date_to_sql, fetch_outcome_in, fetch_profile_in, outcome_columns, row_to_outcome,
    SqliteStore, StoreResultExt,
};

/// What `record_game_outcome` committed (or found already committed).
#[derive(Debug, Clone)]
pub struct RecordedGame {
    pub outcome: GameOutcome,
    /// Profile as of the end of the transaction.
    pub profile: UserProfile,
    /// The submission id was seen before; nothing was written.
    pub duplicate: bool,
}

pub struct ProfileManager {
    db: Arc<SqliteStore>,
    recent_games_limit: usize,
}

impl ProfileManager {
    pub fn new(db: Arc<SqliteStore>, recent_games_limit: usize) -> Self {
        Self {
            db,
            recent_games_limit,
        }
    }

    /// Create the profile if absent, otherwise refresh its display fields.
    pub async fn upsert_profile(
        &self,
        user_id: &str,
        display: &DisplayInfo,
        now: i64,
    ) -> Result<UserProfile> {
        let user_id = normalize_user_id(user_id)?;
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .store_context("Failed to begin profile upsert")?;

        upsert_in(&mut tx, &user_id, display, now).await?;
        let profile = fetch_profile_in(&mut tx, &user_id)
            .await?
            .ok_or_else(|| ProgressError::internal("Profile vanished after upsert"))?;

        tx.commit()
            .await
            .store_context("Failed to commit profile upsert")?;
        Ok(profile)
    }

    /// Create the profile with default display fields if it does not exist.
    /// Existing profiles are left untouched.
    pub async fn ensure_profile(&self, user_id: &str, now: i64) -> Result<UserProfile> {
        let user_id = normalize_user_id(user_id)?;
        let display = DisplayInfo::anonymous();
        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, username, first_name, last_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(&user_id)
        .bind(&display.username)
        .bind(&display.first_name)
        .bind(&display.last_name)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .store_context("Failed to ensure profile")?;

        self.db
            .fetch_profile(&user_id)
            .await?
            .ok_or_else(|| ProgressError::internal("Profile vanished after insert"))
    }

    /// Append `outcome` and move the profile counters in one transaction.
    ///
    /// The profile is created on the fly. A repeated `submission_id` for the
    /// same user returns the stored outcome with `duplicate = true`.
    pub async fn record_game_outcome(
        &self,
        display: &DisplayInfo,
        outcome: &GameOutcome,
    ) -> Result<RecordedGame> {
        let user_id = normalize_user_id(&outcome.user_id)?;
        let now = outcome.created_at;

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .store_context("Failed to begin game transaction")?;

        // First statement is a write so the writer lock is taken up front.
        upsert_in(&mut tx, &user_id, display, now).await?;

        if let Some(sid) = &outcome.submission_id {
            let existing = sqlx::query(
                "SELECT id FROM game_results WHERE user_id = ? AND submission_id = ?",
            )
            .bind(&user_id)
            .bind(sid)
            .fetch_optional(&mut *tx)
            .await
            .store_context("Failed to check submission id")?;

            if let Some(row) = existing {
                let id: i64 = row.try_get("id").store_context("Failed to decode outcome id")?;
                let stored = fetch_outcome_in(&mut tx, id).await?;
                let profile = fetch_profile_in(&mut tx, &user_id)
                    .await?
                    .ok_or_else(|| ProgressError::internal("Profile vanished during replay"))?;
                tx.commit()
                    .await
                    .store_context("Failed to commit duplicate submission")?;
                tracing::info!("Duplicate submission {} for {} ignored", sid, user_id);
                return Ok(RecordedGame {
                    outcome: stored,
                    profile,
                    duplicate: true,
                });
            }
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO game_results
                (user_id, category, difficulty, score, total, percentage, time_spent, hints_used,
                 game_mode, answer_streak, submission_id, played_on, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&outcome.category)
        .bind(&outcome.difficulty)
        .bind(outcome.score)
        .bind(outcome.total)
        .bind(outcome.percentage)
        .bind(outcome.time_spent)
        .bind(outcome.hints_used)
        .bind(outcome.game_mode.as_str())
        .bind(outcome.answer_streak)
        .bind(&outcome.submission_id)
        .bind(date_to_sql(outcome.played_on))
        .bind(now)
        .execute(&mut *tx)
        .await
        .store_context("Failed to insert game result")?;
        let outcome_id = inserted.last_insert_rowid();

        let before = fetch_profile_in(&mut tx, &user_id)
            .await?
            .ok_or_else(|| ProgressError::internal("Profile vanished before counters"))?;
        let streak = next_day_streak(before.last_played_on, before.current_streak, outcome.played_on);
        let last_played_on = before
            .last_played_on
            .map_or(outcome.played_on, |d| d.max(outcome.played_on));

        sqlx::query(
            r#"
            UPDATE user_profiles SET
                total_games = total_games + 1,
                total_score = total_score + ?,
                current_streak = ?,
                best_streak = MAX(best_streak, ?),
                last_played_on = ?,
                updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(outcome.score)
        .bind(streak)
        .bind(streak)
        .bind(date_to_sql(last_played_on))
        .bind(now)
        .bind(&user_id)
        .execute(&mut *tx)
        .await
        .store_context("Failed to update profile counters")?;

        let stored = fetch_outcome_in(&mut tx, outcome_id).await?;
        let profile = fetch_profile_in(&mut tx, &user_id)
            .await?
            .ok_or_else(|| ProgressError::internal("Profile vanished after counters"))?;

        tx.commit()
            .await
            .store_context("Failed to commit game transaction")?;

        tracing::debug!(
            "Recorded game {} for {}: {}/{} in {} (streak {})",
            outcome_id,
            user_id,
            stored.score,
            stored.total,
            stored.category,
            profile.current_streak
        );
        Ok(RecordedGame {
            outcome: stored,
            profile,
            duplicate: false,
        })
    }

    /// Composite profile read. Creates the profile if it does not exist.
    pub async fn profile_view(
        &self,
        user_id: &str,
        catalog: &[AchievementDefinition],
        now: i64,
    ) -> Result<ProfileView> {
        let profile = self.ensure_profile(user_id, now).await?;
        let mut conn = self
            .db
            .pool()
            .acquire()
            .await
            .store_context("Failed to acquire connection")?;

        let category_stats = category_stats_in(&mut conn, &profile.user_id).await?;
        let recent_games = recent_games_in(&mut conn, &profile.user_id, self.recent_games_limit).await?;
        drop(conn);

        let favorite_category = favorite_category(&category_stats);

        let mut achievements: Vec<AchievementStatus> = catalog
            .iter()
            .map(|a| AchievementStatus {
                unlocked: profile.has_unlocked(&a.id),
                definition: a.clone(),
            })
            .collect();
        achievements.sort_by(|a, b| {
            a.definition
                .rarity
                .cmp(&b.definition.rarity)
                .then_with(|| a.definition.name.cmp(&b.definition.name))
        });

        Ok(ProfileView {
            profile,
            category_stats,
            recent_games,
            achievements,
            favorite_category,
        })
    }
}

/// Category with the most games; ties go to the alphabetically first name.
pub fn favorite_category(stats: &[CategoryStats]) -> Option<String> {
    stats
        .iter()
        .max_by(|a, b| a.games.cmp(&b.games).then_with(|| b.category.cmp(&a.category)))
        .map(|s| s.category.clone())
}

async fn upsert_in(
    conn: &mut SqliteConnection,
    user_id: &str,
    display: &DisplayInfo,
    now: i64,
) -> Result<()> {
    let fresh = display.normalized();
    // Blank incoming fields keep whatever is stored.
    sqlx::query(
        r#"
        INSERT INTO user_profiles (user_id, username, first_name, last_name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            username = COALESCE(NULLIF(?, ''), username),
            first_name = COALESCE(NULLIF(?, ''), first_name),
            last_name = COALESCE(NULLIF(?, ''), last_name),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(&fresh.username)
    .bind(&fresh.first_name)
    .bind(&fresh.last_name)
    .bind(now)
    .bind(now)
    .bind(display.username.trim())
    .bind(display.first_name.trim())
    .bind(display.last_name.trim())
    .execute(&mut *conn)
    .await
    .store_context("Failed to upsert profile")?;
    Ok(())
}

async fn category_stats_in(conn: &mut SqliteConnection, user_id: &str) -> Result<Vec<CategoryStats>> {
    let rows = sqlx::query(
        r#"
        SELECT category, COUNT(*) AS games, AVG(percentage) AS avg_score, MAX(percentage) AS best_score
        FROM game_results
        WHERE user_id = ?
        GROUP BY category
        ORDER BY games DESC, category ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .store_context("Failed to query category stats")?;

    rows.iter()
        .map(|row| {
            Ok(CategoryStats {
                category: row.try_get("category")?,
                games: row.try_get("games")?,
                avg_score: round1(row.try_get("avg_score")?),
                best_score: round1(row.try_get("best_score")?),
            })
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
        .store_context("Failed to decode category stats")
}

async fn recent_games_in(
    conn: &mut SqliteConnection,
    user_id: &str,
    limit: usize,
) -> Result<Vec<RecentGame>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM game_results WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        outcome_columns()
    ))
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(&mut *conn)
    .await
    .store_context("Failed to query recent games")?;

    rows.iter()
        .map(|row| {
            let o = row_to_outcome(row)?;
            Ok(RecentGame {
                category: o.category,
                difficulty: o.difficulty,
                score: o.score,
                total: o.total,
                percentage: round1(o.percentage),
                game_mode: o.game_mode,
                played_at: o.created_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(category: &str, games: i64) -> CategoryStats {
        CategoryStats {
            category: category.into(),
            games,
            avg_score: 50.0,
            best_score: 50.0,
        }
    }

    #[test]
    fn test_favorite_category_most_games_then_name() {
        assert_eq!(favorite_category(&[]), None);
        let s = vec![stats("history", 2), stats("art", 2), stats("science", 1)];
        assert_eq!(favorite_category(&s).as_deref(), Some("art"));
        let s = vec![stats("history", 3), stats("art", 2)];
        assert_eq!(favorite_category(&s).as_deref(), Some("history"));
    }
}
