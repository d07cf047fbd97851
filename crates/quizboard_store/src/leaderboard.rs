//! Leaderboard Aggregator: read-only rankings and app-wide statistics.

use std::sync::Arc;

use quizboard_core::{
    display_name, round1, AppStats, BoardScope, CategoryAverage, LeaderboardEntry, Result,
};
use sqlx::Row;

use crate::sqlite::{SqliteStore, StoreResultExt};

pub struct LeaderboardAggregator {
    db: Arc<SqliteStore>,
    max_entries: usize,
    overall_min_games: i64,
    category_min_games: i64,
}

impl LeaderboardAggregator {
    pub fn new(
        db: Arc<SqliteStore>,
        max_entries: usize,
        overall_min_games: i64,
        category_min_games: i64,
    ) -> Self {
        Self {
            db,
            max_entries: max_entries.max(1),
            overall_min_games,
            category_min_games,
        }
    }

    /// Rank users by mean percentage within `scope`.
    ///
    /// Ties fall back to best percentage, then games played, then user id.
    /// `limit` is clamped to `1..=max_entries`; `None` means `max_entries`.
    pub async fn rank(&self, scope: &BoardScope, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(self.max_entries).clamp(1, self.max_entries);
        let (category, min_games) = match scope {
            BoardScope::Overall => (None, self.overall_min_games),
            BoardScope::Category(c) => (Some(c.as_str()), self.category_min_games),
        };

        let rows = sqlx::query(
            r#"
            SELECT g.user_id AS user_id,
                   COUNT(*) AS games,
                   AVG(g.percentage) AS avg_pct,
                   MAX(g.percentage) AS best_pct,
                   MAX(p.first_name) AS first_name,
                   MAX(p.last_name) AS last_name,
                   MAX(p.username) AS username
            FROM game_results g
            LEFT JOIN user_profiles p ON p.user_id = g.user_id
            WHERE ?1 IS NULL OR g.category = ?1
            GROUP BY g.user_id
            HAVING COUNT(*) >= ?2
            ORDER BY avg_pct DESC, best_pct DESC, games DESC, g.user_id ASC
            LIMIT ?3
            "#,
        )
        .bind(category)
        .bind(min_games)
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await
        .store_context("Failed to query leaderboard")?;

        let entries = rows
            .iter()
            .map(|row| {
                let first: Option<String> = row.try_get("first_name")?;
                let last: Option<String> = row.try_get("last_name")?;
                let username: Option<String> = row.try_get("username")?;
                Ok(LeaderboardEntry {
                    user_id: row.try_get("user_id")?,
                    display_name: display_name(
                        first.as_deref().unwrap_or_default(),
                        last.as_deref().unwrap_or_default(),
                        username.as_deref().unwrap_or_default(),
                    ),
                    games_played: row.try_get("games")?,
                    avg_percentage: round1(row.try_get("avg_pct")?),
                    best_percentage: round1(row.try_get("best_pct")?),
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .store_context("Failed to decode leaderboard")?;

        tracing::debug!("Leaderboard '{}': {} entries", scope.label(), entries.len());
        Ok(entries)
    }

    pub async fn app_stats(&self) -> Result<AppStats> {
        let totals = sqlx::query(
            r#"
            SELECT (SELECT COUNT(*) FROM user_profiles) AS users,
                   COUNT(*) AS games,
                   COALESCE(SUM(total), 0) AS questions
            FROM game_results
            "#,
        )
        .fetch_one(self.db.pool())
        .await
        .store_context("Failed to query app totals")?;

        let rows = sqlx::query(
            r#"
            SELECT category, COUNT(*) AS games, AVG(percentage) AS avg_score
            FROM game_results
            GROUP BY category
            ORDER BY games DESC, category ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await
        .store_context("Failed to query category averages")?;

        let decode = || -> std::result::Result<AppStats, sqlx::Error> {
            let category_stats = rows
                .iter()
                .map(|row| {
                    Ok(CategoryAverage {
                        category: row.try_get("category")?,
                        games: row.try_get("games")?,
                        avg_score: round1(row.try_get("avg_score")?),
                    })
                })
                .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;
            Ok(AppStats {
                total_users: totals.try_get("users")?,
                total_games: totals.try_get("games")?,
                total_questions_answered: totals.try_get("questions")?,
                category_stats,
            })
        };
        decode().store_context("Failed to decode app stats")
    }
}
