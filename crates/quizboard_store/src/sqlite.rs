use chrono::NaiveDate;
use quizboard_core::{
    AchievementDefinition, ChallengeType, ConditionType, DailyChallenge, GameMode, GameOutcome,
    ProgressError, Rarity, Result, StoreConfig, UserProfile,
};
use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};

// =============================================================================
// Error mapping
// =============================================================================

/// Attach an operation description to a sqlx failure and classify it into
/// the engine's error taxonomy.
pub trait StoreResultExt<T> {
    fn store_context(self, what: &str) -> Result<T>;
}

impl<T> StoreResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn store_context(self, what: &str) -> Result<T> {
        self.map_err(|e| classify(e, what))
    }
}

fn classify(err: sqlx::Error, what: &str) -> ProgressError {
    let msg = format!("{}: {}", what, err);
    match &err {
        sqlx::Error::RowNotFound => ProgressError::NotFound(msg),
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                || db.is_check_violation()
                || db.is_foreign_key_violation() =>
        {
            ProgressError::Internal(msg)
        }
        sqlx::Error::Database(db) => {
            let text = db.message().to_ascii_lowercase();
            if text.contains("locked") || text.contains("busy") {
                ProgressError::StoreUnavailable(msg)
            } else {
                ProgressError::Internal(msg)
            }
        }
        sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => ProgressError::Internal(msg),
        _ => ProgressError::StoreUnavailable(msg),
    }
}

// =============================================================================
// Store handle
// =============================================================================

/// Injected handle over the SQLite pool. Cheap to clone; every operation
/// acquires a connection (or transaction) for its own scope only.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` with default store settings.
    pub async fn new(db_path: &str) -> Result<Self> {
        let config = StoreConfig {
            db_path: db_path.to_string(),
            ..StoreConfig::default()
        };
        Self::with_config(&config).await
    }

    pub async fn with_config(config: &StoreConfig) -> Result<Self> {
        let in_memory = config.db_path == ":memory:";
        let db_url = format!("sqlite://{}?mode=rwc", config.db_path);
        let busy_timeout_ms = config.busy_timeout_ms;

        let mut options = SqlitePoolOptions::new().after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {}", busy_timeout_ms))
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA journal_mode = WAL")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        });
        // A private in-memory database lives only as long as its connection.
        options = if in_memory {
            options.max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            options.max_connections(config.max_connections.max(1))
        };

        let pool = options
            .connect(&db_url)
            .await
            .store_context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::info!("Store ready at {}", config.db_path);
        Ok(store)
    }

    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_profiles (
                user_id TEXT PRIMARY KEY,
                username TEXT NOT NULL DEFAULT '',
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL DEFAULT '',
                total_games INTEGER NOT NULL DEFAULT 0,
                total_score INTEGER NOT NULL DEFAULT 0,
                best_streak INTEGER NOT NULL DEFAULT 0,
                current_streak INTEGER NOT NULL DEFAULT 0,
                achievements TEXT NOT NULL DEFAULT '[]',
                level INTEGER NOT NULL DEFAULT 1,
                experience_points INTEGER NOT NULL DEFAULT 0,
                challenge_points INTEGER NOT NULL DEFAULT 0,
                last_played_on TEXT,
                version INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .store_context("Failed to create user_profiles table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS game_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                category TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                score INTEGER NOT NULL,
                total INTEGER NOT NULL,
                percentage REAL NOT NULL,
                time_spent INTEGER NOT NULL DEFAULT 0,
                hints_used INTEGER NOT NULL DEFAULT 0,
                game_mode TEXT NOT NULL DEFAULT 'normal',
                answer_streak INTEGER NOT NULL DEFAULT 0,
                submission_id TEXT,
                played_on TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                CHECK (score >= 0 AND score <= total),
                FOREIGN KEY(user_id) REFERENCES user_profiles(user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .store_context("Failed to create game_results table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_game_results_user_id ON game_results(user_id)")
            .execute(&self.pool)
            .await
            .store_context("Failed to create game_results user index")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_game_results_category ON game_results(category, user_id)",
        )
        .execute(&self.pool)
        .await
        .store_context("Failed to create game_results category index")?;

        // Idempotency key: at most one outcome per (user, submission_id).
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_game_results_submission \
             ON game_results(user_id, submission_id) WHERE submission_id IS NOT NULL",
        )
        .execute(&self.pool)
        .await
        .store_context("Failed to create game_results submission index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS achievements (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                condition_type TEXT NOT NULL,
                condition_value INTEGER NOT NULL,
                reward_points INTEGER NOT NULL DEFAULT 0,
                rarity TEXT NOT NULL DEFAULT 'common'
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .store_context("Failed to create achievements table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_challenges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                challenge_date TEXT NOT NULL,
                challenge_type TEXT NOT NULL,
                target_value INTEGER NOT NULL,
                current_progress INTEGER NOT NULL DEFAULT 0,
                completed INTEGER NOT NULL DEFAULT 0,
                reward_claimed INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                UNIQUE(user_id, challenge_date, challenge_type)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .store_context("Failed to create daily_challenges table")?;

        Ok(())
    }

    // =========================================================================
    // Achievement catalog
    // =========================================================================

    /// Upsert catalog entries by id. Safe to run on every startup.
    pub async fn seed_achievements(&self, catalog: &[AchievementDefinition]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .store_context("Failed to begin catalog seed")?;

        for a in catalog {
            sqlx::query(
                r#"
                INSERT INTO achievements
                    (id, name, description, icon, condition_type, condition_value, reward_points, rarity)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    icon = excluded.icon,
                    condition_type = excluded.condition_type,
                    condition_value = excluded.condition_value,
                    reward_points = excluded.reward_points,
                    rarity = excluded.rarity
                "#,
            )
            .bind(&a.id)
            .bind(&a.name)
            .bind(&a.description)
            .bind(&a.icon)
            .bind(a.condition_type.as_str())
            .bind(a.condition_value)
            .bind(a.reward_points)
            .bind(a.rarity.as_str())
            .execute(&mut *tx)
            .await
            .store_context("Failed to seed achievement")?;
        }

        tx.commit().await.store_context("Failed to commit catalog seed")?;
        tracing::info!("Seeded {} achievements", catalog.len());
        Ok(())
    }

    /// Load the stored catalog. Rows with an unknown condition tag are skipped.
    pub async fn load_achievements(&self) -> Result<Vec<AchievementDefinition>> {
        let rows = sqlx::query(
            "SELECT id, name, description, icon, condition_type, condition_value, reward_points, rarity
             FROM achievements ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .store_context("Failed to load achievements")?;

        let mut catalog = Vec::with_capacity(rows.len());
        for row in rows {
            let tag: String = row
                .try_get("condition_type")
                .store_context("Failed to decode achievement")?;
            let Some(condition_type) = ConditionType::parse_str(&tag) else {
                tracing::warn!("Skipping achievement with unknown condition type '{}'", tag);
                continue;
            };
            catalog.push(row_to_achievement(&row, condition_type).store_context("Failed to decode achievement")?);
        }
        Ok(catalog)
    }

    // =========================================================================
    // Simple reads
    // =========================================================================

    pub async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .store_context("Failed to acquire connection")?;
        fetch_profile_in(&mut conn, user_id).await
    }

    /// Number of stored outcomes for a user.
    pub async fn count_outcomes(&self, user_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM game_results WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .store_context("Failed to count outcomes")?;
        row.try_get("n").store_context("Failed to decode outcome count")
    }

    /// Distinct categories in which the user ever reached `threshold` percent.
    pub async fn count_mastered_categories(&self, user_id: &str, threshold: f64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT category) AS n FROM game_results WHERE user_id = ? AND percentage >= ?",
        )
        .bind(user_id)
        .bind(threshold)
        .fetch_one(&self.pool)
        .await
        .store_context("Failed to count mastered categories")?;
        row.try_get("n").store_context("Failed to decode mastered categories")
    }

    pub async fn count_users(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM user_profiles")
            .fetch_one(&self.pool)
            .await
            .store_context("Failed to count users")?;
        row.try_get("n").store_context("Failed to decode user count")
    }

    pub async fn count_achievements(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM achievements")
            .fetch_one(&self.pool)
            .await
            .store_context("Failed to count achievements")?;
        row.try_get("n").store_context("Failed to decode achievement count")
    }
}

// =============================================================================
// Connection-scoped helpers (usable inside a transaction)
// =============================================================================

const PROFILE_COLUMNS: &str = "user_id, username, first_name, last_name, total_games, total_score, \
     best_streak, current_streak, achievements, level, experience_points, challenge_points, \
     last_played_on, version, created_at, updated_at";

const OUTCOME_COLUMNS: &str = "id, user_id, category, difficulty, score, total, percentage, \
     time_spent, hints_used, game_mode, answer_streak, submission_id, played_on, created_at";

const CHALLENGE_COLUMNS: &str = "id, user_id, challenge_date, challenge_type, target_value, \
     current_progress, completed, reward_claimed, created_at";

pub(crate) async fn fetch_profile_in(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<UserProfile>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM user_profiles WHERE user_id = ?",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .store_context("Failed to query user_profiles")?;

    row.map(|r| row_to_profile(&r)).transpose()
}

pub(crate) async fn fetch_outcome_in(conn: &mut SqliteConnection, id: i64) -> Result<GameOutcome> {
    let row = sqlx::query(&format!("SELECT {} FROM game_results WHERE id = ?", OUTCOME_COLUMNS))
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .store_context("Failed to query game_results")?;
    row_to_outcome(&row)
}

pub(crate) fn outcome_columns() -> &'static str {
    OUTCOME_COLUMNS
}

pub(crate) fn challenge_columns() -> &'static str {
    CHALLENGE_COLUMNS
}

// =============================================================================
// Row mapping
// =============================================================================

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_sql(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| ProgressError::internal(format!("Invalid stored date '{}': {}", s, e)))
}

pub(crate) fn row_to_profile(row: &SqliteRow) -> Result<UserProfile> {
    let decode = || -> std::result::Result<_, sqlx::Error> {
        Ok((
            row.try_get::<String, _>("achievements")?,
            row.try_get::<Option<String>, _>("last_played_on")?,
        ))
    };
    let (achievements_json, last_played) = decode().store_context("Failed to decode profile")?;

    let unlocked_achievement_ids: Vec<String> = serde_json::from_str(&achievements_json)
        .map_err(|e| ProgressError::internal(format!("Corrupt achievement list: {}", e)))?;
    let last_played_on = last_played.as_deref().map(date_from_sql).transpose()?;

    let profile = (|| -> std::result::Result<UserProfile, sqlx::Error> {
        Ok(UserProfile {
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            total_games: row.try_get("total_games")?,
            total_score: row.try_get("total_score")?,
            best_streak: row.try_get("best_streak")?,
            current_streak: row.try_get("current_streak")?,
            unlocked_achievement_ids,
            level: row.try_get("level")?,
            experience_points: row.try_get("experience_points")?,
            challenge_points: row.try_get("challenge_points")?,
            last_played_on,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    })()
    .store_context("Failed to decode profile")?;
    Ok(profile)
}

pub(crate) fn row_to_outcome(row: &SqliteRow) -> Result<GameOutcome> {
    let (mode, played_on): (String, String) = (|| -> std::result::Result<_, sqlx::Error> {
        Ok((row.try_get("game_mode")?, row.try_get("played_on")?))
    })()
    .store_context("Failed to decode outcome")?;

    let game_mode = GameMode::parse_str(&mode)
        .ok_or_else(|| ProgressError::internal(format!("Unknown stored game mode '{}'", mode)))?;
    let played_on = date_from_sql(&played_on)?;

    (|| -> std::result::Result<GameOutcome, sqlx::Error> {
        Ok(GameOutcome {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            category: row.try_get("category")?,
            difficulty: row.try_get("difficulty")?,
            score: row.try_get("score")?,
            total: row.try_get("total")?,
            percentage: row.try_get("percentage")?,
            time_spent: row.try_get("time_spent")?,
            hints_used: row.try_get("hints_used")?,
            game_mode,
            answer_streak: row.try_get("answer_streak")?,
            submission_id: row.try_get("submission_id")?,
            played_on,
            created_at: row.try_get("created_at")?,
        })
    })()
    .store_context("Failed to decode outcome")
}

pub(crate) fn row_to_challenge(row: &SqliteRow) -> Result<DailyChallenge> {
    let (kind, date): (String, String) = (|| -> std::result::Result<_, sqlx::Error> {
        Ok((row.try_get("challenge_type")?, row.try_get("challenge_date")?))
    })()
    .store_context("Failed to decode challenge")?;

    let challenge_type = ChallengeType::parse_str(&kind)
        .ok_or_else(|| ProgressError::internal(format!("Unknown stored challenge type '{}'", kind)))?;
    let challenge_date = date_from_sql(&date)?;

    (|| -> std::result::Result<DailyChallenge, sqlx::Error> {
        Ok(DailyChallenge {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            challenge_date,
            challenge_type,
            target_value: row.try_get("target_value")?,
            current_progress: row.try_get("current_progress")?,
            completed: row.try_get::<i64, _>("completed")? != 0,
            reward_claimed: row.try_get::<i64, _>("reward_claimed")? != 0,
            created_at: row.try_get("created_at")?,
        })
    })()
    .store_context("Failed to decode challenge")
}

fn row_to_achievement(
    row: &SqliteRow,
    condition_type: ConditionType,
) -> std::result::Result<AchievementDefinition, sqlx::Error> {
    Ok(AchievementDefinition {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        icon: row.try_get("icon")?,
        condition_type,
        condition_value: row.try_get("condition_value")?,
        reward_points: row.try_get("reward_points")?,
        rarity: Rarity::parse_str(&row.try_get::<String, _>("rarity")?),
    })
}
