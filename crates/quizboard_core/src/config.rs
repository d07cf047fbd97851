use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuizboardConfig {
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub progression: ProgressionConfig,
    pub logging: LoggingConfig,
}

impl QuizboardConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: QuizboardConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("QUIZBOARD_DB_PATH") {
            self.store.db_path = v;
        }
        if let Ok(v) = std::env::var("QUIZBOARD_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("QUIZBOARD_PORT") {
            if let Ok(n) = v.parse() {
                self.server.port = n;
            }
        }
        if let Ok(v) = std::env::var("QUIZBOARD_LOG_LEVEL") {
            self.logging.level = v;
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file path, or ":memory:".
    pub db_path: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "quiz_scores.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Hard cap on leaderboard length.
    pub leaderboard_limit: usize,
    /// Minimum games to appear on the overall board.
    pub overall_min_games: i64,
    /// Minimum games in a category to appear on its board.
    pub category_min_games: i64,
    pub recent_games_limit: usize,
    /// Percentage a game needs to count towards category mastery.
    pub mastery_percentage: f64,
    pub xp_per_level: i64,
    /// Challenge points credited when a completed daily challenge is claimed.
    pub challenge_reward_points: i64,
    /// Attempts at a versioned profile write before giving up.
    pub cas_retries: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            leaderboard_limit: 100,
            overall_min_games: 3,
            category_min_games: 2,
            recent_games_limit: 10,
            mastery_percentage: crate::model::MASTERY_PERCENTAGE,
            xp_per_level: 100,
            challenge_reward_points: 25,
            cas_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset.
    pub level: String,
    pub json: bool,
    /// Directory for a daily-rolling log file; stderr only when unset.
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
