//! Domain records of the progression engine.
//!
//! Everything here is plain data: profiles, game outcomes, the achievement
//! catalog entries, daily challenges and the read models handed to callers.
//! Persistence lives in `quizboard_store`; rules live in [`crate::rules`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProgressError, Result};

/// Fallback first name for users that never sent one.
pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// Upper bound on user id length accepted at the edge.
pub const MAX_USER_ID_LEN: usize = 128;

/// Percentage from which a game counts towards category mastery.
pub const MASTERY_PERCENTAGE: f64 = 80.0;

/// `100 * score / total`, with an empty game treated as 0%.
pub fn percentage(score: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    100.0 * score as f64 / total as f64
}

/// Round to one decimal place, the precision every read model reports.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Trim and bound-check a user id.
pub fn normalize_user_id(user_id: &str) -> Result<String> {
    let id = user_id.trim();
    if id.is_empty() {
        return Err(ProgressError::invalid("user_id is required"));
    }
    if id.chars().count() > MAX_USER_ID_LEN {
        return Err(ProgressError::invalid(format!(
            "user_id longer than {} characters",
            MAX_USER_ID_LEN
        )));
    }
    Ok(id.to_string())
}

/// Human name shown on boards: "First Last", else username, else the default.
pub fn display_name(first_name: &str, last_name: &str, username: &str) -> String {
    let first = first_name.trim();
    let last = last_name.trim();
    match (first.is_empty(), last.is_empty()) {
        (false, false) => format!("{} {}", first, last),
        (false, true) => first.to_string(),
        (true, false) => last.to_string(),
        (true, true) if !username.trim().is_empty() => username.trim().to_string(),
        _ => DEFAULT_PLAYER_NAME.to_string(),
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// Display fields a client sends along with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl DisplayInfo {
    pub fn anonymous() -> Self {
        Self {
            first_name: DEFAULT_PLAYER_NAME.to_string(),
            ..Self::default()
        }
    }

    /// Trimmed copy with the default first name filled in.
    pub fn normalized(&self) -> Self {
        let first = self.first_name.trim();
        Self {
            username: self.username.trim().to_string(),
            first_name: if first.is_empty() {
                DEFAULT_PLAYER_NAME.to_string()
            } else {
                first.to_string()
            },
            last_name: self.last_name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub total_games: i64,
    pub total_score: i64,
    /// Longest run of consecutive play days ever reached.
    pub best_streak: i64,
    /// Consecutive play days ending on `last_played_on`.
    pub current_streak: i64,
    /// Set semantics; order carries no meaning.
    pub unlocked_achievement_ids: Vec<String>,
    pub level: i64,
    /// Sum of reward points of unlocked achievements.
    pub experience_points: i64,
    /// Points from claimed daily challenges; kept apart from achievement XP.
    pub challenge_points: i64,
    pub last_played_on: Option<NaiveDate>,
    /// Optimistic-concurrency counter for evaluator-owned columns.
    #[serde(skip)]
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.username)
    }

    /// Points that count towards `level`.
    pub fn total_points(&self) -> i64 {
        self.experience_points + self.challenge_points
    }

    pub fn has_unlocked(&self, achievement_id: &str) -> bool {
        self.unlocked_achievement_ids
            .iter()
            .any(|id| id == achievement_id)
    }
}

// ============================================================================
// Game outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Normal,
    Marathon,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Normal => "normal",
            GameMode::Marathon => "marathon",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(GameMode::Normal),
            "marathon" => Some(GameMode::Marathon),
            _ => None,
        }
    }
}

/// A game result as submitted by a client, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSubmission {
    pub user_id: String,
    #[serde(flatten)]
    pub display: DisplayInfo,
    pub category: String,
    pub difficulty: String,
    pub score: u32,
    pub total: u32,
    #[serde(default)]
    pub time_spent: u32,
    #[serde(default)]
    pub hints_used: u32,
    #[serde(default)]
    pub game_mode: GameMode,
    /// Longest run of consecutive correct answers inside the game.
    #[serde(default)]
    pub answer_streak: u32,
    /// Caller-supplied idempotency key.
    #[serde(default)]
    pub submission_id: Option<String>,
}

impl GameSubmission {
    /// Validate the submission and turn it into an unsaved outcome (`id == 0`).
    ///
    /// Display fields are passed through untouched; blank ones must not
    /// overwrite a stored name.
    pub fn into_outcome(self, now: DateTime<Utc>) -> Result<(DisplayInfo, GameOutcome)> {
        let user_id = normalize_user_id(&self.user_id)?;
        if self.total == 0 {
            return Err(ProgressError::invalid("total must be at least 1"));
        }
        if self.score > self.total {
            return Err(ProgressError::invalid(format!(
                "score {} exceeds total {}",
                self.score, self.total
            )));
        }
        if self.answer_streak > self.score {
            return Err(ProgressError::invalid(format!(
                "answer_streak {} exceeds score {}",
                self.answer_streak, self.score
            )));
        }
        let category = self.category.trim().to_lowercase();
        if category.is_empty() {
            return Err(ProgressError::invalid("category is required"));
        }
        let difficulty = self.difficulty.trim().to_lowercase();
        if difficulty.is_empty() {
            return Err(ProgressError::invalid("difficulty is required"));
        }
        let submission_id = self
            .submission_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let score = i64::from(self.score);
        let total = i64::from(self.total);
        let outcome = GameOutcome {
            id: 0,
            user_id,
            category,
            difficulty,
            score,
            total,
            percentage: percentage(score, total),
            time_spent: i64::from(self.time_spent),
            hints_used: i64::from(self.hints_used),
            game_mode: self.game_mode,
            answer_streak: i64::from(self.answer_streak),
            submission_id,
            played_on: now.date_naive(),
            created_at: now.timestamp(),
        };
        Ok((self.display, outcome))
    }
}

/// One completed game. Append-only once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub id: i64,
    pub user_id: String,
    pub category: String,
    pub difficulty: String,
    pub score: i64,
    pub total: i64,
    /// Always `percentage(score, total)`.
    pub percentage: f64,
    pub time_spent: i64,
    pub hints_used: i64,
    pub game_mode: GameMode,
    pub answer_streak: i64,
    pub submission_id: Option<String>,
    pub played_on: NaiveDate,
    pub created_at: i64,
}

impl GameOutcome {
    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.score == self.total
    }

    pub fn reaches(&self, threshold: f64) -> bool {
        self.percentage >= threshold
    }
}

// ============================================================================
// Achievements
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    GamesPlayed,
    PerfectScore,
    CategoryMaster,
    MarathonCompleted,
    AnswerStreak,
    SpeedCompletion,
    DailyStreak,
}

impl ConditionType {
    pub const ALL: [ConditionType; 7] = [
        ConditionType::GamesPlayed,
        ConditionType::PerfectScore,
        ConditionType::CategoryMaster,
        ConditionType::MarathonCompleted,
        ConditionType::AnswerStreak,
        ConditionType::SpeedCompletion,
        ConditionType::DailyStreak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::GamesPlayed => "games_played",
            ConditionType::PerfectScore => "perfect_score",
            ConditionType::CategoryMaster => "category_master",
            ConditionType::MarathonCompleted => "marathon_completed",
            ConditionType::AnswerStreak => "answer_streak",
            ConditionType::SpeedCompletion => "speed_completion",
            ConditionType::DailyStreak => "daily_streak",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "uncommon" => Rarity::Uncommon,
            "rare" => Rarity::Rare,
            "epic" => Rarity::Epic,
            "legendary" => Rarity::Legendary,
            _ => Rarity::Common,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub condition_type: ConditionType,
    pub condition_value: i64,
    pub reward_points: i64,
    pub rarity: Rarity,
}

/// Catalog entry annotated for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub definition: AchievementDefinition,
    pub unlocked: bool,
}

// ============================================================================
// Daily challenges
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    GamesCount,
    CategoryMaster,
    PerfectAnswers,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::GamesCount => "games_count",
            ChallengeType::CategoryMaster => "category_master",
            ChallengeType::PerfectAnswers => "perfect_answers",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "games_count" => Some(ChallengeType::GamesCount),
            "category_master" => Some(ChallengeType::CategoryMaster),
            "perfect_answers" => Some(ChallengeType::PerfectAnswers),
            _ => None,
        }
    }
}

/// A challenge kind with its target, drawn at random once per user per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeTemplate {
    pub challenge_type: ChallengeType,
    pub target_value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyChallenge {
    pub id: i64,
    pub user_id: String,
    pub challenge_date: NaiveDate,
    pub challenge_type: ChallengeType,
    pub target_value: i64,
    pub current_progress: i64,
    pub completed: bool,
    pub reward_claimed: bool,
    pub created_at: i64,
}

/// What a client sees for today's challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeView {
    #[serde(rename = "type")]
    pub challenge_type: ChallengeType,
    pub description: String,
    pub target: i64,
    pub progress: i64,
    pub completed: bool,
    pub reward_claimed: bool,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Claimed { points: i64, challenge_points: i64, level: i64 },
    AlreadyClaimed,
    NotCompleted { progress: i64, target: i64 },
}

// ============================================================================
// Read models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: String,
    pub games: i64,
    pub avg_score: f64,
    pub best_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentGame {
    pub category: String,
    pub difficulty: String,
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub game_mode: GameMode,
    pub played_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub profile: UserProfile,
    pub category_stats: Vec<CategoryStats>,
    pub recent_games: Vec<RecentGame>,
    pub achievements: Vec<AchievementStatus>,
    pub favorite_category: Option<String>,
}

/// Which slice of history a leaderboard ranks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardScope {
    Overall,
    Category(String),
}

impl BoardScope {
    pub fn parse_str(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        if s == "overall" || s.is_empty() {
            BoardScope::Overall
        } else {
            BoardScope::Category(s)
        }
    }

    pub fn label(&self) -> &str {
        match self {
            BoardScope::Overall => "overall",
            BoardScope::Category(c) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: String,
    pub games_played: i64,
    pub avg_percentage: f64,
    pub best_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAverage {
    pub category: String,
    pub games: i64,
    pub avg_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStats {
    pub total_users: i64,
    pub total_games: i64,
    pub total_questions_answered: i64,
    pub category_stats: Vec<CategoryAverage>,
}

/// Result of one game submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub outcome_id: i64,
    pub percentage: f64,
    pub new_achievements: Vec<AchievementDefinition>,
    /// The submission id had already been recorded; nothing changed.
    pub duplicate: bool,
    /// The game was saved but bonus evaluation failed.
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub users_count: i64,
    pub achievements_seeded: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn submission(score: u32, total: u32) -> GameSubmission {
        GameSubmission {
            user_id: " 42 ".into(),
            display: DisplayInfo::default(),
            category: " Science ".into(),
            difficulty: "Easy".into(),
            score,
            total,
            time_spent: 90,
            hints_used: 1,
            game_mode: GameMode::Normal,
            answer_streak: 0,
            submission_id: Some("  ".into()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_percentage_guards_empty_game() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(10, 10), 100.0);
        assert_eq!(percentage(8, 10), 80.0);
        assert_eq!(percentage(4, 5), 80.0);
    }

    #[test]
    fn test_into_outcome_normalizes_fields() {
        let (display, outcome) = submission(9, 10).into_outcome(now()).unwrap();
        assert_eq!(outcome.user_id, "42");
        assert_eq!(outcome.category, "science");
        assert_eq!(outcome.difficulty, "easy");
        assert_eq!(outcome.percentage, 90.0);
        assert_eq!(outcome.submission_id, None);
        assert_eq!(outcome.played_on, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert!(display.first_name.is_empty());
        assert_eq!(display.normalized().first_name, DEFAULT_PLAYER_NAME);
    }

    #[test]
    fn test_into_outcome_rejects_bad_input() {
        assert!(matches!(
            submission(1, 0).into_outcome(now()),
            Err(ProgressError::InvalidInput(_))
        ));
        assert!(matches!(
            submission(11, 10).into_outcome(now()),
            Err(ProgressError::InvalidInput(_))
        ));
        let mut s = submission(5, 10);
        s.user_id = "   ".into();
        assert!(matches!(s.into_outcome(now()), Err(ProgressError::InvalidInput(_))));
        let mut s = submission(5, 10);
        s.answer_streak = 6;
        assert!(matches!(s.into_outcome(now()), Err(ProgressError::InvalidInput(_))));
        let mut s = submission(5, 10);
        s.category = "".into();
        assert!(matches!(s.into_outcome(now()), Err(ProgressError::InvalidInput(_))));
    }

    #[test]
    fn test_submission_json_uses_flat_display_fields() {
        let json = r#"{
            "user_id": "7", "first_name": "Ann", "username": "ann",
            "category": "history", "difficulty": "hard",
            "score": 3, "total": 5, "game_mode": "marathon"
        }"#;
        let s: GameSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(s.display.first_name, "Ann");
        assert_eq!(s.game_mode, GameMode::Marathon);
        assert_eq!(s.time_spent, 0);
        assert!(s.submission_id.is_none());
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(display_name("Ann", "Lee", "al"), "Ann Lee");
        assert_eq!(display_name("", "", "al"), "al");
        assert_eq!(display_name(" ", "", ""), DEFAULT_PLAYER_NAME);
    }

    #[test]
    fn test_condition_type_roundtrip_tags() {
        for c in ConditionType::ALL {
            assert_eq!(ConditionType::parse_str(c.as_str()), Some(c));
        }
        assert_eq!(ConditionType::parse_str("login_count"), None);
    }

    #[test]
    fn test_rarity_orders_by_rank() {
        assert!(Rarity::Common < Rarity::Uncommon);
        assert!(Rarity::Epic < Rarity::Legendary);
    }

    #[test]
    fn test_board_scope_parse() {
        assert_eq!(BoardScope::parse_str("overall"), BoardScope::Overall);
        assert_eq!(
            BoardScope::parse_str(" History "),
            BoardScope::Category("history".into())
        );
    }
}
