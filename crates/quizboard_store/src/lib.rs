pub mod sqlite;
pub mod profiles;
pub mod achievements;
pub mod challenges;
pub mod leaderboard;
pub mod locks;
pub mod progression;

pub use sqlite::{SqliteStore, StoreResultExt};
pub use profiles::{favorite_category, ProfileManager, RecordedGame};
pub use achievements::AchievementEvaluator;
pub use challenges::{challenge_view, DailyChallengeTracker};
pub use leaderboard::LeaderboardAggregator;
pub use locks::UserLocks;
pub use progression::ProgressionEngine;
