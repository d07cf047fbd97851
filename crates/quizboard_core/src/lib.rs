//! Domain model, rules and configuration for the quiz progression engine.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod rules;

pub use catalog::{default_achievements, describe_challenge, pick_template, CHALLENGE_TEMPLATES};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{LoggingConfig, ProgressionConfig, QuizboardConfig, ServerConfig, StoreConfig};
pub use error::{ProgressError, Result};
pub use model::*;
pub use rules::{
    level_for_experience, newly_unlocked, next_day_streak, next_progress, ConditionFn,
    EvaluationContext, ProgressStep,
};
