pub mod analytics;
pub mod chat;
pub mod config;
pub mod error;
pub mod interpret;
pub mod models;
pub mod prompt;
pub mod store;
pub mod wire;

pub use analytics::{AnalyticsReport, Period, PeriodBucket, StageDistribution};
pub use chat::{ChatError, ChatSession, PendingTurn, SessionState};
pub use config::MonggleConfig;
pub use error::MonggleError;
pub use interpret::{
    GeminiGenerator, InterpretError, InterpretOutcome, InterpretationClient,
    InterpretationSections, RemoteInterpreter, TextGenerator, FALLBACK_TEXT, NO_RESULT_TEXT,
};
pub use models::{ChatMessage, Mood, NewRecord, RecordError, Role, RoutineItem, SleepGoal, SleepRecord};
pub use prompt::InterpretPrompt;
pub use store::{RecommendationOutcome, RecordStore, RoutineError, RoutineStore};
