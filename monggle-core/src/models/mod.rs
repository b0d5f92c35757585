pub mod chat;
pub mod record;
pub mod routine;

pub use chat::{ChatMessage, Role};
pub use record::{Mood, NewRecord, RecordError, SleepRecord, DATE_FORMAT};
pub use routine::{Recommendation, RoutineItem, SleepGoal, DEFAULT_CUSTOM_ICON, RECOMMENDED_ROUTINES};
