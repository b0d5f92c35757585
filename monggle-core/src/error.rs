use thiserror::Error;

use crate::models::RecordError;
use crate::store::RoutineError;

#[derive(Error, Debug)]
pub enum MonggleError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record: {0}")]
    Record(#[from] RecordError),

    #[error("Invalid routine: {0}")]
    Routine(#[from] RoutineError),

    #[error("Other error: {0}")]
    Other(String),
}
