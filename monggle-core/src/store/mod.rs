//! Single-owner in-memory stores. Consumers read snapshots through `all()`;
//! every mutation goes through the store's own API.

pub mod records;
pub mod routines;

pub use records::RecordStore;
pub use routines::{RecommendationOutcome, RoutineError, RoutineStore};
