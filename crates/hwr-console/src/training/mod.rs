//! Training domain types
//!
//! Requests sent to the training service, events received from it, and the
//! run tracker that folds those events into a summary.

pub mod event;
pub mod request;
pub mod run;

pub use event::{
    EventKind, TrainingComplete, TrainingEvent, TrainingProgress, TrainingStarted, START_TRAINING,
    STOP_TRAINING,
};
pub use request::{CanonicalTrainingRequest, InvalidRequest, TrainingRequest};
pub use run::{RunPhase, RunTracker};
