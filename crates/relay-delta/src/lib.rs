//! Incremental delta between the previous run and the current state of a subject.

pub mod activity_source;
pub mod delta_builder;
pub mod delta_model;

pub use activity_source::SubjectActivitySource;
pub use delta_builder::{
    build_delta, DeltaOutcome, DeltaRequest, DeltaSummary, BASELINE_COMMIT_COUNT, MAX_ITEMS,
};
pub use delta_model::Delta;
