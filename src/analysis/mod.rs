//! Candidate search and dependency merging

pub mod merge;
pub mod window;

pub use merge::{ConflictPolicy, DependencyMerger, DiscardReason, MergeInput, MergeOutcome};
pub use window::{Selection, Window, WindowSelector};
