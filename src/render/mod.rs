//! Output rendering (report JSON, augmented JSONL)

pub mod jsonl;
pub mod report;

pub use jsonl::render_augmented_jsonl;
pub use report::{build_report, write_report, ExternalUsage};
