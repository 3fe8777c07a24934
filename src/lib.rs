//! snippet-context: make extracted Python snippets runnable on their own.
//!
//! Each snippet is scanned for the names it reads but never binds. Those names
//! are located in nearby snippets, optionally with help from an external
//! language-model resolver, and a prelude is assembled that defines them. The
//! augmented snippet is then checked for unsafe operations and syntax errors.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod render;
pub mod resolve;
pub mod scan;
pub mod synth;
pub mod utils;

pub use domain::{AnalysisConfig, Snippet, SnippetSequence, ValidationResult, ValidationStatus};
pub use pipeline::{AnalysisOutcome, Analyzer};
