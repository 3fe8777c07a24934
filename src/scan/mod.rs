//! Static dependency scanning for Python snippets

pub mod builtins;
pub mod scanner;
pub mod scope;
pub mod statements;

pub use scanner::{ScanIndex, SnippetScan, StaticScanner};
pub use scope::UsageHints;
pub use statements::{StatementKind, TopLevelStatement};
