//! Small shared helpers

pub mod hashing;
pub mod tokens;

pub use hashing::content_hash;
pub use tokens::estimate_tokens;
