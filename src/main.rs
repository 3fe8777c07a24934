//! snippet-context: resolve cross-snippet dependencies for extracted Python
//! snippets and emit runnable, validated context.

use anyhow::Result;

fn main() -> Result<()> {
    snippet_context::cli::run()
}
