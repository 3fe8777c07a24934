//! Scan command implementation

use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

use super::utils::load_snippets;
use crate::scan::ScanIndex;

#[derive(Args)]
pub struct ScanArgs {
    /// JSON array or JSONL file of {content, index} snippets
    #[arg(value_name = "SNIPPETS")]
    pub snippets: PathBuf,

    /// Print one JSON object per snippet instead of text
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ScanArgs) -> Result<()> {
    let sequence = load_snippets(&args.snippets)?;
    let index = ScanIndex::build(&sequence);

    for snippet_index in sequence.indices() {
        let Some(scan) = index.get(snippet_index) else {
            continue;
        };
        let defines: Vec<&str> = scan.defines.keys().map(String::as_str).collect();
        let syntax = scan.syntax_error.as_ref().map(ToString::to_string);

        if args.json {
            let line = json!({
                "index": snippet_index,
                "defines": scan.defines,
                "free": scan.free,
                "syntax_error": syntax,
            });
            println!("{}", serde_json::to_string(&line)?);
            continue;
        }

        println!("Snippet {}:", snippet_index);
        let defined = if defines.is_empty() { "-".to_string() } else { defines.join(", ") };
        println!("  defines: {}", defined);
        if scan.free.is_empty() {
            println!("  free: -");
        } else {
            let free: Vec<String> =
                scan.free.iter().map(|r| format!("{} ({})", r.name, r.kind)).collect();
            println!("  free: {}", free.join(", "));
        }
        println!("  syntax: {}", syntax.as_deref().unwrap_or("ok"));
    }

    Ok(())
}
