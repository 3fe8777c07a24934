//! Analyze command implementation

use anyhow::{Context, Result};
use clap::Args;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::utils::{load_snippets, parse_csv};
use crate::config::{load_config, merge_cli_with_config, CliOverrides};
use crate::domain::PreludeMode;
use crate::pipeline::{AnalysisOutcome, Analyzer};
use crate::render::{build_report, render_augmented_jsonl, write_report, ExternalUsage};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// JSON array or JSONL file of {content, index} snippets
    #[arg(value_name = "SNIPPETS")]
    pub snippets: PathBuf,

    /// Analyze only these snippet indices (repeatable or comma-separated)
    #[arg(long = "index", value_name = "N", value_delimiter = ',')]
    pub indices: Vec<usize>,

    /// Path to config file (snippet-context.toml or .snippet-context.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base search radius around each target
    #[arg(short = 'w', long, value_name = "N")]
    pub window_size: Option<usize>,

    /// Widest radius the window may expand to
    #[arg(long, value_name = "N")]
    pub max_window_expansion: Option<usize>,

    /// Never consult the external resolver
    #[arg(long)]
    pub no_external: bool,

    /// Per-attempt timeout for the external resolver
    #[arg(long, value_name = "SECS")]
    pub external_timeout: Option<f64>,

    /// Model name for the external resolver
    #[arg(long, value_name = "MODEL")]
    pub external_model: Option<String>,

    /// Total USD the external resolver may spend in this run
    #[arg(long, value_name = "USD")]
    pub cost_budget: Option<f64>,

    /// Deadline for one request's external step
    #[arg(long, value_name = "SECS")]
    pub request_deadline: Option<f64>,

    /// Operations the gate rejects (comma-separated, replaces the default list)
    #[arg(long, value_name = "OPS")]
    pub deny_list: Option<String>,

    /// Report residual names as unresolved instead of synthesizing placeholders
    #[arg(long)]
    pub no_placeholders: bool,

    /// Keep only imports, definitions and assignments of covering snippets
    #[arg(long)]
    pub definitions_only: bool,

    /// Disable the result cache
    #[arg(long)]
    pub no_cache: bool,

    /// Requests analyzed concurrently
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Write report.json and augmented.jsonl here instead of printing the report
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Omit generated_at from the report
    #[arg(long)]
    pub no_timestamp: bool,
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let loaded = load_config(&cwd, args.config.as_deref())?;

    let cli_overrides = CliOverrides {
        window_size: args.window_size,
        max_window_expansion: args.max_window_expansion,
        enable_external_resolver: if args.no_external { Some(false) } else { None },
        external_timeout_secs: args.external_timeout,
        external_model: args.external_model.clone(),
        external_cost_budget: args.cost_budget,
        request_deadline_secs: args.request_deadline,
        deny_list: parse_csv(&args.deny_list),
        synthesize_placeholders: if args.no_placeholders { Some(false) } else { None },
        prelude_mode: if args.definitions_only { Some(PreludeMode::Definitions) } else { None },
        enable_cache: if args.no_cache { Some(false) } else { None },
        concurrency: args.concurrency,
    };
    let config = merge_cli_with_config(loaded, cli_overrides);
    config.validate().context("Invalid configuration")?;

    let sequence = load_snippets(&args.snippets)?;
    let indices = if args.indices.is_empty() { sequence.indices() } else { args.indices.clone() };
    for index in &indices {
        if sequence.get(*index).is_none() {
            anyhow::bail!("No snippet with index {} in {}", index, args.snippets.display());
        }
    }

    let analyzer = Analyzer::from_config(config, sequence)
        .context("Failed to set up the external resolver")?;
    let config_value = analyzer.config().to_report_value();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let outcomes = runtime.block_on(analyze_all(&analyzer, indices))?;

    let usage = analyzer
        .cost_ledger()
        .map(|ledger| ExternalUsage { calls: ledger.calls(), spent_usd: ledger.spent() })
        .unwrap_or_default();

    match &args.output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed creating output directory: {}", dir.display()))?;
            let report_path = dir.join("report.json");
            let jsonl_path = dir.join("augmented.jsonl");
            write_report(&report_path, &outcomes, &config_value, usage, !args.no_timestamp)?;
            std::fs::write(&jsonl_path, render_augmented_jsonl(&outcomes))
                .with_context(|| format!("Failed writing {}", jsonl_path.display()))?;

            println!("{}", summary_line(&outcomes));
            println!("  report: {}", report_path.display());
            println!("  augmented: {}", jsonl_path.display());
        }
        None => {
            let report = build_report(&outcomes, &config_value, usage, !args.no_timestamp);
            println!("{}", serde_json::to_string_pretty(&report)?);
            eprintln!("{}", summary_line(&outcomes));
        }
    }

    Ok(())
}

async fn analyze_all(analyzer: &Analyzer, indices: Vec<usize>) -> Result<Vec<AnalysisOutcome>> {
    let pb = ProgressBar::new(indices.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-"),
    );

    let mut outcomes = Vec::with_capacity(indices.len());
    let mut results = Box::pin(analyzer.analyze_stream(indices));
    while let Some((index, result)) = results.next().await {
        let outcome = result.with_context(|| format!("Analysis of snippet {index} failed"))?;
        pb.set_message(format!("#{index} {}", outcome.result.status));
        pb.inc(1);
        outcomes.push(outcome);
    }
    pb.finish_and_clear();

    outcomes.sort_by_key(|o| o.index);
    Ok(outcomes)
}

fn summary_line(outcomes: &[AnalysisOutcome]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for outcome in outcomes {
        *counts.entry(outcome.result.status.as_str()).or_default() += 1;
    }
    let external = outcomes.iter().filter(|o| o.result.used_external).count();
    let parts: Vec<String> = counts.iter().map(|(status, n)| format!("{status}: {n}")).collect();
    format!(
        "Analyzed {} snippets ({}); external resolver used for {}",
        outcomes.len(),
        parts.join(", "),
        external
    )
}
