//! CLI overrides applied on top of file and environment config

use crate::domain::{AnalysisConfig, PreludeMode};

/// Values given on the command line. `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub window_size: Option<usize>,
    pub max_window_expansion: Option<usize>,
    pub enable_external_resolver: Option<bool>,
    pub external_timeout_secs: Option<f64>,
    pub external_model: Option<String>,
    pub external_cost_budget: Option<f64>,
    pub request_deadline_secs: Option<f64>,
    pub deny_list: Option<Vec<String>>,
    pub synthesize_placeholders: Option<bool>,
    pub prelude_mode: Option<PreludeMode>,
    pub enable_cache: Option<bool>,
    pub concurrency: Option<usize>,
}

pub fn merge_cli_with_config(mut config: AnalysisConfig, cli: CliOverrides) -> AnalysisConfig {
    macro_rules! take {
        ($($field:ident),* $(,)?) => {
            $(if let Some(value) = cli.$field {
                config.$field = value;
            })*
        };
    }
    take!(
        window_size,
        max_window_expansion,
        enable_external_resolver,
        external_timeout_secs,
        external_model,
        external_cost_budget,
        deny_list,
        synthesize_placeholders,
        prelude_mode,
        enable_cache,
        concurrency,
    );
    if cli.request_deadline_secs.is_some() {
        config.request_deadline_secs = cli.request_deadline_secs;
    }
    config
}
