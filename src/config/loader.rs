//! Config file discovery, parsing and the environment layer

use crate::domain::AnalysisConfig;
use anyhow::{Context, Result};
use figment::providers::{Env, Serialized};
use figment::Figment;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of environment variables that override file values,
/// e.g. `SNIPPET_CONTEXT_WINDOW_SIZE=30`.
pub const ENV_PREFIX: &str = "SNIPPET_CONTEXT_";

const SECTION: &str = "snippet-context";

const CANDIDATES: [&str; 6] = [
    "snippet-context.toml",
    ".snippet-context.toml",
    "snippet-context.yml",
    "snippet-context.yaml",
    ".snippet-context.yml",
    ".snippet-context.yaml",
];

/// Load file config (explicit or discovered under `root`) and apply the
/// environment layer on top.
pub fn load_config(root: &Path, config_path: Option<&Path>) -> Result<AnalysisConfig> {
    let from_file = load_file_config(root, config_path)?;
    apply_env(from_file)
}

/// File layer only. Explicit files must parse; a broken auto-discovered file
/// is reported and ignored.
pub fn load_file_config(root: &Path, config_path: Option<&Path>) -> Result<AnalysisConfig> {
    let explicit = config_path.is_some();

    let config_file = config_path.map(Path::to_path_buf).or_else(|| discover_config(root));
    let Some(config_file) = config_file else {
        return Ok(AnalysisConfig::default());
    };

    let parsed = fs::read_to_string(&config_file)
        .with_context(|| format!("Failed reading config file: {}", config_file.display()))
        .and_then(|content| parse_by_extension(&content, &config_file));

    match parsed {
        Ok(cfg) => {
            tracing::debug!(path = %config_file.display(), "loaded config file");
            Ok(cfg)
        }
        Err(e) if explicit => Err(e),
        Err(e) => {
            tracing::warn!("Ignoring auto-discovered config {}: {:#}", config_file.display(), e);
            Ok(AnalysisConfig::default())
        }
    }
}

pub fn apply_env(config: AnalysisConfig) -> Result<AnalysisConfig> {
    layer_env(config, Env::prefixed(ENV_PREFIX))
}

fn layer_env(config: AnalysisConfig, env: Env) -> Result<AnalysisConfig> {
    Figment::from(Serialized::defaults(config))
        .merge(env)
        .extract()
        .context("Invalid configuration in environment")
}

fn parse_by_extension(content: &str, config_file: &Path) -> Result<AnalysisConfig> {
    let ext = config_file.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "toml" => parse_toml_config(content, config_file),
        "yaml" | "yml" => parse_yaml_config(content, config_file),
        other => anyhow::bail!(
            "Unsupported config extension '.{}' for file {}",
            other,
            config_file.display()
        ),
    }
}

/// TOML, optionally nested under `[snippet-context]`.
fn parse_toml_config(content: &str, config_file: &Path) -> Result<AnalysisConfig> {
    let raw: toml::Value = toml::from_str(content)
        .with_context(|| format!("Invalid TOML syntax: {}", config_file.display()))?;
    let section = raw.get(SECTION).cloned().unwrap_or(raw);
    section.try_into().with_context(|| format!("Invalid TOML config: {}", config_file.display()))
}

fn parse_yaml_config(content: &str, config_file: &Path) -> Result<AnalysisConfig> {
    let raw: serde_yaml::Value = serde_yaml::from_str(content)
        .with_context(|| format!("Invalid YAML syntax: {}", config_file.display()))?;
    // An empty file parses as null
    if raw.is_null() {
        return Ok(AnalysisConfig::default());
    }
    let section = raw.get(SECTION).cloned().unwrap_or(raw);
    serde_yaml::from_value(section)
        .with_context(|| format!("Invalid YAML config: {}", config_file.display()))
}

fn discover_config(root: &Path) -> Option<PathBuf> {
    CANDIDATES.iter().map(|name| root.join(name)).find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PreludeMode;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_nothing_is_found() {
        let tmp = TempDir::new().expect("tmp");
        let cfg = load_file_config(tmp.path(), None).expect("config");
        assert_eq!(cfg, AnalysisConfig::default());
    }

    #[test]
    fn test_discovers_toml() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(
            tmp.path().join("snippet-context.toml"),
            "window_size = 8\nenable_external_resolver = false\nprelude_mode = 'definitions'\n",
        )
        .expect("write");

        let cfg = load_file_config(tmp.path(), None).expect("config");
        assert_eq!(cfg.window_size, 8);
        assert!(!cfg.enable_external_resolver);
        assert_eq!(cfg.prelude_mode, PreludeMode::Definitions);
        assert_eq!(cfg.max_window_expansion, AnalysisConfig::default().max_window_expansion);
    }

    #[test]
    fn test_nested_section_in_yaml() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(
            tmp.path().join(".snippet-context.yaml"),
            "snippet-context:\n  external_timeout: 2.5\n  deny_list: [eval, exec]\n",
        )
        .expect("write");

        let cfg = load_file_config(tmp.path(), None).expect("config");
        assert_eq!(cfg.external_timeout_secs, 2.5);
        assert_eq!(cfg.deny_list, vec!["eval", "exec"]);
    }

    #[test]
    fn test_deny_list_accepts_comma_separated_string() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "deny_list = \"os.system,  pickle.loads , \"\n").expect("write");

        let cfg = load_file_config(tmp.path(), Some(&path)).expect("config");
        assert_eq!(cfg.deny_list, vec!["os.system", "pickle.loads"]);
    }

    #[test]
    fn test_explicit_config_invalid_type_returns_err() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "window_size = \"wide\"\n").expect("write");

        assert!(load_file_config(tmp.path(), Some(&path)).is_err());
    }

    #[test]
    fn test_explicit_config_unsupported_extension_returns_err() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("settings.ini");
        fs::write(&path, "window_size = 3\n").expect("write");

        let err = load_file_config(tmp.path(), Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Unsupported config extension"));
    }

    #[test]
    fn test_auto_discovered_invalid_config_falls_back_to_default() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("snippet-context.toml"), "deny_list = [\"eval\", 3]\n")
            .expect("write");

        let cfg = load_file_config(tmp.path(), None).expect("should not error on auto-discovery");
        assert_eq!(cfg, AnalysisConfig::default());
    }

    #[test]
    fn test_env_layer_overrides_file_values() {
        std::env::set_var("SNIPPET_CONTEXT_LOADER_TEST_WINDOW_SIZE", "7");
        std::env::set_var("SNIPPET_CONTEXT_LOADER_TEST_EXTERNAL_OVERRIDE_THRESHOLD", "0.9");

        let file = AnalysisConfig { window_size: 12, concurrency: 3, ..Default::default() };
        let cfg =
            layer_env(file, Env::prefixed("SNIPPET_CONTEXT_LOADER_TEST_")).expect("env layer");

        assert_eq!(cfg.window_size, 7);
        assert_eq!(cfg.concurrency, 3);
        assert_eq!(cfg.external_override_threshold, Some(0.9));
    }
}
