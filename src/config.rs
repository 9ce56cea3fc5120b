//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/activity.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//!
//! [query]
//! default_page_size = 20
//! max_page_size = 500
//! stats_window_hours = 24
//! stats_cache_ttl_secs = 0
//! timeout_secs = 30
//!
//! [stats]
//! tool_rule = "prefix"
//! tool_separator = ":"
//! files_processed = "max"
//! ```
//!
//! Only `[db]` is required. Every other section falls back to the defaults
//! shown above.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use agent_activity_core::reconstruct::ProgressPolicy;
use agent_activity_core::tools::ToolRule;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
    #[serde(default = "default_stats_window_hours")]
    pub stats_window_hours: i64,
    /// Zero disables the statistics cache.
    #[serde(default)]
    pub stats_cache_ttl_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            stats_window_hours: default_stats_window_hours(),
            stats_cache_ttl_secs: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_page_size() -> i64 {
    20
}
fn default_max_page_size() -> i64 {
    500
}
fn default_stats_window_hours() -> i64 {
    24
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    /// `prefix`, `regex`, or `none`.
    #[serde(default = "default_tool_rule")]
    pub tool_rule: String,
    #[serde(default = "default_tool_separator")]
    pub tool_separator: String,
    #[serde(default)]
    pub tool_pattern: Option<String>,
    /// `max` or `sum`.
    #[serde(default = "default_files_processed")]
    pub files_processed: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            tool_rule: default_tool_rule(),
            tool_separator: default_tool_separator(),
            tool_pattern: None,
            files_processed: default_files_processed(),
        }
    }
}

fn default_tool_rule() -> String {
    "prefix".to_string()
}
fn default_tool_separator() -> String {
    ":".to_string()
}
fn default_files_processed() -> String {
    "max".to_string()
}

impl StatsConfig {
    pub fn tool_rule(&self) -> Result<ToolRule> {
        let rule = match self.tool_rule.as_str() {
            "none" => ToolRule::None,
            "prefix" => ToolRule::prefix(self.tool_separator.clone())?,
            "regex" => match &self.tool_pattern {
                Some(pattern) => ToolRule::regex(pattern)?,
                None => bail!("stats.tool_pattern is required when stats.tool_rule is 'regex'"),
            },
            other => bail!(
                "Unknown stats.tool_rule: '{}'. Must be prefix, regex, or none.",
                other
            ),
        };
        Ok(rule)
    }

    pub fn progress_policy(&self) -> Result<ProgressPolicy> {
        match self.files_processed.as_str() {
            "max" => Ok(ProgressPolicy::Max),
            "sum" => Ok(ProgressPolicy::Sum),
            other => bail!(
                "Unknown stats.files_processed: '{}'. Must be max or sum.",
                other
            ),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let q = &config.query;
    if q.default_page_size < 1 {
        bail!("query.default_page_size must be >= 1");
    }
    if q.max_page_size < q.default_page_size {
        bail!("query.max_page_size must be >= query.default_page_size");
    }
    if !(1..=720).contains(&q.stats_window_hours) {
        bail!("query.stats_window_hours must be in [1, 720]");
    }
    if q.timeout_secs == 0 {
        bail!("query.timeout_secs must be > 0");
    }

    config.stats.tool_rule()?;
    config.stats.progress_policy()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse("[db]\npath = \"/tmp/a.sqlite\"\n");
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
        assert_eq!(cfg.query.default_page_size, 20);
        assert_eq!(cfg.query.stats_window_hours, 24);
        assert_eq!(cfg.query.stats_cache_ttl_secs, 0);
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.stats.progress_policy().unwrap(), ProgressPolicy::Max);
        assert!(matches!(
            cfg.stats.tool_rule().unwrap(),
            ToolRule::Prefix { .. }
        ));
    }

    #[test]
    fn test_regex_rule_requires_pattern() {
        let cfg = parse("[db]\npath = \"a\"\n[stats]\ntool_rule = \"regex\"\n");
        assert!(validate(&cfg).is_err());

        let cfg = parse(
            "[db]\npath = \"a\"\n[stats]\ntool_rule = \"regex\"\ntool_pattern = \"^(\\\\w+)\"\n",
        );
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_rejects_unknown_policy_and_bad_pages() {
        let cfg = parse("[db]\npath = \"a\"\n[stats]\nfiles_processed = \"avg\"\n");
        assert!(validate(&cfg).is_err());

        let cfg = parse("[db]\npath = \"a\"\n[query]\ndefault_page_size = 0\n");
        assert!(validate(&cfg).is_err());

        let cfg = parse("[db]\npath = \"a\"\n[query]\nstats_window_hours = 0\n");
        assert!(validate(&cfg).is_err());
    }
}
