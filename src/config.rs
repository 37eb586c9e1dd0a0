//! Configuration for mining and filtering runs
//!
//! Settings live in an optional `vulnurl.toml`. Every section and key is
//! optional; anything missing falls back to the defaults below.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "vulnurl.toml";

/// Default number of dataset rows fetched per batch
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub filter: FilterConfig,
}

/// How repeated links between one file and one URL are persisted
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// One link per (file, URL) pair; repeats are ignored
    #[default]
    Distinct,
    /// One link per pair, with `occurrences` counting every repeat
    CountOccurrences,
}

/// Batch pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Rows fetched from the source dataset per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            duplicate_policy: DuplicatePolicy::Distinct,
        }
    }
}

/// Allow-list rules for the filter pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterConfig {
    /// Hosts (network locations) accepted regardless of path
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Path regexes that accept a URL, matched from the start of the path
    #[serde(default = "default_allowed_path_patterns")]
    pub allowed_path_patterns: Vec<String>,

    /// Path regexes that reject a URL; checked before anything else
    #[serde(default = "default_blocked_path_patterns")]
    pub blocked_path_patterns: Vec<String>,
}

fn default_allowed_hosts() -> Vec<String> {
    [
        "github.com",
        "gitlab.com",
        "bitbucket.org",
        "gist.github.com",
        "stackoverflow.com",
        "reddit.com",
        "dev.to",
        "pastebin.com",
        "hastebin.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_allowed_path_patterns() -> Vec<String> {
    [
        r".*\.(py|js|java|cpp)$",
        r".*/src/.*",
        r".*/examples?/.*",
        r".*/blob/.*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_blocked_path_patterns() -> Vec<String> {
    [
        r".*/LICENSE.*",
        r".*/README.*",
        r".*/docs?/.*",
        r".*/issues/.*",
        r".*/blog/.*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
            allowed_path_patterns: default_allowed_path_patterns(),
            blocked_path_patterns: default_blocked_path_patterns(),
        }
    }
}

const DEFAULT_CONFIG_TOML: &str = r#"[pipeline]
batch_size = 500  # Dataset rows fetched per batch
duplicate_policy = "distinct"  # "distinct" or "count_occurrences"

[filter]
allowed_hosts = [
    "github.com", "gitlab.com", "bitbucket.org", "gist.github.com",
    "stackoverflow.com", "reddit.com", "dev.to",
    "pastebin.com", "hastebin.com",
]
allowed_path_patterns = [
    '.*\.(py|js|java|cpp)$',
    '.*/src/.*',
    '.*/examples?/.*',
    '.*/blob/.*',
]
blocked_path_patterns = [
    '.*/LICENSE.*',
    '.*/README.*',
    '.*/docs?/.*',
    '.*/issues/.*',
    '.*/blog/.*',
]
"#;

impl Config {
    /// Load configuration from `path`, or from `vulnurl.toml` when `None`
    ///
    /// A missing default file yields the defaults. A missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        if !config_path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", config_path.display());
            }
            log::debug!("No {} found, using default config", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }

        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config = Self::from_toml(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        log::debug!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        if config.pipeline.batch_size == 0 {
            anyhow::bail!("[pipeline] batch_size must be greater than zero");
        }
        Ok(config)
    }

    /// Write a commented default config file, refusing to overwrite one
    pub fn write_default(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }

        std::fs::write(path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        log::info!("Wrote default config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_template_matches_defaults() {
        let parsed = Config::from_toml(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_section() {
        let config = Config::from_toml(
            r#"
[pipeline]
duplicate_policy = "count_occurrences"

[filter]
allowed_hosts = ["example.org"]
"#,
        )
        .unwrap();

        assert_eq!(config.pipeline.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.pipeline.duplicate_policy, DuplicatePolicy::CountOccurrences);
        assert_eq!(config.filter.allowed_hosts, vec!["example.org"]);
        assert_eq!(
            config.filter.blocked_path_patterns,
            default_blocked_path_patterns()
        );
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(Config::from_toml("[pipeline]\nbatch_size = 0\n").is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(Config::from_toml("[pipeline]\nduplicate_policy = \"sometimes\"\n").is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_write_default_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_CONFIG_FILE);

        Config::write_default(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), Config::default());

        // Second write must not clobber the file
        assert!(Config::write_default(&path).is_err());
    }
}
