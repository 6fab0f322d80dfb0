//! Load and validate runtime configuration.

use anyhow::{bail, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::fifo::UnmatchedSellPolicy;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LlmCfg {
    pub base_url: String,
    pub model: String,
    pub timeout_sec: u64,
    pub convert_max_tokens: u32,
    pub reply_max_tokens: u32,
    pub api_key_env: String,
}

impl Default for LlmCfg {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            timeout_sec: 30,
            convert_max_tokens: 2000,
            reply_max_tokens: 1000,
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MatchingCfg {
    pub unmatched_sell: UnmatchedSellPolicy,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReportCfg {
    pub top_n: usize,
    pub recent: usize,
    pub format: OutputFormat,
}

impl Default for ReportCfg {
    fn default() -> Self {
        Self {
            top_n: 3,
            recent: 10,
            format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmCfg,
    pub matching: MatchingCfg,
    pub report: ReportCfg,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&s)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Explicit path if given; else `./config.yaml`; else the platform config
    /// dir; else defaults.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(p) = explicit {
            return Self::load(p);
        }
        for candidate in default_paths() {
            if candidate.is_file() {
                info!("Using config {}", candidate.display());
                return Self::load(candidate);
            }
        }
        debug!("No config file found; using defaults");
        Ok(Self::default())
    }

    /// Rerun after applying command-line overrides.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.base_url.trim().is_empty() {
            bail!("llm.base_url must not be empty");
        }
        if self.llm.timeout_sec == 0 {
            bail!("llm.timeout_sec must be > 0");
        }
        if self.report.top_n == 0 {
            bail!("report.top_n must be > 0");
        }
        Ok(())
    }
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("config.yaml")];
    if let Some(dirs) = ProjectDirs::from("", "", "trade-ledger") {
        paths.push(dirs.config_dir().join("config.yaml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_yaml_fills_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "matching:\n  unmatched_sell: carry-short\nreport:\n  format: json").unwrap();
        let cfg = AppConfig::load(f.path()).unwrap();
        assert_eq!(cfg.matching.unmatched_sell, UnmatchedSellPolicy::CarryShort);
        assert_eq!(cfg.report.format, OutputFormat::Json);
        assert_eq!(cfg.report.top_n, 3);
        assert_eq!(cfg.llm, LlmCfg::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "llm:\n  timeout_sec: 0").unwrap();
        let err = AppConfig::load(f.path()).unwrap_err();
        assert!(err.to_string().contains("timeout_sec"));
    }

    #[test]
    fn zero_top_n_override_is_rejected() {
        let mut cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.report.top_n = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("top_n"));
    }

    #[test]
    fn unknown_policy_fails_to_parse() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "matching:\n  unmatched_sell: ignore").unwrap();
        assert!(AppConfig::load(f.path()).is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::resolve(Some(dir.path().join("nope.yaml").as_path())).is_err());
    }
}
