use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ReviewError;
use crate::labeler::{RetryPolicy, DEFAULT_BATCH_SIZE};
use crate::report::{ReportConfig, Smoothing};
use crate::rules::RuleTable;

/// Env var consulted when `--config` is not given.
pub const CONFIG_ENV: &str = "REVIEW_LENS_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub report: ReportConfig,
    pub rules: RuleTable,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL; `chat/completions` is appended.
    pub api_base: String,
    pub model: String,
    /// Name of the env var holding the bearer token, not the token itself.
    pub api_key_env: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: "https://models.inference.ai.azure.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "GITHUB_TOKEN".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

impl AppConfig {
    /// `--config` wins, then `$REVIEW_LENS_CONFIG`, then built-in defaults.
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        let path = match cli_path {
            Some(p) => {
                debug!("Using config file from --config argument: {}", p.display());
                Some(p.to_path_buf())
            }
            None => std::env::var_os(CONFIG_ENV).map(|p| {
                let p = PathBuf::from(p);
                debug!("Using config file from {}: {}", CONFIG_ENV, p.display());
                p
            }),
        };
        match path {
            Some(p) => Self::load(&p),
            None => {
                debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: AppConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.backend.batch_size == 0 {
            return Err(ReviewError::InvalidConfig("backend.batch_size must be at least 1".into()));
        }
        if self.backend.retry.max_attempts == 0 {
            return Err(ReviewError::InvalidConfig(
                "backend.retry.max_attempts must be at least 1".into(),
            ));
        }
        if let Smoothing::Fixed(0) = self.report.smoothing {
            return Err(ReviewError::InvalidConfig("report.smoothing width must be at least 1".into()));
        }
        if let Some(rule) = self.rules.rules().iter().find(|r| r.name.trim().is_empty()) {
            return Err(ReviewError::InvalidConfig(format!(
                "rule with patterns {:?} has an empty name",
                rule.patterns
            )));
        }
        // surfaces bad patterns at load time rather than at classification
        self.rules.compile()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_means_defaults() {
        let cfg: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.backend.batch_size, 40);
        assert_eq!(cfg.report.negative_excerpts, 8);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let yaml = r#"
report:
  recent_buckets: 6
backend:
  model: gpt-4o
  retry:
    max_attempts: 5
rules:
  - name: Docs
    patterns: ['\bdocs?\b']
"#;
        let cfg: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.report.recent_buckets, 6);
        assert_eq!(cfg.report.positive_excerpts, 5);
        assert_eq!(cfg.backend.model, "gpt-4o");
        assert_eq!(cfg.backend.api_key_env, "GITHUB_TOKEN");
        assert_eq!(cfg.backend.retry.max_attempts, 5);
        assert_eq!(cfg.backend.retry.batch_pause_ms, 500);
        assert_eq!(cfg.rules.rules().len(), 1);
        cfg.validate().unwrap();
    }

    #[test]
    fn load_rejects_bad_pattern() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "rules:\n  - name: Broken\n    patterns: ['(oops']").unwrap();
        let err = AppConfig::load(f.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Broken"));
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let mut cfg = AppConfig::default();
        cfg.backend.batch_size = 0;
        assert!(matches!(cfg.validate(), Err(ReviewError::InvalidConfig(_))));
    }

    #[test]
    fn explicit_path_wins() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "report:\n  excerpt_chars: 80").unwrap();
        let cfg = AppConfig::resolve(Some(f.path())).unwrap();
        assert_eq!(cfg.report.excerpt_chars, 80);
    }
}
