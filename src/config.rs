//! Configuration file handling.
//!
//! Settings come from `.outcome-tracker.toml` (or `--config`), then CLI flags
//! override them.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::outcome::{AggregateOptions, PloRollup};

pub const DEFAULT_CONFIG_FILE: &str = ".outcome-tracker.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable debug logging by default.
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default)]
    pub plo_rollup: PloRollup,

    /// Characters of an LO title kept in table headers.
    #[serde(default = "default_lo_header_width")]
    pub lo_header_width: usize,

    /// Characters of a quiz name kept in table headers.
    #[serde(default = "default_quiz_header_width")]
    pub quiz_header_width: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            plo_rollup: PloRollup::default(),
            lo_header_width: default_lo_header_width(),
            quiz_header_width: default_quiz_header_width(),
        }
    }
}

fn default_lo_header_width() -> usize {
    4
}

fn default_quiz_header_width() -> usize {
    6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_title")]
    pub title: String,

    /// Students listed under "Top Students by PLO".
    #[serde(default = "default_top_students")]
    pub top_students: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            top_students: default_top_students(),
        }
    }
}

fn default_title() -> String {
    "Learning Outcome Report".to_string()
}

fn default_top_students() -> usize {
    10
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Loads `path` when given, else the default file if it exists.
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// CLI values win over the file; unset flags leave the file's value alone.
    pub fn merge_with_args(&mut self, plo_rollup: Option<PloRollup>, verbose: bool) {
        if let Some(plo_rollup) = plo_rollup {
            self.aggregation.plo_rollup = plo_rollup;
        }
        if verbose {
            self.general.verbose = true;
        }
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            plo_rollup: self.aggregation.plo_rollup,
            lo_header_width: self.aggregation.lo_header_width,
        }
    }

    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.aggregation.plo_rollup, PloRollup::Mean);
        assert_eq!(config.aggregation.lo_header_width, 4);
        assert_eq!(config.aggregation.quiz_header_width, 6);
        assert_eq!(config.report.top_students, 10);
        assert!(!config.general.verbose);
    }

    #[test]
    fn parses_partial_file() {
        let content = r#"
[aggregation]
plo_rollup = "legacy"

[report]
title = "CPE Outcomes"
"#;

        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.aggregation.plo_rollup, PloRollup::Legacy);
        assert_eq!(config.aggregation.lo_header_width, 4);
        assert_eq!(config.report.title, "CPE Outcomes");
        assert_eq!(config.report.top_students, 10);
    }

    #[test]
    fn cli_overrides_file() {
        let mut config: Config = toml::from_str("[aggregation]\nplo_rollup = \"legacy\"\n").unwrap();

        config.merge_with_args(None, false);
        assert_eq!(config.aggregate_options().plo_rollup, PloRollup::Legacy);

        config.merge_with_args(Some(PloRollup::Mean), true);
        assert_eq!(config.aggregate_options().plo_rollup, PloRollup::Mean);
        assert!(config.general.verbose);
    }

    #[test]
    fn default_toml_round_trips() {
        let content = Config::default_toml();
        assert!(content.contains("[aggregation]"));
        assert!(content.contains("plo_rollup = \"mean\""));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let loaded = Config::resolve(Some(file.path())).unwrap();
        assert_eq!(loaded.report.title, "Learning Outcome Report");
    }

    #[test]
    fn rejects_unknown_policy() {
        let result: Result<Config, _> = toml::from_str("[aggregation]\nplo_rollup = \"median\"\n");
        assert!(result.is_err());
    }
}
