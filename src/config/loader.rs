// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_QUEUE_CAPACITY, DEFAULT_RECEIVE_TIMEOUT_MS, DEFAULT_WORKERS};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for a conduit run.
///
/// Selects the execution strategy, sizes the queues and workers, and lists
/// the stages every input value passes through. It is loaded from a YAML or
/// TOML file.
///
/// # Fields
/// * `strategy` - How the stages are executed
/// * `queue_capacity` - Capacity of every queue the runtime creates (optional, 0 = rendezvous)
/// * `workers` - Pool size, or branch count for `fan_out_fan_in` (optional)
/// * `receive_timeout_ms` - How long the consumer waits for the next output (optional)
/// * `task_timeout_ms` - Per-task limit for `worker_pool` handlers (optional, unbounded if absent)
/// * `stages` - Ordered stage definitions
///
/// # Example
/// ```yaml
/// strategy: pipeline
/// queue_capacity: 4
/// receive_timeout_ms: 2000
/// stages:
///   - id: square
///     op: square
///   - id: big_only
///     op: greater_than
///     options:
///       threshold: 20
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    pub strategy: Strategy,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    #[serde(default)]
    pub task_timeout_ms: Option<u64>,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_receive_timeout_ms() -> u64 {
    DEFAULT_RECEIVE_TIMEOUT_MS
}

impl Config {
    /// A config for `strategy` with default sizing and no stages.
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: DEFAULT_WORKERS,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            task_timeout_ms: None,
            stages: Vec::new(),
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }
}

/// How the configured stages are executed.
///
/// # Variants
/// * `WorkerPool` - A pool of `workers` applies the whole stage chain to each task
/// * `Pipeline` - One task per stage, connected by queues
/// * `FanOutFanIn` - Round-robin across `workers` pipelines, merged back into one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    WorkerPool,
    Pipeline,
    FanOutFanIn,
}

impl Strategy {
    /// Whether the strategy is meaningless without stages
    pub fn requires_stages(&self) -> bool {
        matches!(self, Strategy::Pipeline | Strategy::FanOutFanIn)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::WorkerPool => "worker_pool",
            Strategy::Pipeline => "pipeline",
            Strategy::FanOutFanIn => "fan_out_fan_in",
        };
        write!(f, "{}", name)
    }
}

/// Configuration for a single stage.
///
/// # Fields
/// * `id` - Unique identifier, used in logs and stage reports
/// * `op` - Built-in operation name (see `LocalStageFactory::list_available_operations`)
/// * `options` - Operation-specific options such as `threshold` or `amount`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StageConfig {
    pub id: String,
    pub op: String,
    #[serde(default)]
    pub options: HashMap<String, serde_yaml::Value>, // op-specific options
}

/// Load a config file, choosing the parser by extension (`.yaml`, `.yml`, `.toml`)
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let is_toml = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => false,
        Some("toml") => true,
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if is_toml {
        Config::from_toml_str(&content)
    } else {
        Config::from_yaml_str(&content)
    }
}

/// Load and validate a config file
///
/// Every validation problem is reported at once, not just the first.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_config(&cfg).map_err(ConfigError::Validation)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_basic_config() {
        let yaml = r#"
strategy: pipeline
stages:
  - id: square
    op: square
  - id: big
    op: greater_than
    options:
      threshold: 20
"#;

        let cfg = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.strategy, Strategy::Pipeline);
        assert_eq!(cfg.stages.len(), 2);
        assert_eq!(cfg.stages[1].options.get("threshold").and_then(|v| v.as_i64()), Some(20));
    }

    #[test]
    fn test_defaults_applied() {
        let cfg = Config::from_yaml_str("strategy: worker_pool").unwrap();
        assert_eq!(cfg, Config::new(Strategy::WorkerPool));
        assert_eq!(cfg.receive_timeout(), Duration::from_millis(DEFAULT_RECEIVE_TIMEOUT_MS));
        assert_eq!(cfg.task_timeout(), None);
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
strategy = "fan_out_fan_in"
workers = 3
task_timeout_ms = 250

[[stages]]
id = "plus_ten"
op = "add"
options = { amount = 10 }
"#;

        let cfg = Config::from_toml_str(toml).unwrap();
        assert_eq!(cfg.strategy, Strategy::FanOutFanIn);
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.task_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(cfg.stages[0].options.get("amount").and_then(|v| v.as_i64()), Some(10));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let err = Config::from_yaml_str("strategy: reactive").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_strategy_display_matches_config_names() {
        for (strategy, name) in [
            (Strategy::WorkerPool, "worker_pool"),
            (Strategy::Pipeline, "pipeline"),
            (Strategy::FanOutFanIn, "fan_out_fan_in"),
        ] {
            assert_eq!(strategy.to_string(), name);
            let parsed: Strategy = serde_yaml::from_str(name).unwrap();
            assert_eq!(parsed, strategy);
        }
    }

    #[test]
    fn test_load_config_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "strategy: pipeline\nworkers: 2").unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.workers, 2);
    }

    #[test]
    fn test_load_config_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("does/not/exist.yaml"));
    }

    #[test]
    fn test_load_and_validate_reports_all_errors() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "strategy: pipeline\nworkers: 0\nreceive_timeout_ms: 0\nstages: []"
        )
        .unwrap();

        let err = load_and_validate_config(file.path()).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation failure, got {}", other),
        }
    }
}
