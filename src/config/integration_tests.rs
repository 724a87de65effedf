// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod integration_tests {
    use crate::config::{load_and_validate_config, RuntimeBuilder, Strategy};
    use crate::errors::{ConfigError, ValidationError};
    use std::time::Duration;

    /// Test that the worker pool sample configuration loads and validates
    #[test]
    fn test_worker_pool_yaml_loading() {
        let config = load_and_validate_config("configs/worker-pool.yaml").unwrap();

        assert_eq!(config.strategy, Strategy::WorkerPool);
        assert_eq!(config.workers, 4);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.task_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[0].id, "square");
        assert_eq!(config.stages[1].op, "greater_than");
    }

    /// Test that TOML configurations go through the same path
    #[test]
    fn test_fan_out_fan_in_toml_loading() {
        let config = load_and_validate_config("configs/fan-out-fan-in.toml").unwrap();

        assert_eq!(config.strategy, Strategy::FanOutFanIn);
        assert_eq!(config.workers, 3);
        assert_eq!(config.stages[1].id, "times_ten");
    }

    /// Test that every problem in a broken configuration is reported
    #[test]
    fn test_invalid_yaml_reports_every_error() {
        let err = load_and_validate_config("configs/invalid.yaml").unwrap_err();

        let errors = match err {
            ConfigError::Validation(errors) => errors,
            other => panic!("expected validation errors, got {}", other),
        };
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0], ValidationError::ZeroWorkers);
        assert_eq!(
            errors[1],
            ValidationError::DuplicateStageId {
                stage_id: "square".to_string()
            }
        );
        assert!(errors[2].to_string().contains("unknown operation 'cube'"));
        assert!(errors[3].to_string().contains("missing required option 'threshold'"));
    }

    /// Test running each sample configuration end to end
    #[tokio::test]
    async fn test_sample_configs_run_end_to_end() {
        let cases = vec![
            ("configs/worker-pool.yaml", vec![25, 36, 49, 64, 81, 100]),
            ("configs/pipeline.yaml", vec![25, 36, 49, 64, 81, 100]),
            ("configs/fan-out-fan-in.toml", vec![20, 40, 60, 80, 100]),
        ];

        for (path, expected) in cases {
            let config = load_and_validate_config(path).unwrap();
            let runtime = RuntimeBuilder::from_config(&config).unwrap();
            let mut report = runtime.run((1..=10).collect()).await.unwrap();

            report.outputs.sort();
            assert_eq!(report.outputs, expected, "config {}", path);
            assert!(!report.timed_out, "config {}", path);
        }
    }
}
