// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context};
use std::env;
use the_conduit::config::{load_and_validate_config, RunReport, RuntimeBuilder};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Parsed command line
struct Args {
    config_path: String,
    json: bool,
    inputs: Vec<i64>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} <config.yaml|config.toml> [--json] [numbers...]\n\
         Example: {} configs/pipeline.yaml 1 2 3 4 5 6\n\
         Without numbers, 1 through 10 are used.",
        program, program
    )
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let program = args.first().map(String::as_str).unwrap_or("the-conduit");
    let mut config_path = None;
    let mut json = false;
    let mut inputs = Vec::new();

    for arg in args.iter().skip(1) {
        if arg == "--json" {
            json = true;
        } else if config_path.is_none() {
            config_path = Some(arg.clone());
        } else {
            let value = arg
                .parse::<i64>()
                .with_context(|| format!("input '{}' is not an integer", arg))?;
            inputs.push(value);
        }
    }

    let Some(config_path) = config_path else {
        bail!(usage(program));
    };
    if inputs.is_empty() {
        inputs = (1..=10).collect();
    }

    Ok(Args {
        config_path,
        json,
        inputs,
    })
}

/// Logs go to stderr so `--json` output on stdout stays machine readable.
fn init_logging() {
    // Defaults to INFO if RUST_LOG is not set
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &RunReport) {
    println!("🚀 Conduit run: {}", report.strategy);
    println!("═══════════════════════════════════");
    println!("Inputs:  {}", report.inputs);
    println!("Outputs: {:?}", report.outputs);

    if let Some(pool) = &report.pool {
        println!("Pool:    {} processed, {} failed", pool.processed, pool.failed);
    }
    for stage in &report.stages {
        println!(
            "  {:<20} {:>5} in {:>5} out  ({})",
            stage.id, stage.received, stage.forwarded, stage.state
        );
    }
    for failure in &report.failures {
        println!(
            "❌ task {} on worker {}: {}",
            failure.task_id, failure.worker_id, failure.error
        );
    }
    if report.timed_out {
        println!("⏱️  Gave up waiting for output; results are partial");
    }
    println!("Finished in {} ms", report.duration_ms);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let args = parse_args(&args)?;

    let config = load_and_validate_config(&args.config_path)
        .with_context(|| format!("loading {}", args.config_path))?;
    let runtime = RuntimeBuilder::from_config(&config)?;

    // Ctrl-C stops the run and still prints what was produced.
    let cancellation = CancellationToken::new();
    {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.cancel();
            }
        });
    }

    let report = runtime.run_until(args.inputs, cancellation).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}
