//! exec-harness - Supervised test-binary execution
//!
//! A CLI harness that runs discovered test binaries as supervised child
//! processes: per-test timeouts, output capture, outcome classification
//! (success/failure/timeout/crash/build-error/system-error), and parallel
//! fan-out across a bounded pool of shard workers.
//!
//! ## Usage
//!
//! ```bash
//! # Run tests sequentially
//! exec-harness run build/tests/test_demuxer build/tests/test_codec
//!
//! # Parallel fan-out with a 2 s default timeout
//! exec-harness run --parallel --workers 4 --timeout 2000 build/tests/test_*
//!
//! # Stream output as it arrives
//! exec-harness run --stream build/tests/test_player
//!
//! # Classify a captured log
//! exec-harness classify captured.log
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

mod cli;
mod config;
mod executor;
mod models;
mod output;
mod utils;

use cli::Args;
use config::{ConfigFile, EnvConfig};
use executor::TestExecutor;
use models::{ExecutionStatus, RunSummary, TestSpec};
use utils::{LogLevel, Timer};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    utils::init_logger(if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    match args.command {
        cli::Command::Run(run_args) => run_tests(run_args).await,
        cli::Command::Classify(classify_args) => classify_output(classify_args),
        cli::Command::Config(config_args) => manage_config(config_args),
    }
}

async fn run_tests(args: cli::RunArgs) -> Result<()> {
    let mut app = ConfigFile::load_default()?.app;

    let env_overrides = EnvConfig::load();
    if env_overrides.has_any() {
        debug!("Applying EXEC_HARNESS_* environment overrides");
    }
    env_overrides.apply(&mut app);

    // CLI flags win over file and environment
    if let Some(timeout_ms) = args.timeout {
        app.timeout_ms = timeout_ms;
    }
    if args.parallel {
        app.parallel = true;
    }
    if let Some(workers) = args.workers {
        app.max_parallel = workers;
    }
    if args.no_capture {
        app.capture_output = false;
    }
    if let Some(format) = &args.format {
        app.format = format.clone();
    }

    let mut executor = TestExecutor::with_config(app.executor_config());
    if let Some(workdir) = &args.workdir {
        executor.set_working_directory(workdir);
    }
    for (name, value) in &args.env {
        executor.add_environment_variable(name, value);
    }
    if args.stream {
        executor.set_output_callback(Arc::new(|name, chunk| {
            for line in chunk.lines() {
                println!("[{name}] {line}");
            }
        }));
    }

    let tests: Vec<TestSpec> = args.tests.iter().map(TestSpec::from_path).collect();

    info!(
        "Executing {} test(s), timeout {}ms{}",
        tests.len(),
        app.timeout_ms,
        if app.parallel {
            format!(", {} workers", executor.max_parallel())
        } else {
            String::new()
        }
    );

    let started_at = Utc::now();
    let timer = Timer::start("run");

    let results = if app.parallel {
        executor
            .execute_tests_parallel(&tests, executor.max_parallel())
            .await
    } else {
        executor.execute_tests(&tests).await
    };

    let elapsed_ms = timer.elapsed_ms();
    let summary = RunSummary::new(started_at, results);

    match app.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print!("{summary}"),
    }

    info!("Completed {} test(s) in {}ms", summary.total, elapsed_ms);

    if !summary.all_passed() {
        std::process::exit(1);
    }

    Ok(())
}

fn classify_output(args: cli::ClassifyArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read output file: {}", args.file.display()))?;

    let parsed = output::parse_test_output(&content);
    if let Some(status) = parsed.get("status") {
        println!("Status: {status}");
    }
    if let Some(assertions) = parsed.get("assertions") {
        println!("Assertions: {assertions}");
    }

    let failures = output::extract_assertion_failures(&content);
    if !failures.is_empty() {
        println!("\nAssertion failures:");
        for failure in &failures {
            println!("  -{failure}");
        }
    }

    let metrics = output::extract_performance_metrics(&content);
    if !metrics.is_empty() {
        println!("\nPerformance metrics:");
        let mut sorted: Vec<_> = metrics.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        for (label, value) in sorted {
            println!("  {label}: {value} ms");
        }
    }

    let status = match parsed.get("status").map(String::as_str) {
        Some("passed") => ExecutionStatus::Success,
        Some("failed") => ExecutionStatus::Failure,
        _ => ExecutionStatus::SystemError,
    };

    let filtered = output::filter_output(&content, args.include_debug);
    if !filtered.is_empty() {
        println!("\nRelevant lines:");
        print!("{}", output::colorize_output(&filtered, status));
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            let config = ConfigFile::example();
            config.save(path)?;
            println!("✓ Configuration file created: {output}");
        }

        cli::ConfigAction::Show { format } => {
            let config = ConfigFile::load_default()?;
            let rendered = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{rendered}");
        }
    }

    Ok(())
}
