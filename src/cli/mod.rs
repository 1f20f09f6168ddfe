//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Supervised test-binary execution harness
#[derive(Parser, Debug)]
#[command(name = "exec-harness")]
#[command(version)]
#[command(about = "Run test binaries under supervision with timeouts and parallel workers")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute test binaries
    Run(RunArgs),

    /// Classify a captured output file
    Classify(ClassifyArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test executables to run
    #[arg(required = true)]
    pub tests: Vec<PathBuf>,

    /// Default timeout per test in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Run tests in parallel
    #[arg(short, long)]
    pub parallel: bool,

    /// Number of shard workers (when parallel)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Disable stdout/stderr capture
    #[arg(long)]
    pub no_capture: bool,

    /// Stream test output as it arrives
    #[arg(long)]
    pub stream: bool,

    /// Working directory for test execution
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Environment override for tests, repeatable (KEY=VALUE)
    #[arg(long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Output format (text, json)
    #[arg(short, long)]
    pub format: Option<String>,
}

/// Arguments for classify command
#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Captured output file to classify
    pub file: PathBuf,

    /// Include debug-tagged lines in the filtered output
    #[arg(long)]
    pub include_debug: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Destination path
        #[arg(short, long, default_value = "./exec-harness.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show {
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("invalid KEY=VALUE pair: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("MPRIS_MOCK=1"),
            Ok(("MPRIS_MOCK".to_string(), "1".to_string()))
        );
        assert_eq!(
            parse_key_value("PATH=/usr/bin:/bin"),
            Ok(("PATH".to_string(), "/usr/bin:/bin".to_string()))
        );
        assert!(parse_key_value("NO_SEPARATOR").is_err());
    }

    #[test]
    fn test_run_args_parse() {
        let args = Args::parse_from([
            "exec-harness",
            "run",
            "--parallel",
            "--workers",
            "8",
            "--env",
            "A=1",
            "build/test_a",
            "build/test_b",
        ]);

        match args.command {
            Command::Run(run) => {
                assert_eq!(run.tests.len(), 2);
                assert!(run.parallel);
                assert_eq!(run.workers, Some(8));
                assert_eq!(run.env, vec![("A".to_string(), "1".to_string())]);
            }
            _ => panic!("expected run command"),
        }
    }
}
