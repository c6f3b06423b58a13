//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `bench`: Drive simulated synthesis traffic through the resilience layer
//! - `show-config`: Show configuration discovery information
//! - `init-config`: Write a default configuration file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Bench(BenchConfig),
    ShowConfig { config_override: Option<PathBuf> },
    InitConfig(InitConfig),
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub config_override: Option<PathBuf>,
    pub requests: usize,
    pub providers: Vec<String>,
    pub distinct_phrases: usize,
    pub failure_rate: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub base_delay_ms: Option<u64>,
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            config_override: None,
            requests: 100,
            providers: vec!["azure".to_string(), "elevenlabs".to_string()],
            distinct_phrases: 20,
            failure_rate: 0.1,
            min_latency_ms: 20,
            max_latency_ms: 120,
            base_delay_ms: None,
            output: None,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitConfig {
    pub path: Option<PathBuf>,
    pub providers: Vec<String>,
    pub force: bool,
}

#[derive(Debug, Parser)]
#[command(name = "speechrelay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Connection pooling, caching, concurrency limiting and retry for text-to-speech providers")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run simulated synthesis requests through the resilience layer and print the report
    Bench {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Number of synthesis requests to issue
        #[arg(short = 'n', long = "requests", default_value_t = 100)]
        requests: usize,
        /// Simulated providers to spread requests across (can be used multiple times)
        #[arg(short = 'p', long = "provider", value_name = "ID")]
        providers: Vec<String>,
        /// Number of distinct phrases; repeats are served from the audio cache
        #[arg(long = "phrases", default_value_t = 20)]
        distinct_phrases: usize,
        /// Probability (0.0 to 1.0) that a simulated call fails
        #[arg(long = "failure-rate", default_value_t = 0.1)]
        failure_rate: f64,
        /// Minimum simulated latency in milliseconds
        #[arg(long = "min-latency-ms", default_value_t = 20)]
        min_latency_ms: u64,
        /// Maximum simulated latency in milliseconds
        #[arg(long = "max-latency-ms", default_value_t = 120)]
        max_latency_ms: u64,
        /// Override the configured retry base delay
        #[arg(long = "base-delay-ms")]
        base_delay_ms: Option<u64>,
        /// Save the JSON report to this file
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Show configuration discovery information and the effective configuration
    ShowConfig {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Write a default configuration file
    InitConfig {
        /// Destination (defaults to ~/.speechrelay/config.toml)
        #[arg(long = "path")]
        path: Option<PathBuf>,
        /// Provider entries to include (can be used multiple times)
        #[arg(short = 'p', long = "provider", value_name = "ID")]
        providers: Vec<String>,
        /// Overwrite an existing file
        #[arg(short = 'f', long = "force")]
        force: bool,
    },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Bench {
                config,
                requests,
                providers,
                distinct_phrases,
                failure_rate,
                min_latency_ms,
                max_latency_ms,
                base_delay_ms,
                output,
            }) => {
                if !(0.0..=1.0).contains(failure_rate) {
                    return Err(format!(
                        "--failure-rate must be between 0.0 and 1.0, got {}",
                        failure_rate
                    ));
                }
                if *distinct_phrases == 0 {
                    return Err("--phrases must be at least 1".to_string());
                }

                let defaults = BenchConfig::default();
                Ok(ExecutionMode::Bench(BenchConfig {
                    config_override: config.clone(),
                    requests: *requests,
                    providers: if providers.is_empty() {
                        defaults.providers
                    } else {
                        providers.clone()
                    },
                    distinct_phrases: *distinct_phrases,
                    failure_rate: *failure_rate,
                    min_latency_ms: *min_latency_ms,
                    max_latency_ms: *max_latency_ms,
                    base_delay_ms: *base_delay_ms,
                    output: output.clone(),
                    verbose: self.verbose,
                }))
            }
            Some(Commands::ShowConfig { config }) => Ok(ExecutionMode::ShowConfig {
                config_override: config.clone(),
            }),
            Some(Commands::InitConfig {
                path,
                providers,
                force,
            }) => Ok(ExecutionMode::InitConfig(InitConfig {
                path: path.clone(),
                providers: providers.clone(),
                force: *force,
            })),
            None => Err(
                "No command specified. Use 'speechrelay --help' to see available commands."
                    .to_string(),
            ),
        }
    }
}
