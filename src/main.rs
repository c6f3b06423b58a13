use speechrelay::cli::{Args, BenchConfig, ConfigDiscovery, ExecutionMode, InitConfig, run_bench};
use speechrelay::{ResilienceConfig, env};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging, RUST_LOG wins over --verbose
    let default_filter = if args.verbose {
        env::logging::VERBOSE_FILTER
    } else {
        env::logging::DEFAULT_FILTER
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match mode {
        ExecutionMode::Bench(config) => run_bench_mode(config).await,
        ExecutionMode::ShowConfig { config_override } => {
            ConfigDiscovery::show_discovery_info();
            let config = ConfigDiscovery::load(config_override.as_deref())?;
            println!();
            println!("Effective configuration:");
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ExecutionMode::InitConfig(config) => run_init_config(config),
    }
}

async fn run_bench_mode(config: BenchConfig) -> anyhow::Result<()> {
    let resilience = ConfigDiscovery::load(config.config_override.as_deref())?;

    let summary = match run_bench(&config, resilience).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Bench failed: {:#}", e);
            return Err(e);
        }
    };

    println!("{}", summary.report.to_json_pretty()?);
    eprintln!(
        "{} succeeded, {} failed, cache hit rate {:.1}%, average response {:.0}ms",
        summary.succeeded,
        summary.failed,
        summary.report.metrics.cache_hit_rate,
        summary.report.metrics.average_response_time_ms
    );

    if let Some(output) = &config.output {
        summary.report.save_json(output)?;
        info!("Report saved to {:?}", output);
    }
    Ok(())
}

fn run_init_config(config: InitConfig) -> anyhow::Result<()> {
    let path = match config.path {
        Some(path) => path,
        None => ConfigDiscovery::default_user_config_path()?,
    };

    let resilience = ResilienceConfig::with_providers(config.providers);
    let written = ConfigDiscovery::write_config(&resilience, &path, config.force)?;
    println!("Configuration written to {}", written.display());
    Ok(())
}
