//! cep-resolver - Brazilian postal code lookup CLI
//!
//! Results are printed as pretty JSON on stdout; logs and batch progress go
//! to stderr.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cep_common::config::{default_config_path, write_toml_config, TomlConfig};
use cep_common::events::BatchProgress;
use cep_resolver::config::{self, CliOverrides, ResolverConfig, ENV_LOG_LEVEL};
use cep_resolver::services::{
    estimate_processing_time, parse_batch_input, BatchItem, BatchResult, BatchStats, LookupMode,
};
use cep_resolver::types::AddressQuery;
use cep_resolver::{CepService, ResolveError};

/// Command-line arguments for cep-resolver
#[derive(Parser, Debug)]
#[command(name = "cep-resolver")]
#[command(about = "Resolve Brazilian postal codes (CEP) across several public sources")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(long, global = true, env = "CEP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Per-call timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up one postal code
    Lookup {
        cep: String,

        /// Query every source and print the per-source map
        #[arg(long)]
        all: bool,
    },

    /// Look up many postal codes read from a file or stdin
    Batch {
        /// Input file (stdin when omitted)
        file: Option<PathBuf>,

        /// Concurrent lookups within a chunk
        #[arg(long)]
        concurrency: Option<usize>,

        /// Items per chunk
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Find postal codes for an address
    Search {
        #[arg(long)]
        city: String,

        /// Two-letter state code (UF)
        #[arg(long)]
        state: String,

        #[arg(long)]
        street: Option<String>,

        #[arg(long, default_value = "")]
        neighborhood: String,
    },

    /// Probe every source and print its status
    Health,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[derive(Serialize)]
struct BatchOutput<'a> {
    job_id: uuid::Uuid,
    state: cep_common::events::JobState,
    results: &'a [BatchResult],
    stats: BatchStats,
    invalid: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // TOML tier first: it may carry the log level
    let mut toml = config::load_file(args.config.as_deref())?;
    let level = args
        .log_level
        .clone()
        .or_else(|| std::env::var(ENV_LOG_LEVEL).ok())
        .unwrap_or_else(|| toml.logging.level.clone());
    init_tracing(&level);

    let (chunk_size, concurrency) = match &args.command {
        Command::Batch {
            chunk_size,
            concurrency,
            ..
        } => (*chunk_size, *concurrency),
        _ => (None, None),
    };
    config::apply_env_overrides(&mut toml);
    config::apply_cli_overrides(
        &mut toml,
        &CliOverrides {
            log_level: args.log_level.clone(),
            timeout_ms: args.timeout_ms,
            chunk_size,
            concurrency_limit: concurrency,
        },
    );

    if let Command::Config { action } = &args.command {
        return run_config(action, args.config.clone(), &toml);
    }

    let resolved = ResolverConfig::from_toml(&toml)?;
    let service = CepService::from_config(&resolved)?;

    match args.command {
        Command::Lookup { cep, all } => {
            let mode = if all {
                LookupMode::AllSources
            } else {
                LookupMode::OrderedFallback
            };
            let outcome = service.lookup_single(&cep, mode).await?;
            print_json(&outcome)
        }
        Command::Batch { file, .. } => run_batch(&service, file, &resolved).await,
        Command::Search {
            city,
            state,
            street,
            neighborhood,
        } => {
            let query = AddressQuery {
                street,
                neighborhood,
                city,
                state,
            };
            let candidates = service.search_by_address(&query).await?;
            print_json(&candidates)
        }
        Command::Health => {
            let status = service.refresh_source_health().await;
            print_json(&status)
        }
        Command::Config { .. } => Ok(()),
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cep_resolver={0},cep_common={0}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_batch(
    service: &CepService,
    file: Option<PathBuf>,
    config: &ResolverConfig,
) -> Result<()> {
    let input = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let parsed = parse_batch_input(&input);
    if !parsed.invalid.is_empty() {
        warn!(
            invalid = parsed.invalid.len(),
            "Skipping tokens that are not 8-digit postal codes"
        );
    }
    if parsed.valid.is_empty() {
        bail!("No valid postal codes in input ({} tokens read)", parsed.total);
    }

    let origin = file.as_ref().map(|p| p.display().to_string());
    let items: Vec<BatchItem> = parsed
        .valid
        .iter()
        .map(|code| {
            let item = BatchItem::postal_code(code.clone());
            match &origin {
                Some(tag) => item.with_origin(tag.clone()),
                None => item,
            }
        })
        .collect();

    info!(
        items = items.len(),
        estimated_ms = estimate_processing_time(items.len(), config.batch.chunk_size),
        "Starting batch"
    );

    let control = service.new_batch_job();
    let canceller = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling batch after the current chunk");
            canceller.cancel();
        }
    });

    let report = service
        .lookup_batch(&items, None, &control, |progress| {
            // Printed regardless of the log level
            eprintln!("{}", progress_line(&progress));
            debug!(
                processed = progress.processed,
                total = progress.total,
                elapsed_ms = progress.elapsed_ms,
                "Batch progress"
            );
        })
        .await;

    print_json(&BatchOutput {
        job_id: report.job_id,
        state: report.state,
        results: &report.results,
        stats: BatchStats::from_results(&report.results),
        invalid: parsed.invalid,
    })?;

    if report.is_cancelled() {
        return Err(ResolveError::Cancelled.into());
    }
    Ok(())
}

fn run_config(action: &ConfigAction, path: Option<PathBuf>, effective: &TomlConfig) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = path
                .or_else(default_config_path)
                .context("No configuration directory on this platform; pass --config")?;
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            write_toml_config(&TomlConfig::default(), &path)?;
            println!("{}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            ResolverConfig::from_toml(effective)?;
            print_json(effective)
        }
    }
}

/// One human-readable progress line for stderr
fn progress_line(progress: &BatchProgress) -> String {
    let eta = match progress.estimated_remaining_ms {
        Some(ms) => format!("{:.1}s", ms as f64 / 1000.0),
        None => "-".to_string(),
    };
    format!(
        "[{}/{}] {:.0}% found={} failed={} eta={}",
        progress.processed,
        progress.total,
        progress.percentage,
        progress.success_count,
        progress.error_count,
        eta
    )
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line_reports_counts_and_eta() {
        let progress = BatchProgress::snapshot(10, 40, 7, 3, 2_000);
        assert_eq!(progress_line(&progress), "[10/40] 25% found=7 failed=3 eta=6.0s");
    }

    #[test]
    fn test_progress_line_without_estimate() {
        let progress = BatchProgress::snapshot(0, 5, 0, 0, 0);
        assert_eq!(progress_line(&progress), "[0/5] 0% found=0 failed=0 eta=-");
    }
}
