use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bloom_limiter::config::{BloomConfig, StoreBackend};
use bloom_limiter::ratelimit::{CheckOutcome, Clock, LimiterName, Limiters, SystemClock};
use bloom_limiter::store::{FileStore, KeyValueStore, MemoryStore};

/// Inspect and drive Bloom's attempt limiters.
#[derive(Debug, Parser)]
#[command(name = "bloom-limiter", version, about)]
struct Cli {
    /// YAML configuration file; `BLOOM_*` environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LimiterArg {
    Auth,
    PasswordReset,
}

impl From<LimiterArg> for LimiterName {
    fn from(arg: LimiterArg) -> Self {
        match arg {
            LimiterArg::Auth => LimiterName::Auth,
            LimiterArg::PasswordReset => LimiterName::PasswordReset,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record an attempt and print whether it would be blocked
    Check { limiter: LimiterArg },
    /// Clear the recorded attempts for a limiter
    Reset { limiter: LimiterArg },
    /// Show the current window without recording an attempt
    Status { limiter: LimiterArg },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = BloomConfig::load(cli.config.as_deref())?;
    info!(
        backend = ?config.store.backend,
        path = %config.store.path.display(),
        "Configuration loaded"
    );

    let store: Arc<dyn KeyValueStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::new(&config.store.path)),
    };
    let limiters = Limiters::new(&config.limiters, store)?;

    match cli.command {
        Command::Check { limiter } => {
            let name = LimiterName::from(limiter);
            let outcome = limiters.get(name).check().await;
            info!(limiter = %name, limited = outcome.limited, "Attempt checked");
            print_outcome(&outcome)?;
        }
        Command::Reset { limiter } => {
            let name = LimiterName::from(limiter);
            limiters.get(name).reset().await?;
            info!(limiter = %name, "Attempts cleared");
        }
        Command::Status { limiter } => {
            let name = LimiterName::from(limiter);
            match limiters.get(name).status().await? {
                Some(outcome) => print_outcome(&outcome)?,
                None => println!("no attempts recorded for {}", name),
            }
        }
        Command::Config => print!("{}", config.to_yaml()?),
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    #[serde(flatten)]
    outcome: &'a CheckOutcome,
    resets_at: String,
    retry_after_ms: u64,
}

fn print_outcome(outcome: &CheckOutcome) -> anyhow::Result<()> {
    println!("{}", render_outcome(outcome, SystemClock.now_ms())?);
    Ok(())
}

fn render_outcome(outcome: &CheckOutcome, now_ms: i64) -> serde_json::Result<String> {
    let resets_at = chrono::DateTime::from_timestamp_millis(outcome.reset_time)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    serde_json::to_string_pretty(&Report {
        outcome,
        resets_at,
        retry_after_ms: outcome.retry_after(now_ms),
    })
}
