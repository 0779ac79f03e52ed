//! Gatekeep CLI entrypoint.

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod config;
mod handlers;
mod output;

use commands::Commands;
use config::OutputFormat;

#[derive(Parser)]
#[command(name = "gatekeep")]
#[command(author, version, about = "Trigger filtering and build dispatch for mobile CI pipelines", long_about = None)]
struct Cli {
    /// Output format
    #[arg(long, global = true, env = "GATEKEEP_FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Validate { source } => handlers::validate(&source)?,
        Commands::Evaluate {
            source,
            event,
            params,
            running,
        } => handlers::evaluate(&source, &event, &params, running, cli.format)?,
        Commands::Params {
            source,
            trigger,
            branch,
            params,
        } => handlers::params(&source, &trigger, branch.as_deref(), &params, cli.format)?,
        Commands::Schema => handlers::schema()?,
    };

    println!("{}", output.trim_end());
    Ok(())
}

/// Logs go to stderr so rendered output on stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
