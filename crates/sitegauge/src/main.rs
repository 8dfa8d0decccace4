//! Audit runner CLI: load a JSON5 config, execute the run matrix, print
//! per-run score summaries.

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use sitegauge::{aggregate, AuditRunner, Config};

/// Repeatable headless-browser performance audits
#[derive(Parser, Debug)]
#[command(name = "sitegauge", version, about)]
struct Args {
    /// Path to the JSON5 config file
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let Some(config_path) = args.config else {
        eprintln!("Usage: sitegauge <config.json5>");
        std::process::exit(1);
    };

    if let Err(error) = run(&config_path).await {
        eprintln!("{:?}", error);
        std::process::exit(1);
    }
}

async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(config_path)?;

    println!("Starting sitegauge");
    println!();

    let runner = AuditRunner::new(config);
    let results = runner.run().await?;

    print!("{}", aggregate::render(&results));

    Ok(())
}
