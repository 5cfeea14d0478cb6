use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use finroute_models::config::FinrouteConfig;
use finroute_models::RequestInput;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "finroute", about = "Route financial data requests to analysis agents")]
struct Cli {
    /// Natural-language request
    #[arg(short, long)]
    query: String,

    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Read the RequestInput JSON payload from a file, or `-` for stdin
    #[arg(short, long)]
    input: Option<String>,

    /// Source reference to load (overrides the payload)
    #[arg(long)]
    data_source: Option<String>,

    /// comprehensive, metrics, trends or anomalies (overrides the payload)
    #[arg(long)]
    analysis_type: Option<String>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Also print the execution summary
    #[arg(long)]
    summary: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn read_payload(input: Option<&str>) -> Result<RequestInput> {
    let raw = match input {
        None => return Ok(RequestInput::default()),
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            buf
        }
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input: {path}"))?,
    };
    serde_json::from_str(&raw).context("Failed to parse request JSON")
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (respects RUST_LOG env var)
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Load config
    let config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {path}"))?;
            finroute::parse_config(&raw).with_context(|| "Failed to parse config")?
        }
        None => FinrouteConfig::default(),
    };
    tracing::debug!(config = ?cli.config, "Configuration loaded");

    // Read payload, flags win
    let mut input = read_payload(cli.input.as_deref())?;
    if let Some(source) = cli.data_source {
        input.data_source = Some(source);
    }
    if let Some(kind) = cli.analysis_type {
        input.analysis_type = Some(kind);
    }
    input.query = Some(cli.query.clone());

    let orchestrator =
        finroute::build_orchestrator(&config).context("Failed to build orchestrator")?;
    let result = orchestrator.execute_query(&cli.query, input).await;
    println!("{}", to_json(&result, cli.pretty)?);

    if cli.summary {
        let summary = orchestrator
            .get_execution_summary()
            .map_err(|e| anyhow::anyhow!("Summary unavailable: {e}"))?;
        println!("{}", to_json(&summary, cli.pretty)?);
    }

    Ok(())
}
