// Recon Gateway - Main Entry Point
//
// - `serve`: HTTP scan API
// - `run`:   one scan from the command line, outcome printed as JSON
// - `tools`: list tool profiles

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recon_gateway::config::Config;
use recon_gateway::gateway::{ExecutionStatus, Gateway};
use recon_gateway::{logging, metrics, server};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

/// Recon Gateway: safe execution of external recon scanners
#[derive(Parser, Debug)]
#[command(name = "recon-gateway")]
#[command(version)]
#[command(about = "Validated, time-bounded execution of recon tools", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP scan API
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a single scan and print the outcome as JSON
    Run {
        /// Tool id, e.g. nuclei or nmap-quick
        tool: String,

        /// Scan target (hostname, IP or URL)
        target: String,

        /// Option blob for tools that accept one
        #[arg(long, allow_hyphen_values = true)]
        options: Option<String>,
    },
    /// List the available tool profiles
    Tools,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    logging::init(&config.logging, args.verbose)?;

    match args.command {
        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            info!("Recon gateway v{} starting", env!("CARGO_PKG_VERSION"));
            server::start_server(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            tool,
            target,
            options,
        } => run_scan(&config, &tool, &target, options.as_deref()).await,
        Commands::Tools => {
            list_tools(&config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run one scan and print the outcome
async fn run_scan(config: &Config, tool: &str, target: &str, options: Option<&str>) -> Result<ExitCode> {
    metrics::init().context("Failed to initialize metrics")?;
    let gateway = Gateway::new(config.profile_registry()?, config.gateway_config());

    let outcome = gateway
        .execute(tool, target, options)
        .await
        .with_context(|| format!("{} scan of {:?} not started", tool, target))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
    );

    Ok(if outcome.result.status == ExecutionStatus::Success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Print the tool profiles as a table
fn list_tools(config: &Config) -> Result<()> {
    let registry = config.profile_registry()?;

    println!("{:<14} {:<18} {:<16} {:>8}  options", "TOOL", "PROGRAM", "FORMAT", "TIMEOUT");
    for summary in registry.summaries() {
        let format = serde_json::to_value(summary.format)?;
        println!(
            "{:<14} {:<18} {:<16} {:>7}s  {}",
            summary.id,
            summary.program,
            format.as_str().unwrap_or_default(),
            summary.timeout_secs,
            if summary.accepts_options { "yes" } else { "no" }
        );
    }

    Ok(())
}
