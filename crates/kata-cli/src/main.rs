//! KATA CLI - Command-line tool for the KATA scanner
//!
//! Submits files for scanning, lists scan states and waits for verdicts.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kata_client::{KataClient, ScanState};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::WaitArgs;
use crate::config::{Config, ConnectionArgs};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "kata-cli")]
#[command(author, version, about = "KATA scanner CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Scanner base URL
    #[arg(short, long, env = "KATA_BASE_URL")]
    base_url: Option<String>,

    /// Sensor identifier
    #[arg(short, long, env = "KATA_SENSOR_ID")]
    sensor_id: Option<String>,

    /// Client certificate (PEM)
    #[arg(long, env = "KATA_CERT")]
    cert: Option<PathBuf>,

    /// Client private key (PEM)
    #[arg(long, env = "KATA_KEY")]
    key: Option<PathBuf>,

    /// CA bundle for the scanner certificate (PEM)
    #[arg(long, env = "KATA_CA")]
    ca: Option<PathBuf>,

    /// Do not verify the scanner certificate
    #[arg(long, env = "KATA_INSECURE")]
    insecure: bool,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "KATA_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Configuration file path
    #[arg(short, long, env = "KATA_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, env = "KATA_OUTPUT")]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, env = "KATA_NO_COLOR")]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long, env = "KATA_QUIET")]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, env = "KATA_VERBOSE")]
    verbose: bool,

    /// Emit client debug events
    #[arg(long, env = "KATA_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a file for scanning
    Submit {
        /// File to scan
        file: PathBuf,

        /// File name reported to the scanner (default: the file's name)
        #[arg(long)]
        filename: Option<String>,

        /// Scan ID to use (default: random UUID)
        #[arg(long)]
        scan_id: Option<String>,

        /// Sensor instance to route the scan to
        #[arg(long)]
        sensor_instance: Option<String>,

        /// Wait for a verdict after submitting
        #[arg(long)]
        wait: bool,

        #[command(flatten)]
        wait_args: WaitArgs,
    },

    /// List scan states
    Scans {
        /// Only scans in these states (detect, "not detected", processing, timeout, error)
        #[arg(long = "state", value_name = "STATE")]
        states: Vec<ScanState>,

        /// Only scans of this sensor instance
        #[arg(long)]
        sensor_instance: Option<String>,
    },

    /// Wait until a scan reaches a terminal state
    Wait {
        /// Scan ID
        scan_id: String,

        /// Sensor instance the scan belongs to
        #[arg(long)]
        sensor_instance: Option<String>,

        #[command(flatten)]
        wait_args: WaitArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose || cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Execute the command; `Ok(false)` means it ran but did not succeed
async fn run(cli: Cli) -> Result<bool> {
    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let format = cli
        .output
        .or_else(|| config.output.as_deref().and_then(OutputFormat::from_config))
        .unwrap_or_default();
    let no_color = cli.no_color || config.no_color.unwrap_or(false);
    let ctx = OutputContext::new(format, no_color, cli.quiet);

    // Merge CLI args with config
    let merged = config.merge_with_args(ConnectionArgs {
        base_url: cli.base_url,
        sensor_id: cli.sensor_id,
        cert: cli.cert,
        key: cli.key,
        ca: cli.ca,
        insecure: cli.insecure,
        timeout_ms: cli.timeout_ms,
    })?;
    tracing::debug!(
        base_url = %merged.base_url,
        sensor_id = %merged.sensor_id,
        insecure = merged.insecure,
        "Connecting to scanner"
    );
    let client = KataClient::new(merged.to_client_config(cli.debug)?)
        .context("Failed to create KATA client")?;

    // Execute command
    match cli.command {
        Commands::Submit {
            file,
            filename,
            scan_id,
            sensor_instance,
            wait,
            wait_args,
        } => {
            let options = commands::SubmitOptions {
                filename,
                scan_id,
                sensor_instance,
                wait: wait.then_some(wait_args),
            };
            commands::submit(&client, &file, options, &ctx).await
        }

        Commands::Scans {
            states,
            sensor_instance,
        } => {
            commands::scans(&client, states, sensor_instance, &ctx).await?;
            Ok(true)
        }

        Commands::Wait {
            scan_id,
            sensor_instance,
            wait_args,
        } => commands::wait(&client, &scan_id, sensor_instance, &wait_args, &ctx).await,
    }
}
