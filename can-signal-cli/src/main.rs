//! CAN Signal CLI Application
//!
//! Command-line front end for the can-signal-codec library. It plays the
//! part of the external frame dispatcher:
//! - Loads message/signal definitions from a TOML file
//! - Decodes `ID#DATA` frames and prints every updated signal
//! - Encodes a frame from `Signal=value` assignments

use anyhow::{anyhow, Context, Result};
use can_signal_codec::SampleObserver;
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod dispatch;
mod report;

/// CAN Signal CLI - Decode and encode CAN frame payloads
#[derive(Parser, Debug)]
#[command(name = "can-signal-cli")]
#[command(about = "Decode and encode CAN signals from frame payloads", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the signal definition file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode frames given as ID#DATA (hex), e.g. 123#1400FF00
    Decode {
        #[arg(required = true, value_name = "FRAME")]
        frames: Vec<String>,

        /// Print JSON regardless of the configured output format
        #[arg(long)]
        json: bool,

        /// Timestamp for the frames in nanoseconds since 1970 (default: now)
        #[arg(long, value_name = "NS")]
        timestamp_ns: Option<u64>,
    },
    /// Encode a frame from engineering values
    Encode {
        /// Message name or CAN ID
        message: String,

        /// Signal assignments
        #[arg(value_name = "SIGNAL=VALUE")]
        values: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Signal CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using codec library v{}", can_signal_codec::VERSION);

    log::info!("Loading configuration from: {:?}", args.config);
    let app_config = config::load_config(&args.config)?;
    let messages = app_config.build_messages()?;
    log::debug!("Configuration loaded: {} messages", messages.len());

    let mut dispatcher = dispatch::Dispatcher::new(messages);

    match &args.command {
        Command::Decode {
            frames,
            json,
            timestamp_ns,
        } => {
            let samples = Arc::new(report::SampleLog::new());
            let observer: Arc<dyn SampleObserver> = samples.clone();
            dispatcher.attach_to_all(&observer);

            let timestamp_ns = timestamp_ns.unwrap_or_else(now_ns);
            for text in frames {
                let frame = dispatch::parse_frame(text, timestamp_ns)?;
                if dispatcher.dispatch(&frame).is_none() {
                    log::warn!("No message defined for CAN ID 0x{:X}", frame.can_id);
                }
            }

            let mut output = app_config.output.clone();
            if *json {
                output.format = config::OutputFormat::Json;
            }
            report::write_samples(&mut io::stdout().lock(), &samples.take(), &output)?;
        }
        Command::Encode { message, values } => {
            let message = dispatcher
                .find_message(message)
                .ok_or_else(|| anyhow!("Unknown message '{}'", message))?;

            let assignments = values
                .iter()
                .map(|text| parse_assignment(text))
                .collect::<Result<Vec<_>>>()?;
            let pairs: Vec<(&str, f64)> = assignments
                .iter()
                .map(|(name, value)| (name.as_str(), *value))
                .collect();

            let data = message
                .encode(&pairs)
                .with_context(|| format!("Failed to encode message '{}'", message.name()))?;
            println!("{}", dispatch::format_frame(message.id(), &data));
        }
    }

    Ok(())
}

/// Split `Name=1.5` into its parts
fn parse_assignment(text: &str) -> Result<(String, f64)> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected SIGNAL=VALUE, got '{}'", text))?;
    let value = value
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid value for signal '{}'", name))?;
    Ok((name.trim().to_string(), value))
}

fn now_ns() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .and_then(|ns| u64::try_from(ns).ok())
        .unwrap_or(0)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
