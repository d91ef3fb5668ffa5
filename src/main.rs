use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cykel_predict::{commands, AppConfig, FixedClock, PredictionRequest, Predictor};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cykel-predict")]
#[command(about = "Predict the next period, ovulation and fertile window from logged history")]
struct Args {
    /// Extra config file layered over the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a JSON prediction request and print the prediction
    Predict {
        /// Request file; stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
        /// Override today's date (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long)]
        pretty: bool,
    },
    /// Print summary statistics for the history in a request
    Stats {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Predict {
            input,
            today,
            pretty,
        } => {
            let request = read_request(input.as_deref())?;
            let predictor = match today {
                Some(date) => Predictor::with_clock(config.prediction, Arc::new(FixedClock(date))),
                None => Predictor::new(config.prediction),
            };
            let response =
                commands::predict(&request, &predictor, &config.defaults).map_err(|e| anyhow!(e))?;
            print_json(&response, pretty)
        }
        Command::Stats { input, pretty } => {
            let request = read_request(input.as_deref())?;
            let predictor = Predictor::new(config.prediction);
            let stats = commands::stats(&request, &predictor).map_err(|e| anyhow!(e))?;
            print_json(&stats, pretty)
        }
    }
}

/// RUST_LOG wins when set; otherwise debug for this crate, info elsewhere.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    let directives = rust_log
        .filter(|spec| !spec.trim().is_empty())
        .unwrap_or("cykel_predict=debug");
    EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy(directives)
}

fn read_request(input: Option<&Path>) -> Result<PredictionRequest> {
    let raw = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read request from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Request is not a valid prediction request")
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}
