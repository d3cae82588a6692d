//! CAN Log Reader CLI Application
//!
//! Command-line front end for the can-log-engine library. It loads one or
//! more CLG logs, optionally aligns or merges them, waits for the selected
//! signals and prints a summary per signal:
//! - sample count, min/max/last value with unit
//! - row count after resampling to a uniform grid
//! - decoded event words with descriptions from an event code table

use anyhow::{Context, Result};
use can_log_engine::event_codes::{decode_events, EventCodeTable};
use can_log_engine::{Catalog, LoadDecision, SignalDefinitions, SignalHandle};
use clap::Parser;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod report;

use config::{AppConfig, OutputFormat};
use report::SignalSummary;

/// CAN Log Reader - Decode and analyze CAN log files
#[derive(Parser, Debug)]
#[command(name = "can-log-cli")]
#[command(about = "Decode, align and merge CAN log files (CLG)", long_about = None)]
#[command(version)]
struct Args {
    /// Log files to load
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Signal definitions (TOML)
    #[arg(short, long, value_name = "FILE")]
    definitions: Option<PathBuf>,

    /// Put all files on the time origin of the earliest one
    #[arg(long, conflicts_with = "merge")]
    align: bool,

    /// Align, then merge all files into one
    #[arg(long)]
    merge: bool,

    /// Signal to summarize (can be repeated; default: all)
    #[arg(short, long = "signal", value_name = "NAME")]
    signals: Vec<String>,

    /// Signal holding event words to list (can be repeated)
    #[arg(long = "events", value_name = "NAME")]
    events: Vec<String>,

    /// Event code descriptions
    #[arg(long, value_name = "FILE")]
    event_codes: Option<PathBuf>,

    /// Also report row counts after resampling at this frequency
    #[arg(short, long, value_name = "HZ")]
    resample: Option<u16>,

    /// Print summaries as JSON
    #[arg(long)]
    json: bool,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Layer command line values over the configuration file
    fn apply(&self, config: &mut AppConfig) {
        if !self.files.is_empty() {
            config.input.files = self.files.clone();
        }
        if let Some(definitions) = &self.definitions {
            config.input.definitions = Some(definitions.clone());
        }
        if let Some(codes) = &self.event_codes {
            config.input.event_codes = Some(codes.clone());
        }
        if self.merge {
            config.engine.load_decision = LoadDecision::AlignAndMerge;
        } else if self.align {
            config.engine.load_decision = LoadDecision::Align;
        }
        if !self.signals.is_empty() {
            config.output.signals = self.signals.clone();
        }
        if !self.events.is_empty() {
            config.output.events = self.events.clone();
        }
        if self.resample.is_some() {
            config.output.resample_hz = self.resample;
        }
        if self.json {
            config.output.format = OutputFormat::Json;
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Log Reader CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using engine library v{}", can_log_engine::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    run(&config)
}

fn run(config: &AppConfig) -> Result<()> {
    let definitions_path = config
        .input
        .definitions
        .as_ref()
        .context("No signal definitions given")?;
    let definitions = SignalDefinitions::from_file(definitions_path)
        .with_context(|| format!("Failed to load signal definitions: {:?}", definitions_path))?;
    log::info!(
        "Loaded {} signal definition(s) for {} device(s)",
        definitions.num_signals(),
        definitions.device_names().count()
    );

    let (catalog, _events) = Catalog::new(config.engine.clone(), Arc::new(definitions));
    let report = catalog.load_files(&config.input.files)?;
    for (path, error) in &report.failures {
        eprintln!("Skipped {}: {}", path.display(), error);
    }

    let handles = select_signals(&catalog, &config.output.signals);
    catalog.request_population_many(&handles, false)?;

    let summaries: Vec<SignalSummary> = handles
        .par_iter()
        .filter_map(|&handle| {
            let signal = catalog.signal(handle).ok()?;
            let file = catalog.datafile(handle.file).ok()?;
            match catalog.await_populated(handle) {
                Ok(data) => Some(SignalSummary::new(
                    file.name(),
                    signal.name(),
                    &signal.descriptor().unit,
                    &data,
                    config.output.resample_hz,
                )),
                Err(e) => {
                    log::warn!("Skipping '{}' of {}: {}", signal.name(), file.name(), e);
                    None
                }
            }
        })
        .collect();

    match config.output.format {
        OutputFormat::Text => print!("{}", report::render_text(&summaries)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
    }

    if !config.output.events.is_empty() {
        print_events(&catalog, config)?;
    }
    Ok(())
}

/// Handles of the named signals in every loaded file (all signals if no names)
fn select_signals(catalog: &Catalog, names: &[String]) -> Vec<SignalHandle> {
    let files = catalog.files();
    let mut handles = Vec::new();
    for file in &files {
        for signal in file.signals() {
            if names.is_empty() || names.iter().any(|n| n == signal.name()) {
                handles.push(signal.handle());
            }
        }
    }

    for name in names {
        if !files.iter().any(|f| f.find_by_name(name).is_some()) {
            log::warn!("Signal '{}' not found in any loaded file", name);
        }
    }
    handles
}

fn print_events(catalog: &Catalog, config: &AppConfig) -> Result<()> {
    let table = config
        .input
        .event_codes
        .as_ref()
        .map(|path| {
            EventCodeTable::from_file(path)
                .with_context(|| format!("Failed to load event codes: {:?}", path))
        })
        .transpose()?;

    for file in catalog.files() {
        for name in &config.output.events {
            let Some(signal) = file.find_by_name(name) else {
                continue;
            };
            let data = catalog.await_populated(signal.handle())?;
            let offset = signal.time_offset();
            let mut events = decode_events(&data);
            for event in &mut events {
                event.time += offset;
            }
            print!("{}", report::render_events(file.name(), name, &events, table.as_ref()));
        }
    }
    Ok(())
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
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{} {}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
