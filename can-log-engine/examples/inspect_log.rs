//! Standalone CLG log inspector
//!
//! Prints the container header, message counts per CAN ID and, when signal
//! definitions are given, a decoded summary of every signal.
//!
//! Usage:
//!   inspect_log <log_file.clg> [--definitions <signals.toml>]
//!
//! Example:
//!   inspect_log run_042.clg --definitions signals.toml

use can_log_engine::{
    Catalog, ClgReader, EngineConfig, LogFileReader, SignalDefinitions, SignalHandle,
};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <log_file.clg> [--definitions <signals.toml>]", args[0]);
        std::process::exit(1);
    }

    let log_path = PathBuf::from(&args[1]);
    let mut definitions_path: Option<PathBuf> = None;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--definitions" if i + 1 < args.len() => {
                definitions_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
    }

    let raw = match ClgReader::read(&log_path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Failed to read {:?}: {}", log_path, e);
            std::process::exit(1);
        }
    };

    println!("=== {} ===", log_path.display());
    println!("Device:        {}", raw.device);
    println!("Start time:    {}", raw.start_time.format("%Y-%m-%d %H:%M:%S%.3f"));
    println!("Messages:      {}", raw.store.len());
    println!("Payload width: {} byte(s)", raw.store.width());
    if let Some((first, last)) = raw.store.time_span() {
        println!("Time span:     {:.3}s .. {:.3}s", first, last);
    }

    let mut per_id: HashMap<u16, usize> = HashMap::new();
    for &id in raw.store.ids() {
        *per_id.entry(id).or_insert(0) += 1;
    }
    let mut sorted: Vec<_> = per_id.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    println!("\nTop 10 CAN IDs:");
    for (id, count) in sorted.iter().take(10) {
        println!("  0x{:03X}: {} message(s)", id, count);
    }

    let Some(definitions_path) = definitions_path else {
        return;
    };
    let definitions = match SignalDefinitions::from_file(&definitions_path) {
        Ok(definitions) => definitions,
        Err(e) => {
            eprintln!("Failed to load {:?}: {}", definitions_path, e);
            std::process::exit(1);
        }
    };

    let (catalog, _events) = Catalog::new(EngineConfig::default(), Arc::new(definitions));
    let id = match catalog.load_files(&[&log_path]) {
        Ok(report) => report.loaded[0],
        Err(e) => {
            eprintln!("Failed to load {:?}: {}", log_path, e);
            std::process::exit(1);
        }
    };

    println!("\nSignals:");
    let count = catalog.datafile(id).map(|f| f.signals().len()).unwrap_or(0);
    for index in 0..count {
        let handle = SignalHandle::new(id, index);
        let Ok(signal) = catalog.signal(handle) else {
            continue;
        };
        match catalog.await_populated(handle) {
            Ok(data) => println!(
                "  {:<24} {:>8} sample(s)  last = {}",
                signal.name(),
                data.len(),
                data.value
                    .last()
                    .map(|v| format!("{:.3} {}", v, signal.descriptor().unit))
                    .unwrap_or_else(|| "-".to_string())
            ),
            Err(e) => println!("  {:<24} failed: {}", signal.name(), e),
        }
    }
}
