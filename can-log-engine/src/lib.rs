//! CAN Log Engine Library
//!
//! Loads recorded CAN logs, decodes signals from them in the background and
//! combines several recordings of the same run into one timeline.
//!
//! # Architecture
//!
//! - [`LogParser`] turns a log container into a [`Datafile`]: a columnar
//!   message store plus one unpopulated [`Signal`] per configured descriptor
//! - [`Populator`] decodes a file's signals on its own worker thread, serving
//!   priority requests before descriptor order
//! - [`MergeEngine`] aligns files on a common time origin and concatenates
//!   them into a merged file
//! - [`Catalog`] owns every loaded file, routes requests by handle and reports
//!   progress as [`CatalogEvent`]s
//!
//! The library does NOT:
//! - Plot or otherwise present data
//! - Persist decoded values
//! - Talk to live CAN hardware
//!
//! # Example Usage
//!
//! ```no_run
//! use can_log_engine::{Catalog, CatalogEvent, EngineConfig, LoadDecision, SignalDefinitions};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let definitions = SignalDefinitions::from_file(Path::new("signals.toml")).unwrap();
//! let config = EngineConfig::new().with_load_decision(LoadDecision::Align);
//! let (catalog, events) = Catalog::new(config, Arc::new(definitions));
//!
//! let report = catalog.load_files(&["front.clg", "rear.clg"]).unwrap();
//! for (path, error) in &report.failures {
//!     eprintln!("Skipped {}: {}", path.display(), error);
//! }
//!
//! let file = catalog.datafile(report.loaded[0]).unwrap();
//! if let Some(speed) = file.find_by_name("VehicleSpeed") {
//!     let data = catalog.await_populated(speed.handle()).unwrap();
//!     println!("{} samples", data.len());
//! }
//!
//! while let Ok(event) = events.try_recv() {
//!     if let CatalogEvent::DatasetChanged(handle) = event {
//!         println!("{} ready", handle);
//!     }
//! }
//! ```

// Public modules
pub mod analysis;
pub mod catalog;
pub mod config;
pub mod datafile;
pub mod event_codes;
pub mod formats;
pub mod merge;
pub mod parser;
pub mod populator;
pub mod signals;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use catalog::{Catalog, CatalogEvent, LoadReport};
pub use config::{EngineConfig, LoadDecision};
pub use datafile::{Datafile, DatafileParts, PopulationState, Signal};
pub use formats::{ClgReader, LogFileReader, LogWriter, RawLog};
pub use merge::MergeEngine;
pub use parser::LogParser;
pub use populator::{NoopObserver, PopulationObserver, Populator, SchedulerState};
pub use signals::{DataType, DecodedSeries, SignalDecoder, SignalDefinitions, SignalDescriptor};
pub use store::{MessageStore, StoreBuilder};
pub use types::{EngineError, FileId, Result, SignalHandle, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
