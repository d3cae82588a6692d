//! Log parser API
//!
//! The [`LogParser`] reads a log container from disk and turns it into a
//! [`Datafile`]: the message columns plus one empty signal per descriptor
//! defined for the recording device.

use crate::datafile::{Datafile, DatafileParts};
use crate::formats::{ClgReader, LogFileReader, RawLog};
use crate::signals::SignalDefinitions;
use crate::types::{EngineError, FileId, Result};
use chrono::Duration;
use std::path::Path;
use std::sync::Arc;

/// Reads log files and attaches signal definitions to them
#[derive(Debug, Clone)]
pub struct LogParser {
    definitions: Arc<SignalDefinitions>,
}

impl LogParser {
    pub fn new(definitions: Arc<SignalDefinitions>) -> Self {
        Self { definitions }
    }

    pub fn definitions(&self) -> &SignalDefinitions {
        &self.definitions
    }

    /// Parse a log file into a datafile with id `id`.
    ///
    /// Fails with `Io` if the file cannot be read and with `Format` if its
    /// layout is wrong or its device has no signal definitions.
    pub fn parse(&self, path: &Path, id: FileId) -> Result<Datafile> {
        log::info!("Parsing log file: {:?}", path);

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        let raw = match extension.as_deref() {
            Some(ext) if ClgReader::EXTENSIONS.contains(&ext) => {
                log::debug!("Detected CLG container");
                ClgReader::read(path)?
            }
            _ => {
                return Err(EngineError::Format(format!(
                    "Unsupported file format: {:?}",
                    extension
                )))
            }
        };

        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();

        let datafile = self.build(raw, name, Some(path), id)?;
        log::info!(
            "Parsed {:?}: {} message(s), {} signal(s)",
            path,
            datafile.store().len(),
            datafile.signals().len()
        );
        Ok(datafile)
    }

    /// Attach the device's signal set to an already-read container
    pub fn build(&self, raw: RawLog, name: String, source: Option<&Path>, id: FileId) -> Result<Datafile> {
        let descriptors = self
            .definitions
            .device(&raw.device)
            .ok_or_else(|| {
                EngineError::Format(format!("no signal definitions for device '{}'", raw.device))
            })?
            .to_vec();

        let end_time = match raw.store.time_span() {
            Some((_, last)) => raw.start_time + seconds_to_duration(last),
            None => raw.start_time,
        };

        Ok(Datafile::new(
            id,
            DatafileParts {
                name,
                device: raw.device,
                source: source.map(Path::to_path_buf),
                store: raw.store,
                descriptors,
                start_time: raw.start_time,
                end_time,
            },
        ))
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::microseconds((seconds * 1e6).round() as i64)
    } else {
        Duration::zero()
    }
}
