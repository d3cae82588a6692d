//! Core types for the CAN log engine
//!
//! This module defines the handles, the timestamp type and the error taxonomy
//! shared by the parser, the population scheduler, the merge engine and the
//! catalog.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the engine
pub type Timestamp = DateTime<Utc>;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Handle of a datafile inside a [`Catalog`](crate::Catalog) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// Handle of a signal: owning file plus position in that file's signal set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalHandle {
    /// Owning datafile
    pub file: FileId,
    /// Index into the file's signal set (descriptor order)
    pub index: usize,
}

impl SignalHandle {
    pub fn new(file: FileId, index: usize) -> Self {
        Self { file, index }
    }
}

impl fmt::Display for SignalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/signal#{}", self.file, self.index)
    }
}

/// Errors that can occur while loading, decoding or merging logs
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid log container: {0}")]
    Format(String),

    #[error("Invalid signal definitions: {0}")]
    Definitions(String),

    #[error(
        "Signal '{name}' (uid {uid}) reads {length} byte(s) at offset {byte_offset}, \
         but payloads are {width} byte(s) wide"
    )]
    DescriptorMismatch {
        uid: u32,
        name: String,
        byte_offset: u8,
        length: u8,
        width: usize,
    },

    #[error("Unknown datafile: {0}")]
    UnknownFile(FileId),

    #[error("Unknown signal: {0}")]
    UnknownSignal(SignalHandle),

    #[error("Timed out after {waited:?} waiting for signal '{name}'")]
    Timeout {
        name: String,
        waited: std::time::Duration,
    },

    #[error("Nothing to merge")]
    NothingToMerge,

    #[error("None of the {failures} requested file(s) could be loaded")]
    NoFilesLoaded { failures: usize },
}

// Kept as a string so the error stays `Clone`; a failed decode is stored on
// the signal and handed to every waiter.
impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

/// Build an absolute timestamp from the seven-field start time stored in log
/// containers: year, month, day, hour, minute, second, millisecond.
///
/// Milliseconds must be below 1000; leap-second encodings are rejected.
pub fn timestamp_from_fields(fields: [u16; 7]) -> Option<Timestamp> {
    let [year, month, day, hour, minute, second, millis] = fields;
    if millis >= 1000 {
        return None;
    }
    let naive = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?
        .and_hms_milli_opt(hour as u32, minute as u32, second as u32, millis as u32)?;
    Some(naive.and_utc())
}

/// Split a timestamp back into the seven container fields
pub fn timestamp_to_fields(ts: &Timestamp) -> [u16; 7] {
    use chrono::{Datelike, Timelike};
    [
        ts.year() as u16,
        ts.month() as u16,
        ts.day() as u16,
        ts.hour() as u16,
        ts.minute() as u16,
        ts.second() as u16,
        (ts.timestamp_subsec_millis() % 1000) as u16,
    ]
}

/// Convert a duration to seconds, splitting at whole seconds so the
/// millisecond remainder is added separately. Sub-millisecond parts are
/// truncated.
pub fn duration_to_secs(duration: Duration) -> f64 {
    let whole = duration.num_seconds();
    let millis = duration.num_milliseconds() - whole * 1000;
    whole as f64 + millis as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_fields() {
        let ts = timestamp_from_fields([2019, 8, 18, 16, 48, 31, 250]).unwrap();
        assert_eq!(ts.to_rfc3339(), "2019-08-18T16:48:31.250+00:00");
        assert_eq!(timestamp_to_fields(&ts), [2019, 8, 18, 16, 48, 31, 250]);
    }

    #[test]
    fn test_invalid_timestamp_fields() {
        assert!(timestamp_from_fields([2019, 13, 1, 0, 0, 0, 0]).is_none());
        assert!(timestamp_from_fields([2019, 2, 30, 0, 0, 0, 0]).is_none());
        assert!(timestamp_from_fields([2019, 1, 1, 24, 0, 0, 0]).is_none());
        assert!(timestamp_from_fields([2019, 1, 1, 12, 0, 59, 1500]).is_none());
        assert!(timestamp_from_fields([2019, 1, 1, 12, 0, 10, 1000]).is_none());
        assert!(timestamp_from_fields([2019, 1, 1, 12, 0, 59, 999]).is_some());
    }

    #[test]
    fn test_duration_to_secs() {
        assert_eq!(duration_to_secs(Duration::milliseconds(1500)), 1.5);
        assert_eq!(duration_to_secs(Duration::seconds(2)), 2.0);
        assert_eq!(duration_to_secs(Duration::milliseconds(250)), 0.25);
        assert_eq!(duration_to_secs(Duration::microseconds(2_500_999)), 2.5);
        assert_eq!(duration_to_secs(Duration::zero()), 0.0);
    }

    #[test]
    fn test_handle_display() {
        let handle = SignalHandle::new(FileId(3), 7);
        assert_eq!(handle.to_string(), "file#3/signal#7");
    }
}
