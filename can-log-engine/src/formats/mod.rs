//! Log container formats
//!
//! This module contains readers for the on-disk log containers. Each reader
//! turns a file into a [`RawLog`]: the message columns plus the metadata the
//! parser needs to attach signals to them.

use crate::store::MessageStore;
use crate::types::{Result, Timestamp};
use std::path::Path;

pub mod clg;

// Re-export reader types
pub use clg::{ClgReader, LogWriter};

/// Messages and metadata read from one container
#[derive(Debug, Clone, PartialEq)]
pub struct RawLog {
    /// Device type that recorded the log (selects the signal definitions)
    pub device: String,
    /// Absolute time of the first message
    pub start_time: Timestamp,
    pub store: MessageStore,
}

/// Common trait for all container readers
pub trait LogFileReader {
    /// File extensions (lowercase, without dot) handled by this reader
    const EXTENSIONS: &'static [&'static str];

    /// Read a whole container into memory
    fn read(path: &Path) -> Result<RawLog>;
}
