//! Engine configuration types
//!
//! This module defines the small set of knobs the engine needs. Everything
//! else (which signals to show, export settings, ...) belongs to the
//! application layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do with a batch of freshly parsed files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadDecision {
    /// Keep files independent, each on its own time origin
    #[default]
    Separate,
    /// Put all files of the batch on the time origin of the earliest one
    Align,
    /// Align, then merge the batch into a single datafile
    AlignAndMerge,
}

impl LoadDecision {
    pub fn aligns(self) -> bool {
        !matches!(self, LoadDecision::Separate)
    }

    pub fn merges(self) -> bool {
        matches!(self, LoadDecision::AlignAndMerge)
    }
}

/// Configuration for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Start population of every file as soon as it is loaded
    #[serde(default = "default_true")]
    pub auto_populate: bool,

    /// Decision used by `Catalog::load_files` when no callback is supplied
    #[serde(default)]
    pub load_decision: LoadDecision,

    /// Default bound for blocking population waits. `None` or 0 waits
    /// forever; 0 is the only way to say so from TOML.
    #[serde(default = "default_await_timeout")]
    pub await_timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_await_timeout() -> Option<u64> {
    Some(30_000)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_populate: true,
            load_decision: LoadDecision::default(),
            await_timeout_ms: default_await_timeout(),
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable automatic population
    pub fn with_auto_populate(mut self, enabled: bool) -> Self {
        self.auto_populate = enabled;
        self
    }

    /// Builder method: set the default load decision
    pub fn with_load_decision(mut self, decision: LoadDecision) -> Self {
        self.load_decision = decision;
        self
    }

    /// Builder method: set the wait bound (None disables it)
    pub fn with_await_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.await_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn await_timeout(&self) -> Option<Duration> {
        self.await_timeout_ms.filter(|&ms| ms > 0).map(Duration::from_millis)
    }
}
