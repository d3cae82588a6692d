//! Signal descriptors, definition sets and the signal decoder
//!
//! This module contains the static description of signals (where they live in
//! a payload and how to scale them) and the decoder that turns a message
//! store into per-signal time series.

pub mod decoder;
pub mod definitions;
pub mod descriptor;

// Re-export key types for convenience
pub use decoder::{DecodedSeries, SignalDecoder};
pub use definitions::SignalDefinitions;
pub use descriptor::{DataType, SignalDescriptor};
