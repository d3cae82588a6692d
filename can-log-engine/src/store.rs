//! Columnar message storage
//!
//! A [`MessageStore`] holds every raw bus message of one log as three parallel
//! columns: message id, timestamp and a fixed-width payload. Column `i` of each
//! array describes the same physical message.

use crate::types::{EngineError, Result};

/// Payload width of classic CAN frames
pub const DEFAULT_PAYLOAD_WIDTH: usize = 8;

/// Immutable column-oriented table of raw messages
#[derive(Debug, Clone, PartialEq)]
pub struct MessageStore {
    ids: Vec<u16>,
    timestamps: Vec<f64>,
    /// Row-major `len() x width` bytes
    payloads: Vec<u8>,
    width: usize,
}

impl MessageStore {
    /// Build a store from its three columns.
    ///
    /// `payloads` holds `ids.len() * width` bytes, one `width`-sized chunk per
    /// message.
    pub fn new(ids: Vec<u16>, timestamps: Vec<f64>, payloads: Vec<u8>, width: usize) -> Result<Self> {
        if width == 0 {
            return Err(EngineError::Format("payload width must be at least 1".to_string()));
        }
        if ids.len() != timestamps.len() || payloads.len() != ids.len() * width {
            return Err(EngineError::Format(format!(
                "column lengths differ: {} ids, {} timestamps, {} payload bytes (width {})",
                ids.len(),
                timestamps.len(),
                payloads.len(),
                width
            )));
        }
        Ok(Self {
            ids,
            timestamps,
            payloads,
            width,
        })
    }

    /// An empty store with the given payload width
    pub fn empty(width: usize) -> Self {
        Self {
            ids: Vec::new(),
            timestamps: Vec::new(),
            payloads: Vec::new(),
            width: width.max(1),
        }
    }

    /// Build a store from `(id, time, payload)` rows, zero-padding short payloads.
    pub fn from_rows<'a, I>(rows: I, width: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (u16, f64, &'a [u8])>,
    {
        let mut builder = StoreBuilder::new(width);
        for (id, time, payload) in rows {
            builder.push(id, time, payload)?;
        }
        Ok(builder.finish())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Payload width in bytes
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn ids(&self) -> &[u16] {
        &self.ids
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Payload of message `index`
    pub fn payload(&self, index: usize) -> &[u8] {
        let start = index * self.width;
        &self.payloads[start..start + self.width]
    }

    /// Iterate over payloads in column order
    pub fn payloads(&self) -> std::slice::ChunksExact<'_, u8> {
        self.payloads.chunks_exact(self.width)
    }

    /// Indices of all messages carrying `id`, in column order
    pub fn columns_for(&self, id: u16) -> impl Iterator<Item = usize> + '_ {
        self.ids
            .iter()
            .enumerate()
            .filter(move |(_, msg_id)| **msg_id == id)
            .map(|(index, _)| index)
    }

    /// First and last timestamp, if any
    pub fn time_span(&self) -> Option<(f64, f64)> {
        Some((*self.timestamps.first()?, *self.timestamps.last()?))
    }
}

/// Incremental builder used by parsers and by the merge engine
#[derive(Debug)]
pub struct StoreBuilder {
    ids: Vec<u16>,
    timestamps: Vec<f64>,
    payloads: Vec<u8>,
    width: usize,
}

impl StoreBuilder {
    pub fn new(width: usize) -> Self {
        Self::with_capacity(width, 0)
    }

    pub fn with_capacity(width: usize, messages: usize) -> Self {
        let width = width.max(1);
        Self {
            ids: Vec::with_capacity(messages),
            timestamps: Vec::with_capacity(messages),
            payloads: Vec::with_capacity(messages * width),
            width,
        }
    }

    /// Append one message; payloads shorter than the width are zero-padded
    pub fn push(&mut self, id: u16, time: f64, payload: &[u8]) -> Result<()> {
        if payload.len() > self.width {
            return Err(EngineError::Format(format!(
                "payload of {} bytes exceeds store width {}",
                payload.len(),
                self.width
            )));
        }
        self.ids.push(id);
        self.timestamps.push(time);
        self.payloads.extend_from_slice(payload);
        self.payloads
            .extend(std::iter::repeat(0u8).take(self.width - payload.len()));
        Ok(())
    }

    /// Append every message of `store`, shifting its timestamps by `time_shift`
    pub fn extend_from(&mut self, store: &MessageStore, time_shift: f64) -> Result<()> {
        for (index, payload) in store.payloads().enumerate() {
            self.push(store.ids[index], store.timestamps[index] + time_shift, payload)?;
        }
        Ok(())
    }

    pub fn finish(self) -> MessageStore {
        MessageStore {
            ids: self.ids,
            timestamps: self.timestamps,
            payloads: self.payloads,
            width: self.width,
        }
    }
}
