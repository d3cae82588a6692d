//! Signal Decoding Engine
//!
//! Extracts one signal's time series from a message store based on its
//! descriptor. Handles message selection, little-endian byte packing,
//! datatype reinterpretation and physical value conversion.

use crate::signals::descriptor::SignalDescriptor;
use crate::store::MessageStore;
use crate::types::{EngineError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Largest number of bytes the 64-bit accumulator can hold
const MAX_SIGNAL_BYTES: usize = 8;

/// Decoded samples of one signal, in message order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSeries {
    /// Seconds since the start of the store's file
    pub time: Vec<f64>,
    /// Physical values (`raw * scale + offset`)
    pub value: Vec<f64>,
    /// Packed payload words before type conversion
    pub raw: Vec<u64>,
}

impl DecodedSeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Signal decoder - extracts time series from message stores
pub struct SignalDecoder;

impl SignalDecoder {
    /// Decode every sample of `descriptor` from `store`.
    ///
    /// Messages are selected by id in column order. A descriptor whose id
    /// does not occur in the store yields an empty series. A descriptor that
    /// reads outside the payload width fails with `DescriptorMismatch`.
    pub fn decode(store: &MessageStore, descriptor: &SignalDescriptor) -> Result<DecodedSeries> {
        Self::validate(descriptor, store.width())?;

        let columns: Vec<usize> = store.columns_for(descriptor.id).collect();
        let mut series = DecodedSeries {
            time: Vec::with_capacity(columns.len()),
            value: Vec::with_capacity(columns.len()),
            raw: Vec::with_capacity(columns.len()),
        };

        let timestamps = store.timestamps();
        let scale = descriptor.scale as f64;
        let offset = descriptor.offset as f64;

        for column in columns {
            let raw = Self::extract_raw(store.payload(column), descriptor);
            let physical = descriptor.datatype.reinterpret(raw) * scale + offset;

            series.time.push(timestamps[column]);
            series.value.push(physical);
            series.raw.push(raw);
        }

        log::trace!(
            "Decoded {} sample(s) of '{}' (id 0x{:X})",
            series.len(),
            descriptor.name,
            descriptor.id
        );
        Ok(series)
    }

    /// Check that a descriptor fits payloads of `width` bytes
    pub fn validate(descriptor: &SignalDescriptor, width: usize) -> Result<()> {
        let length = descriptor.length as usize;
        if length == 0 || length > MAX_SIGNAL_BYTES || descriptor.end_byte() > width {
            log::warn!(
                "Signal '{}' reads bytes {}..{} but payloads are {} bytes wide",
                descriptor.name,
                descriptor.byte_offset,
                descriptor.end_byte(),
                width
            );
            return Err(EngineError::DescriptorMismatch {
                uid: descriptor.uid,
                name: descriptor.name.clone(),
                byte_offset: descriptor.byte_offset,
                length: descriptor.length,
                width,
            });
        }
        Ok(())
    }

    /// Pack the signal's bytes into a little-endian word.
    ///
    /// Callers validate the descriptor first, so the range is in bounds and
    /// holds between 1 and 8 bytes.
    fn extract_raw(payload: &[u8], descriptor: &SignalDescriptor) -> u64 {
        let start = descriptor.byte_offset as usize;
        LittleEndian::read_uint(&payload[start..descriptor.end_byte()], descriptor.length as usize)
    }
}
