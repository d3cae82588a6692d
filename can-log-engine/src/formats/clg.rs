//! CLG (column log) container reader and writer
//!
//! A CLG file stores the raw message matrix of a CAN capture column by
//! column, little-endian:
//!
//! | field      | type          | notes                                      |
//! |------------|---------------|--------------------------------------------|
//! | magic      | 4 bytes       | `CLG1`                                     |
//! | version    | u16           | 1                                          |
//! | width      | u8            | payload width W, 1..=64                    |
//! | reserved   | u8            | 0                                          |
//! | start time | 7 x u16       | year, month, day, hour, min, sec, millis   |
//! | device     | u16 + bytes   | UTF-8 device type name                     |
//! | count      | u64           | number of messages N                       |
//! | ids        | N x u16       |                                            |
//! | timestamps | N x f64       | seconds since start time                   |
//! | payloads   | N x W bytes   |                                            |
//!
//! The whole file is read into memory before decoding.

use super::{LogFileReader, RawLog};
use crate::store::MessageStore;
use crate::types::{timestamp_from_fields, timestamp_to_fields, EngineError, Result, Timestamp};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 4] = b"CLG1";
pub const VERSION: u16 = 1;
pub const MAX_WIDTH: usize = 64;

/// Bytes per message across the three columns, excluding the payload
const FIXED_BYTES_PER_MESSAGE: u64 = 2 + 8;

/// CLG container reader
pub struct ClgReader;

impl LogFileReader for ClgReader {
    const EXTENSIONS: &'static [&'static str] = &["clg"];

    fn read(path: &Path) -> Result<RawLog> {
        log::info!("Reading CLG file: {:?}", path);

        let bytes = std::fs::read(path)?;
        let log = Self::read_bytes(&bytes)?;

        log::info!(
            "CLG file read: {} message(s), device '{}', width {}",
            log.store.len(),
            log.device,
            log.store.width()
        );
        Ok(log)
    }
}

impl ClgReader {
    /// Parse a container held in memory
    pub fn read_bytes(bytes: &[u8]) -> Result<RawLog> {
        let mut cursor = Cursor::new(bytes);
        Self::read_from(&mut cursor, bytes.len() as u64).map_err(truncation_is_format_error)
    }

    fn read_from(cursor: &mut Cursor<&[u8]>, total: u64) -> Result<RawLog> {
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(EngineError::Format(format!("bad magic {:02X?}", magic)));
        }

        let version = cursor.read_u16::<LittleEndian>()?;
        if version != VERSION {
            return Err(EngineError::Format(format!("unsupported version {}", version)));
        }

        let width = cursor.read_u8()? as usize;
        if width == 0 || width > MAX_WIDTH {
            return Err(EngineError::Format(format!("invalid payload width {}", width)));
        }
        let _reserved = cursor.read_u8()?;

        let mut fields = [0u16; 7];
        cursor.read_u16_into::<LittleEndian>(&mut fields)?;
        let start_time = timestamp_from_fields(fields)
            .ok_or_else(|| EngineError::Format(format!("invalid start time {:?}", fields)))?;

        let device_len = cursor.read_u16::<LittleEndian>()? as usize;
        let mut device = vec![0u8; device_len];
        cursor.read_exact(&mut device)?;
        let device = String::from_utf8(device)
            .map_err(|_| EngineError::Format("device name is not UTF-8".to_string()))?;

        let count = cursor.read_u64::<LittleEndian>()?;
        let remaining = total - cursor.position();
        let expected = count
            .checked_mul(FIXED_BYTES_PER_MESSAGE + width as u64)
            .ok_or_else(|| EngineError::Format(format!("message count {} overflows", count)))?;
        if expected != remaining {
            return Err(EngineError::Format(format!(
                "{} message(s) of width {} need {} bytes, file has {}",
                count, width, expected, remaining
            )));
        }

        let count = count as usize;
        let mut ids = vec![0u16; count];
        cursor.read_u16_into::<LittleEndian>(&mut ids)?;

        let mut timestamps = vec![0f64; count];
        cursor.read_f64_into::<LittleEndian>(&mut timestamps)?;

        let mut payloads = vec![0u8; count * width];
        cursor.read_exact(&mut payloads)?;

        let store = MessageStore::new(ids, timestamps, payloads, width)?;
        Ok(RawLog {
            device,
            start_time,
            store,
        })
    }
}

fn truncation_is_format_error(err: EngineError) -> EngineError {
    match err {
        EngineError::Io(msg) => EngineError::Format(format!("truncated container: {}", msg)),
        other => other,
    }
}

/// Writes message stores in the CLG layout
pub struct LogWriter {
    device: String,
    start_time: Timestamp,
}

impl LogWriter {
    pub fn new(device: impl Into<String>, start_time: Timestamp) -> Self {
        Self {
            device: device.into(),
            start_time,
        }
    }

    /// Write `store` to a new file at `path`
    pub fn write_file(&self, path: &Path, store: &MessageStore) -> Result<()> {
        log::debug!("Writing {} message(s) to {:?}", store.len(), path);
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer, store)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize `store` into any writer
    pub fn write<W: Write>(&self, writer: &mut W, store: &MessageStore) -> Result<()> {
        let device = self.device.as_bytes();
        if device.len() > u16::MAX as usize {
            return Err(EngineError::Format("device name too long".to_string()));
        }
        if store.width() > MAX_WIDTH {
            return Err(EngineError::Format(format!("payload width {} too large", store.width())));
        }

        writer.write_all(MAGIC)?;
        writer.write_u16::<LittleEndian>(VERSION)?;
        writer.write_u8(store.width() as u8)?;
        writer.write_u8(0)?;
        for field in timestamp_to_fields(&self.start_time) {
            writer.write_u16::<LittleEndian>(field)?;
        }
        writer.write_u16::<LittleEndian>(device.len() as u16)?;
        writer.write_all(device)?;

        writer.write_u64::<LittleEndian>(store.len() as u64)?;
        for &id in store.ids() {
            writer.write_u16::<LittleEndian>(id)?;
        }
        for &time in store.timestamps() {
            writer.write_f64::<LittleEndian>(time)?;
        }
        for payload in store.payloads() {
            writer.write_all(payload)?;
        }
        Ok(())
    }

    /// Serialize `store` into a byte vector
    pub fn to_bytes(&self, store: &MessageStore) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write(&mut bytes, store)?;
        Ok(bytes)
    }
}
