//! Signal layout descriptors
//!
//! A descriptor tells the decoder where a signal lives inside the payload of
//! its message and how to turn the raw bytes into a physical value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric type a signal's raw bytes are reinterpreted as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl DataType {
    /// Size of the type in bytes
    pub fn size(self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    /// Reinterpret the low bytes of a little-endian packed word as this type.
    ///
    /// This is a bit-pattern conversion, not a numeric cast of the whole word:
    /// `I8` reads the low byte as two's complement, `F32` reads the low 32
    /// bits as an IEEE-754 single. Bytes above the type's size are ignored.
    pub fn reinterpret(self, raw: u64) -> f64 {
        match self {
            DataType::U8 => raw as u8 as f64,
            DataType::I8 => raw as u8 as i8 as f64,
            DataType::U16 => raw as u16 as f64,
            DataType::I16 => raw as u16 as i16 as f64,
            DataType::U32 => raw as u32 as f64,
            DataType::I32 => raw as u32 as i32 as f64,
            DataType::U64 => raw as f64,
            DataType::I64 => raw as i64 as f64,
            DataType::F32 => f32::from_bits(raw as u32) as f64,
            DataType::F64 => f64::from_bits(raw),
        }
    }
}

impl TryFrom<u32> for DataType {
    type Error = u32;

    /// Numeric datatype codes used by older signal lists (0 = u8 ... 9 = f64)
    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => DataType::U8,
            1 => DataType::I8,
            2 => DataType::U16,
            3 => DataType::I16,
            4 => DataType::U32,
            5 => DataType::I32,
            6 => DataType::U64,
            7 => DataType::I64,
            8 => DataType::F32,
            9 => DataType::F64,
            other => return Err(other),
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::U8 => "u8",
            DataType::I8 => "i8",
            DataType::U16 => "u16",
            DataType::I16 => "i16",
            DataType::U32 => "u32",
            DataType::I32 => "i32",
            DataType::U64 => "u64",
            DataType::I64 => "i64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Static layout and metadata of one signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    /// Globally unique id of the signal kind, stable across files
    pub uid: u32,
    /// Signal name
    pub name: String,
    /// Physical quantity (e.g. "Voltage")
    #[serde(default)]
    pub quantity: String,
    /// Engineering unit (e.g. "V")
    #[serde(default)]
    pub unit: String,
    /// Message id carrying the signal
    pub id: u16,
    /// First payload byte of the signal
    pub byte_offset: u8,
    /// Number of payload bytes
    pub length: u8,
    pub datatype: DataType,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub offset: f32,
}

fn default_scale() -> f32 {
    1.0
}

impl SignalDescriptor {
    /// Descriptor with unit scale and no offset
    pub fn new(uid: u32, name: impl Into<String>, id: u16, byte_offset: u8, length: u8, datatype: DataType) -> Self {
        Self {
            uid,
            name: name.into(),
            quantity: String::new(),
            unit: String::new(),
            id,
            byte_offset,
            length,
            datatype,
            scale: 1.0,
            offset: 0.0,
        }
    }

    /// Builder method: set scale and offset
    pub fn with_scaling(mut self, scale: f32, offset: f32) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    /// Builder method: set quantity and unit
    pub fn with_unit(mut self, quantity: impl Into<String>, unit: impl Into<String>) -> Self {
        self.quantity = quantity.into();
        self.unit = unit.into();
        self
    }

    /// One past the last payload byte the signal reads
    pub fn end_byte(&self) -> usize {
        self.byte_offset as usize + self.length as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reinterpret_ignores_upper_bytes() {
        assert_eq!(DataType::U8.reinterpret(0xFF01), 1.0);
        assert_eq!(DataType::I8.reinterpret(0xFF), -1.0);
        assert_eq!(DataType::I16.reinterpret(0x1234_8000), -32768.0);
        assert_eq!(DataType::U32.reinterpret(0xAAAA_0000_0001), 1.0);
    }

    #[test]
    fn test_reinterpret_floats() {
        assert_eq!(DataType::F32.reinterpret(1.5f32.to_bits() as u64), 1.5);
        assert_eq!(DataType::F64.reinterpret((-2.25f64).to_bits()), -2.25);
    }

    #[test]
    fn test_datatype_codes() {
        assert_eq!(DataType::try_from(0), Ok(DataType::U8));
        assert_eq!(DataType::try_from(9), Ok(DataType::F64));
        assert_eq!(DataType::try_from(10), Err(10));
        assert_eq!(DataType::I32.to_string(), "i32");
        assert_eq!(DataType::F32.size(), 4);
    }
}
