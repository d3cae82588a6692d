//! Emergency (EMCY) event decoding
//!
//! Devices report faults as event words: the low 16 bits carry the event code,
//! byte 3 the severity, bytes 4..8 device-specific details. A signal spanning
//! the whole word keeps the packed bytes in [`DecodedSeries::raw`], which is
//! what [`decode_events`] consumes.
//!
//! Code descriptions come from a plain text table with one entry per line:
//!
//! ```text
//! 0x1A02;SYSTEM_LEVEL_HV;Isolation fault;show
//! ```

use crate::signals::DecodedSeries;
use crate::types::{EngineError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Severity carried in byte 3 of an event word
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    None = 0,
    Event = 1,
    Anomaly = 2,
    Notice = 3,
    Inhibiting = 4,
    Critical = 5,
    Panic = 6,
    Unknown = 7,
}

impl From<u8> for Severity {
    fn from(value: u8) -> Self {
        match value {
            0 => Severity::None,
            1 => Severity::Event,
            2 => Severity::Anomaly,
            3 => Severity::Notice,
            4 => Severity::Inhibiting,
            5 => Severity::Critical,
            6 => Severity::Panic,
            _ => Severity::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:?}", self))
    }
}

/// One decoded event
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub time: f64,
    pub code: u16,
    pub severity: Severity,
    pub details: [u8; 4],
}

impl EventRecord {
    pub fn from_raw(time: f64, raw: u64) -> Self {
        Self {
            time,
            code: (raw & 0xFFFF) as u16,
            severity: Severity::from(((raw >> 24) & 0xFF) as u8),
            details: ((raw >> 32) as u32).to_le_bytes(),
        }
    }
}

/// Decode every sample of a series as an event word
pub fn decode_events(series: &DecodedSeries) -> Vec<EventRecord> {
    series
        .time
        .iter()
        .zip(&series.raw)
        .map(|(&time, &raw)| EventRecord::from_raw(time, raw))
        .collect()
}

/// Subsystem an event code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemLevel {
    None,
    System,
    LowVoltage,
    HighVoltage,
    TractionGeneral,
    TractionFront,
    TractionRear,
    FuelCellGeneral,
    FuelCellLeft,
    FuelCellRight,
    HighSide,
    LowSide,
}

impl SystemLevel {
    fn parse(tag: &str) -> Option<Self> {
        let level = match tag {
            "SYSTEM_LEVEL_NONE" => SystemLevel::None,
            "EMCY_LEVEL_SYSTEM" | "SYSTEM_LEVEL_SYSTEM" => SystemLevel::System,
            "EMCY_LEVEL_LV" | "SYSTEM_LEVEL_LV" => SystemLevel::LowVoltage,
            "EMCY_LEVEL_HV" | "SYSTEM_LEVEL_HV" => SystemLevel::HighVoltage,
            "EMCY_LEVEL_TRACTION" | "SYSTEM_LEVEL_TR_GENERAL" => SystemLevel::TractionGeneral,
            "SYSTEM_LEVEL_TR_FRONT" => SystemLevel::TractionFront,
            "SYSTEM_LEVEL_TR_REAR" => SystemLevel::TractionRear,
            "EMCY_LEVEL_FC" | "SYSTEM_LEVEL_FC_GENERAL" => SystemLevel::FuelCellGeneral,
            "SYSTEM_LEVEL_FC_LEFT" => SystemLevel::FuelCellLeft,
            "SYSTEM_LEVEL_FC_RIGHT" => SystemLevel::FuelCellRight,
            "EMCY_LEVEL_HIGH_SIDE" => SystemLevel::HighSide,
            "EMCY_LEVEL_LOW_SIDE" => SystemLevel::LowSide,
            _ => return None,
        };
        Some(level)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SystemLevel::None => "None",
            SystemLevel::System => "System",
            SystemLevel::LowVoltage => "Low Voltage",
            SystemLevel::HighVoltage => "High Voltage",
            SystemLevel::TractionGeneral => "Traction General",
            SystemLevel::TractionFront => "Traction Front",
            SystemLevel::TractionRear => "Traction Rear",
            SystemLevel::FuelCellGeneral => "Fuel Cell General",
            SystemLevel::FuelCellLeft => "Fuel Cell Left",
            SystemLevel::FuelCellRight => "Fuel Cell Right",
            SystemLevel::HighSide => "High side",
            SystemLevel::LowSide => "Low side",
        }
    }
}

/// Description of one event code
#[derive(Debug, Clone, PartialEq)]
pub struct EventCodeInfo {
    pub level: SystemLevel,
    pub text: String,
    /// Hidden codes are left out of event listings
    pub hide: bool,
}

/// Lookup table from event code to description
#[derive(Debug, Clone, Default)]
pub struct EventCodeTable {
    entries: HashMap<u16, EventCodeInfo>,
}

impl EventCodeTable {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse `code;level;text;hide` lines. Lines shorter than five characters
    /// are skipped; a later duplicate replaces the earlier entry.
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = HashMap::new();

        for (number, line) in content.lines().enumerate() {
            if line.len() < 5 {
                continue;
            }
            let fields: Vec<&str> = line.split(';').map(str::trim).collect();
            let [code, level, text, hide, ..] = fields[..] else {
                return Err(EngineError::Definitions(format!(
                    "event code line {} needs 4 fields: '{}'",
                    number + 1,
                    line
                )));
            };

            let digits = code.trim_start_matches("0x").trim_start_matches("0X");
            let code = u16::from_str_radix(digits, 16).map_err(|e| {
                EngineError::Definitions(format!("event code line {}: bad code '{}': {}", number + 1, code, e))
            })?;

            let level = SystemLevel::parse(level).unwrap_or_else(|| {
                log::warn!("Unknown system level '{}' for event code {:#06x}", level, code);
                SystemLevel::None
            });

            let info = EventCodeInfo {
                level,
                text: text.to_string(),
                hide: hide == "hide",
            };
            if entries.insert(code, info).is_some() {
                log::warn!("Duplicate event code {:#06x} in code table", code);
            }
        }

        log::debug!("Loaded {} event code description(s)", entries.len());
        Ok(Self { entries })
    }

    pub fn describe(&self, code: u16) -> Option<&EventCodeInfo> {
        self.entries.get(&code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_word_fields() {
        let record = EventRecord::from_raw(1.5, 0xDDCC_BBAA_0500_1A02);
        assert_eq!(record.code, 0x1A02);
        assert_eq!(record.severity, Severity::Critical);
        assert_eq!(record.details, [0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(record.time, 1.5);
    }

    #[test]
    fn test_severity_out_of_range() {
        assert_eq!(Severity::from(7), Severity::Unknown);
        assert_eq!(Severity::from(0x42), Severity::Unknown);
        assert_eq!(Severity::from(0), Severity::None);
        assert_eq!(Severity::Panic.to_string(), "Panic");
    }

    #[test]
    fn test_decode_series() {
        let series = DecodedSeries {
            time: vec![0.1, 0.2],
            value: vec![0.0, 0.0],
            raw: vec![0x0100_0001, 0x0600_0002],
        };
        let events = decode_events(&series);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].severity, Severity::Event);
        assert_eq!(events[1].code, 2);
        assert_eq!(events[1].severity, Severity::Panic);
    }

    #[test]
    fn test_code_table() {
        let content = "\
0x1A02; SYSTEM_LEVEL_HV ; Isolation fault ; show
ff01;EMCY_LEVEL_FC;Stack overtemperature;hide

x
0x1A02;EMCY_LEVEL_LV;Replaced;show
";
        let table = EventCodeTable::parse(content).unwrap();
        assert_eq!(table.len(), 2);

        let stack = table.describe(0xFF01).unwrap();
        assert_eq!(stack.level, SystemLevel::FuelCellGeneral);
        assert_eq!(stack.text, "Stack overtemperature");
        assert!(stack.hide);

        let replaced = table.describe(0x1A02).unwrap();
        assert_eq!(replaced.text, "Replaced");
        assert_eq!(replaced.level.label(), "Low Voltage");
        assert!(table.describe(0x0001).is_none());
    }

    #[test]
    fn test_code_table_rejects_short_lines() {
        assert!(matches!(
            EventCodeTable::parse("0x0001;SYSTEM_LEVEL_LV"),
            Err(EngineError::Definitions(_))
        ));
        assert!(EventCodeTable::parse("zz;SYSTEM_LEVEL_LV;text;show").is_err());
    }
}
