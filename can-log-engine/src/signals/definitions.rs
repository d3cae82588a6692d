//! Signal definition sets
//!
//! Signal layouts are not part of the log container; they are supplied per
//! device type in a TOML file:
//!
//! ```toml
//! [[device]]
//! name = "INTCANLOG2"
//!
//! [[device.signal]]
//! uid = 1
//! name = "FC voltage"
//! quantity = "Voltage"
//! unit = "V"
//! id = 0x120
//! byte_offset = 0
//! length = 2
//! datatype = "u16"   # or a numeric code, 0 = u8 ... 9 = f64
//! scale = 0.01
//! ```

use crate::signals::descriptor::{DataType, SignalDescriptor};
use crate::types::{EngineError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Descriptor lists keyed by device type name
#[derive(Debug, Clone, Default)]
pub struct SignalDefinitions {
    devices: BTreeMap<String, Vec<SignalDescriptor>>,
}

#[derive(Debug, Deserialize)]
struct DefinitionsFile {
    #[serde(default, rename = "device")]
    devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    name: String,
    #[serde(default, rename = "signal")]
    signals: Vec<SignalEntry>,
}

#[derive(Debug, Deserialize)]
struct SignalEntry {
    uid: u32,
    name: String,
    #[serde(default)]
    quantity: String,
    #[serde(default)]
    unit: String,
    id: u16,
    byte_offset: u8,
    length: u8,
    datatype: DatatypeField,
    #[serde(default = "default_scale")]
    scale: f32,
    #[serde(default)]
    offset: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DatatypeField {
    Name(DataType),
    Code(u32),
}

fn default_scale() -> f32 {
    1.0
}

impl SignalEntry {
    fn into_descriptor(self, device: &str) -> Result<SignalDescriptor> {
        let datatype = match self.datatype {
            DatatypeField::Name(datatype) => datatype,
            DatatypeField::Code(code) => DataType::try_from(code).map_err(|code| {
                EngineError::Definitions(format!(
                    "device '{}', signal '{}': unknown datatype code {}",
                    device, self.name, code
                ))
            })?,
        };
        Ok(SignalDescriptor {
            uid: self.uid,
            name: self.name,
            quantity: self.quantity,
            unit: self.unit,
            id: self.id,
            byte_offset: self.byte_offset,
            length: self.length,
            datatype,
            scale: self.scale,
            offset: self.offset,
        })
    }
}

impl SignalDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load definitions from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        log::info!("Loading signal definitions: {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Definitions(format!("Failed to read {:?}: {}", path, e))
        })?;
        let definitions = Self::from_toml_str(&content)?;

        log::info!(
            "Loaded {} device(s), {} signal(s) from {:?}",
            definitions.devices.len(),
            definitions.num_signals(),
            path
        );
        Ok(definitions)
    }

    /// Parse definitions from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: DefinitionsFile = toml::from_str(content)
            .map_err(|e| EngineError::Definitions(e.to_string()))?;

        let mut definitions = Self::new();
        for device in file.devices {
            let descriptors = device
                .signals
                .into_iter()
                .map(|entry| entry.into_descriptor(&device.name))
                .collect::<Result<Vec<_>>>()?;
            definitions.add_device(device.name, descriptors)?;
        }
        Ok(definitions)
    }

    /// Register the descriptor list of a device type.
    ///
    /// UIDs must be unique within the device; a device can only be added once.
    pub fn add_device(&mut self, name: impl Into<String>, descriptors: Vec<SignalDescriptor>) -> Result<()> {
        let name = name.into();
        if self.devices.contains_key(&name) {
            return Err(EngineError::Definitions(format!("device '{}' defined twice", name)));
        }

        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.uid) {
                return Err(EngineError::Definitions(format!(
                    "device '{}': uid {} used by more than one signal",
                    name, descriptor.uid
                )));
            }
        }

        self.devices.insert(name, descriptors);
        Ok(())
    }

    /// Descriptors of a device, in definition order
    pub fn device(&self, name: &str) -> Option<&[SignalDescriptor]> {
        self.devices.get(name).map(Vec::as_slice)
    }

    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn num_signals(&self) -> usize {
        self.devices.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITIONS: &str = r#"
        [[device]]
        name = "INTCANLOG2"

        [[device.signal]]
        uid = 1
        name = "FC voltage"
        quantity = "Voltage"
        unit = "V"
        id = 0x120
        byte_offset = 0
        length = 2
        datatype = "u16"
        scale = 0.01

        [[device.signal]]
        uid = 2
        name = "Stack temperature"
        id = 0x121
        byte_offset = 2
        length = 1
        datatype = 1
    "#;

    #[test]
    fn test_parse_definitions() {
        let definitions = SignalDefinitions::from_toml_str(DEFINITIONS).unwrap();
        let signals = definitions.device("INTCANLOG2").unwrap();

        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].id, 0x120);
        assert_eq!(signals[0].datatype, DataType::U16);
        assert_eq!(signals[0].scale, 0.01);
        assert_eq!(signals[0].unit, "V");
        assert_eq!(signals[1].datatype, DataType::I8);
        assert_eq!(signals[1].scale, 1.0);
        assert_eq!(signals[1].offset, 0.0);
        assert!(definitions.device("OTHER").is_none());
    }

    #[test]
    fn test_unknown_datatype_code() {
        let content = DEFINITIONS.replace("datatype = 1", "datatype = 42");
        let result = SignalDefinitions::from_toml_str(&content);
        assert!(matches!(result, Err(EngineError::Definitions(_))));
    }

    #[test]
    fn test_duplicate_uid_rejected() {
        let content = DEFINITIONS.replace("uid = 2", "uid = 1");
        let result = SignalDefinitions::from_toml_str(&content);
        assert!(matches!(result, Err(EngineError::Definitions(_))));
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let mut definitions = SignalDefinitions::new();
        definitions.add_device("A", Vec::new()).unwrap();
        assert!(definitions.add_device("A", Vec::new()).is_err());
    }
}
