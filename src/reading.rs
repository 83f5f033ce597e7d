//! Sensor readings
//!
//! A typed payload for the common case of logging sensor samples. Readings
//! are serialized with bincode and stored like any other blob, with the
//! sensor type as the record's type id.

use serde::{Deserialize, Serialize};

use crate::error::{FlashBlobError, Result};

/// Most values one reading carries
pub const MAX_VALUES: usize = 4;

/// Longest label in bytes
pub const MAX_LABEL_LEN: usize = 15;

/// Record type ids used for sensor readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorType {
    Temperature,
    Humidity,
    Pressure,
    Acceleration,
    Custom,
}

impl SensorType {
    /// Type id stored in the record header
    pub fn type_id(self) -> u32 {
        match self {
            SensorType::Temperature => 1,
            SensorType::Humidity => 2,
            SensorType::Pressure => 3,
            SensorType::Acceleration => 4,
            SensorType::Custom => 99,
        }
    }

    /// Inverse of [`type_id`](Self::type_id)
    pub fn from_type_id(type_id: u32) -> Option<Self> {
        match type_id {
            1 => Some(SensorType::Temperature),
            2 => Some(SensorType::Humidity),
            3 => Some(SensorType::Pressure),
            4 => Some(SensorType::Acceleration),
            99 => Some(SensorType::Custom),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
            SensorType::Pressure => "pressure",
            SensorType::Acceleration => "acceleration",
            SensorType::Custom => "custom",
        }
    }
}

impl From<SensorType> for u32 {
    fn from(t: SensorType) -> u32 {
        t.type_id()
    }
}

/// One sample from one sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: u32,
    /// Sample time in the caller's time base
    pub timestamp: u32,
    /// Up to four channels (e.g. x/y/z acceleration)
    pub values: Vec<f32>,
    /// Short free-form tag
    pub label: String,
}

impl SensorReading {
    pub fn new(sensor_id: u32, timestamp: u32, label: impl Into<String>) -> Self {
        Self {
            sensor_id,
            timestamp,
            values: Vec::new(),
            label: label.into(),
        }
    }

    /// Append a value
    pub fn with_value(mut self, value: f32) -> Self {
        self.values.push(value);
        self
    }

    /// Check value count and label length
    pub fn validate(&self) -> Result<()> {
        if self.values.len() > MAX_VALUES {
            return Err(FlashBlobError::Serialization(format!(
                "reading has {} values (max {})",
                self.values.len(),
                MAX_VALUES
            )));
        }
        if self.label.len() > MAX_LABEL_LEN {
            return Err(FlashBlobError::Serialization(format!(
                "label is {} bytes (max {})",
                self.label.len(),
                MAX_LABEL_LEN
            )));
        }
        Ok(())
    }

    /// Serialize into a record payload
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        Ok(bincode::serialize(self)?)
    }

    /// Parse a record payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let reading: SensorReading = bincode::deserialize(bytes)?;
        reading.validate()?;
        Ok(reading)
    }
}
