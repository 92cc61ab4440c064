//! Temperature reading data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Acceptable temperature range. A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Threshold {
    /// Lowest acceptable temperature (inclusive)
    pub min: Option<f64>,
    /// Highest acceptable temperature (inclusive)
    pub max: Option<f64>,
}

impl Threshold {
    /// Create a threshold with both bounds set
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Whether `min <= max` holds (trivially true when a bound is missing)
    pub fn is_ordered(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<f64>| b.map_or_else(|| "unbounded".to_string(), |v| format!("{v:.1}"));
        write!(f, "[{}, {}]", bound(self.min), bound(self.max))
    }
}

/// Temperature unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TemperatureUnit {
    /// Degrees Fahrenheit
    #[default]
    #[serde(rename = "F")]
    Fahrenheit,
    /// Degrees Celsius
    #[serde(rename = "C")]
    Celsius,
}

impl TemperatureUnit {
    /// Short symbol used in storage and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fahrenheit => "F",
            Self::Celsius => "C",
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "F" | "FAHRENHEIT" => Ok(Self::Fahrenheit),
            "C" | "CELSIUS" => Ok(Self::Celsius),
            other => Err(format!("unknown temperature unit '{other}'")),
        }
    }
}

/// How a reading entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadingSource {
    /// Entered by a person
    #[default]
    Manual,
    /// Reported by a sensor
    Sensor,
}

impl ReadingSource {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Sensor => "sensor",
        }
    }
}

impl FromStr for ReadingSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "sensor" => Ok(Self::Sensor),
            other => Err(format!("unknown reading source '{other}'")),
        }
    }
}

/// A recorded temperature measurement.
///
/// Readings are append-only: once stored they are never edited, so the
/// threshold that applied at recording time is kept as a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureReading {
    /// Unique identifier
    pub id: Uuid,

    /// Location the equipment belongs to
    pub location_id: String,

    /// Equipment that was measured
    pub equipment_id: String,

    /// Equipment type as supplied by the caller (e.g. "freezer")
    pub equipment_type: Option<String>,

    /// Measured temperature
    pub temperature: f64,

    /// Unit of `temperature`
    pub unit: TemperatureUnit,

    /// Threshold applied when the reading was recorded
    pub threshold: Threshold,

    /// Whether the temperature was within `threshold`
    pub is_in_range: bool,

    /// Manual entry or sensor feed
    pub source: ReadingSource,

    /// Sensor that produced the reading
    pub sensor_id: Option<String>,

    /// Person or system that recorded the reading
    pub recorded_by: String,

    /// When the reading was taken
    pub recorded_at: DateTime<Utc>,

    /// Free-form notes
    pub notes: Option<String>,

    /// Corrective action taken at recording time
    pub corrective_action: Option<String>,

    /// Whether an alert was created for this reading
    pub alert_sent: bool,

    /// Opaque caller metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Input for recording a reading
#[derive(Debug, Clone, Default)]
pub struct NewReading {
    /// Location the reading was taken at
    pub location_id: String,
    /// Equipment the reading was taken from
    pub equipment_id: String,
    /// Equipment type used for the threshold lookup
    pub equipment_type: Option<String>,
    /// Measured temperature
    pub temperature: f64,
    /// Unit of `temperature`
    pub unit: TemperatureUnit,
    /// Who took the reading
    pub recorded_by: String,
    /// Free-form notes
    pub notes: Option<String>,
    /// Lower bound override, used only together with the upper one
    pub threshold_min_override: Option<f64>,
    /// Upper bound override, used only together with the lower one
    pub threshold_max_override: Option<f64>,
    /// How the reading was taken, manual when absent
    pub source: Option<ReadingSource>,
    /// Sensor identifier for automatic readings
    pub sensor_id: Option<String>,
    /// Action taken when the reading was out of range
    pub corrective_action: Option<String>,
    /// When the reading was taken, defaults to now
    pub recorded_at: Option<DateTime<Utc>>,
    /// Extra key/value data
    pub metadata: HashMap<String, serde_json::Value>,
}

impl NewReading {
    /// Start a reading with the required fields set
    pub fn new(
        location_id: impl Into<String>,
        equipment_id: impl Into<String>,
        temperature: f64,
        recorded_by: impl Into<String>,
    ) -> Self {
        Self {
            location_id: location_id.into(),
            equipment_id: equipment_id.into(),
            temperature,
            recorded_by: recorded_by.into(),
            ..Self::default()
        }
    }

    /// Set the equipment type
    pub fn equipment_type(mut self, equipment_type: impl Into<String>) -> Self {
        self.equipment_type = Some(equipment_type.into());
        self
    }

    /// Set the unit
    pub fn unit(mut self, unit: TemperatureUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Override the threshold for this reading only
    pub fn thresholds(mut self, min: f64, max: f64) -> Self {
        self.threshold_min_override = Some(min);
        self.threshold_max_override = Some(max);
        self
    }

    /// Mark the reading as coming from a sensor
    pub fn from_sensor(mut self, sensor_id: impl Into<String>) -> Self {
        self.source = Some(ReadingSource::Sensor);
        self.sensor_id = Some(sensor_id.into());
        self
    }

    /// Attach a note
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Set the recording time explicitly
    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }
}
