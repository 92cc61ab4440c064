//! Severity assignment for new alerts

use crate::models::{AlertDirection, Severity, TemperatureReading, TemperatureUnit};

/// Decides how severe a new alert is
pub trait SeverityPolicy: Send + Sync {
    /// Severity for an alert opened by `reading` violating the `direction` bound
    fn assess(&self, reading: &TemperatureReading, direction: AlertDirection) -> Severity;
}

/// Critical when the reading is far past the violated bound, warning otherwise
#[derive(Debug, Clone)]
pub struct DeviationSeverityPolicy {
    /// Fahrenheit degrees past the bound at which an alert becomes critical.
    /// Celsius readings are scaled before the comparison.
    pub critical_deviation: f64,
}

impl Default for DeviationSeverityPolicy {
    fn default() -> Self {
        Self {
            critical_deviation: 10.0,
        }
    }
}

impl DeviationSeverityPolicy {
    /// Policy with the critical cut-off in Fahrenheit degrees
    pub fn new(critical_deviation: f64) -> Self {
        Self { critical_deviation }
    }
}

impl SeverityPolicy for DeviationSeverityPolicy {
    fn assess(&self, reading: &TemperatureReading, direction: AlertDirection) -> Severity {
        let deviation = match direction {
            AlertDirection::Low => reading.threshold.min.map(|min| min - reading.temperature),
            AlertDirection::High => reading.threshold.max.map(|max| reading.temperature - max),
        }
        .unwrap_or(0.0);

        let deviation = match reading.unit {
            TemperatureUnit::Fahrenheit => deviation,
            TemperatureUnit::Celsius => deviation * 9.0 / 5.0,
        };

        if deviation >= self.critical_deviation {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }
}

/// Assigns the same severity to every alert
#[derive(Debug, Clone, Copy)]
pub struct FixedSeverityPolicy(pub Severity);

impl SeverityPolicy for FixedSeverityPolicy {
    fn assess(&self, _reading: &TemperatureReading, _direction: AlertDirection) -> Severity {
        self.0
    }
}
