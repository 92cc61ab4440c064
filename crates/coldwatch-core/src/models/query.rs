//! Query and response types shared between API and storage layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alert::{Alert, AlertStatus};
use super::reading::TemperatureReading;

/// Filter for listing readings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingFilter {
    /// Only readings from this location
    pub location_id: Option<String>,
    /// Only readings from this equipment
    pub equipment_id: Option<String>,
    /// Only readings recorded at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Only readings recorded at or before this instant
    pub until: Option<DateTime<Utc>>,
    /// Only in-range or only out-of-range readings
    pub in_range: Option<bool>,
    /// Maximum number of readings
    pub limit: Option<i64>,
}

impl ReadingFilter {
    /// Whether a reading satisfies every set criterion (limit excluded)
    pub fn matches(&self, reading: &TemperatureReading) -> bool {
        self.location_id.as_ref().map_or(true, |l| *l == reading.location_id)
            && self.equipment_id.as_ref().map_or(true, |e| *e == reading.equipment_id)
            && self.since.map_or(true, |s| reading.recorded_at >= s)
            && self.until.map_or(true, |u| reading.recorded_at <= u)
            && self.in_range.map_or(true, |r| r == reading.is_in_range)
    }
}

/// Filter for listing alerts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertFilter {
    /// Only alerts from this location
    pub location_id: Option<String>,
    /// Only alerts from this equipment
    pub equipment_id: Option<String>,
    /// Only alerts in this status
    pub status: Option<AlertStatus>,
    /// Only alerts created at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Only alerts created at or before this instant
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of alerts
    pub limit: Option<i64>,
}

impl AlertFilter {
    /// Whether an alert satisfies every set criterion (limit excluded)
    pub fn matches(&self, alert: &Alert) -> bool {
        self.status.map_or(true, |s| s == alert.status) && self.matches_scope(alert)
    }

    /// Like [`matches`](Self::matches) but ignoring `status`
    pub fn matches_scope(&self, alert: &Alert) -> bool {
        self.location_id.as_ref().map_or(true, |l| *l == alert.location_id)
            && self.equipment_id.as_ref().map_or(true, |e| *e == alert.equipment_id)
            && self.since.map_or(true, |s| alert.created_at >= s)
            && self.until.map_or(true, |u| alert.created_at <= u)
    }
}

/// Alert counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSummary {
    /// Alerts awaiting acknowledgement
    pub active: i64,
    /// Alerts acknowledged but not resolved
    pub acknowledged: i64,
    /// Resolved alerts
    pub resolved: i64,
}

impl AlertSummary {
    /// Count one alert in the bucket for `status`
    pub fn add(&mut self, status: AlertStatus, count: i64) {
        match status {
            AlertStatus::Active => self.active += count,
            AlertStatus::Acknowledged => self.acknowledged += count,
            AlertStatus::Resolved => self.resolved += count,
        }
    }

    /// Number of alerts across all statuses
    pub fn total(&self) -> i64 {
        self.active + self.acknowledged + self.resolved
    }
}

/// Result of an alert query
#[derive(Debug, Clone, Serialize)]
pub struct AlertQueryResult {
    /// Matching alerts, newest first
    pub alerts: Vec<Alert>,
    /// Counts over every alert matching the filter, ignoring its status criterion
    pub summary: AlertSummary,
}

/// Point-in-time statistics over a set of readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingStatistics {
    /// Number of readings
    pub total_readings: usize,
    /// Number of readings outside their threshold
    pub out_of_range: usize,
    /// Mean temperature
    pub average_temp: Option<f64>,
    /// Percentage of readings that were in range
    pub compliance_rate: Option<f64>,
}

/// Trend summary over a set of readings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureTrends {
    /// Mean temperature
    pub average: Option<f64>,
    /// Lowest temperature
    pub min: Option<f64>,
    /// Highest temperature
    pub max: Option<f64>,
    /// Most recently recorded reading
    pub latest: Option<TemperatureReading>,
}

/// Statistics for a single piece of equipment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentStatistics {
    /// Equipment the statistics cover
    pub equipment_id: String,
    /// Statistics over that equipment's readings
    pub statistics: ReadingStatistics,
}
