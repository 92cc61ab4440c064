//! Alert data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::reading::{TemperatureUnit, Threshold};

/// Alert severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Warning
    #[default]
    Warning,
    /// Critical
    Critical,
}

impl Severity {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Status of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Alert is open and nobody has responded
    #[default]
    Active,
    /// Someone is handling the alert
    Acknowledged,
    /// Alert has been closed out
    Resolved,
}

impl AlertStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "acknowledged" => Ok(Self::Acknowledged),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!("unknown alert status '{other}'")),
        }
    }
}

/// Which threshold bound a reading violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    /// Below the minimum
    Low,
    /// Above the maximum
    High,
}

impl AlertDirection {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

impl FromStr for AlertDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "high" => Ok(Self::High),
            other => Err(format!("unknown alert direction '{other}'")),
        }
    }
}

/// An entry in an alert's audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertNote {
    /// Written when the alert was acknowledged with a note
    Acknowledged {
        /// Note text
        message: String,
        /// Who wrote the note
        author: String,
        /// When the note was written
        timestamp: DateTime<Utc>,
    },
    /// Written when the alert was resolved
    Resolved {
        /// Note text
        message: String,
        /// Who wrote the note
        author: String,
        /// When the note was written
        timestamp: DateTime<Utc>,
    },
    /// Free-form comment
    Comment {
        /// Note text
        message: String,
        /// Who wrote the note
        author: String,
        /// When the note was written
        timestamp: DateTime<Utc>,
    },
}

impl AlertNote {
    /// Note text
    pub fn message(&self) -> &str {
        match self {
            Self::Acknowledged { message, .. }
            | Self::Resolved { message, .. }
            | Self::Comment { message, .. } => message,
        }
    }

    /// Who wrote the note
    pub fn author(&self) -> &str {
        match self {
            Self::Acknowledged { author, .. }
            | Self::Resolved { author, .. }
            | Self::Comment { author, .. } => author,
        }
    }

    /// When the note was written
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Acknowledged { timestamp, .. }
            | Self::Resolved { timestamp, .. }
            | Self::Comment { timestamp, .. } => *timestamp,
        }
    }
}

/// A tracked out-of-range event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique identifier
    pub id: Uuid,

    /// The reading that opened this alert
    pub temperature_log_id: Uuid,

    /// Location of the equipment
    pub location_id: String,

    /// Equipment that went out of range
    pub equipment_id: String,

    /// Equipment type recorded with the reading
    pub equipment_type: Option<String>,

    /// Temperature that triggered the alert
    pub temperature: f64,

    /// Unit of `temperature`
    pub unit: TemperatureUnit,

    /// Threshold that was violated
    pub threshold: Threshold,

    /// Which bound was violated
    pub direction: AlertDirection,

    /// Current status
    pub status: AlertStatus,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Who acknowledged the alert
    pub acknowledged_by: Option<String>,
    /// When the alert was acknowledged
    pub acknowledged_at: Option<DateTime<Utc>>,

    /// Who resolved the alert
    pub resolved_by: Option<String>,
    /// When the alert was resolved
    pub resolved_at: Option<DateTime<Utc>>,

    /// How the problem was fixed
    pub resolution: Option<String>,

    /// Append-only audit trail
    pub notes: Vec<AlertNote>,

    /// When the alert was opened
    pub created_at: DateTime<Utc>,

    /// When the alert last changed
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency counter, bumped on every stored update
    pub version: i64,
}

/// Notification channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationChannel {
    /// Slack webhook
    Slack {
        /// Incoming webhook URL
        webhook_url: String,
        /// Channel override
        channel: Option<String>,
    },
    /// Generic webhook
    Webhook {
        /// Endpoint receiving the alert as JSON
        url: String,
        /// Extra request headers as a JSON object
        headers: Option<serde_json::Value>,
    },
    /// PagerDuty Events API v2
    PagerDuty {
        /// Integration routing key
        routing_key: String,
        /// Events endpoint
        #[serde(default = "default_pagerduty_url")]
        events_url: String,
    },
}

fn default_pagerduty_url() -> String {
    "https://events.pagerduty.com/v2/enqueue".to_string()
}

impl NotificationChannel {
    /// Short name used in logs and delivery records
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Slack { .. } => "slack",
            Self::Webhook { .. } => "webhook",
            Self::PagerDuty { .. } => "pagerduty",
        }
    }
}

/// Input for acknowledging an alert
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeInput {
    /// Who is acknowledging
    pub acknowledged_by: String,
    /// Optional note for the audit trail
    pub note: Option<String>,
}

/// Input for resolving an alert
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveInput {
    /// Who is resolving
    pub resolved_by: String,
    /// Optional note for the audit trail
    pub note: Option<String>,
    /// How the problem was fixed
    pub resolution: String,
}

/// Input for commenting on an alert
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentInput {
    /// Comment author
    pub author: String,
    /// Comment text
    pub message: String,
}
