//! Alert state machine: active → acknowledged → resolved
//!
//! Every mutation is a load / apply / compare-and-swap cycle on the alert's
//! `version`. When another writer wins the race the transition is re-applied
//! to the fresh copy. Transitions only move forward and are no-ops once
//! their target state is reached, so replaying them can never undo a
//! concurrent acknowledge or resolve.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::compliance::violated_bound;
use crate::db::ComplianceStore;
use crate::error::{Error, Result};
use crate::models::{
    AcknowledgeInput, Alert, AlertDirection, AlertFilter, AlertNote, AlertQueryResult,
    AlertStatus, CommentInput, ResolveInput, Severity, TemperatureReading,
};

use super::severity::SeverityPolicy;

/// Creates alerts and drives them through their lifecycle
pub struct AlertLifecycle {
    store: Arc<dyn ComplianceStore>,
    severity_policy: Arc<dyn SeverityPolicy>,
    max_update_retries: u32,
}

impl AlertLifecycle {
    /// Create a lifecycle over a store
    pub fn new(
        store: Arc<dyn ComplianceStore>,
        severity_policy: Arc<dyn SeverityPolicy>,
        max_update_retries: u32,
    ) -> Self {
        Self {
            store,
            severity_policy,
            max_update_retries,
        }
    }

    /// Build a new active alert for an out-of-range reading without storing it
    pub fn build(
        &self,
        reading: &TemperatureReading,
        direction: AlertDirection,
        severity: Option<Severity>,
    ) -> Result<Alert> {
        if violated_bound(reading.temperature, &reading.threshold) != Some(direction) {
            return Err(Error::validation(format!(
                "reading {} at {} does not violate the {} bound of {}",
                reading.id,
                reading.temperature,
                direction.as_str(),
                reading.threshold
            )));
        }

        let severity =
            severity.unwrap_or_else(|| self.severity_policy.assess(reading, direction));
        let now = Utc::now();

        Ok(Alert {
            id: Uuid::new_v4(),
            temperature_log_id: reading.id,
            location_id: reading.location_id.clone(),
            equipment_id: reading.equipment_id.clone(),
            equipment_type: reading.equipment_type.clone(),
            temperature: reading.temperature,
            unit: reading.unit,
            threshold: reading.threshold,
            direction,
            status: AlertStatus::Active,
            severity,
            message: format_alert_message(reading, direction),
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            resolution: None,
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Create and store a new active alert
    pub async fn create(
        &self,
        reading: &TemperatureReading,
        direction: AlertDirection,
        severity: Option<Severity>,
    ) -> Result<Alert> {
        let alert = self.build(reading, direction, severity)?;
        self.store.insert_alert(&alert).await?;
        record_created(&alert);
        Ok(alert)
    }

    /// Get an alert by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Alert>> {
        self.store.get_alert(id).await
    }

    /// Acknowledge an alert. Returns `None` for an unknown id.
    pub async fn acknowledge(&self, id: Uuid, input: AcknowledgeInput) -> Result<Option<Alert>> {
        require("acknowledgedBy", &input.acknowledged_by)?;

        let alert = self
            .transition(id, "acknowledged", |alert, now| {
                apply_acknowledge(alert, &input, now)
            })
            .await?;

        if let Some(alert) = &alert {
            info!(alert_id = %id, by = %input.acknowledged_by, status = alert.status.as_str(), "Alert acknowledged");
        }
        Ok(alert)
    }

    /// Resolve an alert, acknowledging it first if still active.
    /// Returns `None` for an unknown id.
    pub async fn resolve(&self, id: Uuid, input: ResolveInput) -> Result<Option<Alert>> {
        require("resolvedBy", &input.resolved_by)?;
        require("resolution", &input.resolution)?;

        let alert = self
            .transition(id, "resolved", |alert, now| {
                apply_resolve(alert, &input, now)
            })
            .await?;

        if alert.is_some() {
            info!(alert_id = %id, by = %input.resolved_by, "Alert resolved");
        }
        Ok(alert)
    }

    /// Append a comment without changing status. Returns `None` for an unknown id.
    pub async fn comment(&self, id: Uuid, input: CommentInput) -> Result<Option<Alert>> {
        require("author", &input.author)?;
        require("message", &input.message)?;

        self.transition(id, "comment", |alert, now| {
            alert.notes.push(AlertNote::Comment {
                message: input.message.clone(),
                author: input.author.clone(),
                timestamp: now,
            });
            true
        })
        .await
    }

    /// Alerts matching `filter` plus status counts over the filter's scope
    pub async fn query(&self, filter: &AlertFilter) -> Result<AlertQueryResult> {
        let (alerts, summary) = self.store.query_alerts(filter).await?;

        debug!(
            returned = alerts.len(),
            active = summary.active,
            acknowledged = summary.acknowledged,
            resolved = summary.resolved,
            "Queried alerts"
        );

        Ok(AlertQueryResult { alerts, summary })
    }

    async fn transition<F>(&self, id: Uuid, kind: &'static str, apply: F) -> Result<Option<Alert>>
    where
        F: Fn(&mut Alert, DateTime<Utc>) -> bool + Send + Sync,
    {
        for attempt in 0..=self.max_update_retries {
            let Some(mut alert) = self.store.get_alert(id).await? else {
                return Ok(None);
            };

            let now = Utc::now();
            if !apply(&mut alert, now) {
                debug!(alert_id = %id, status = alert.status.as_str(), "Transition is a no-op");
                return Ok(Some(alert));
            }
            alert.updated_at = now;

            if self.store.update_alert(&alert).await? {
                alert.version += 1;
                metrics::counter!("coldwatch_alert_transitions_total", "kind" => kind)
                    .increment(1);
                return Ok(Some(alert));
            }

            debug!(alert_id = %id, attempt, "Alert changed concurrently, retrying");
        }

        Err(Error::conflict(format!(
            "alert {id} kept changing concurrently, gave up after {} attempts",
            self.max_update_retries + 1
        )))
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Record metrics for a newly created alert
pub(crate) fn record_created(alert: &Alert) {
    metrics::counter!(
        "coldwatch_alerts_created_total",
        "direction" => alert.direction.as_str(),
        "severity" => alert.severity.as_str()
    )
    .increment(1);
}

/// Apply an acknowledge. Only an active alert changes.
fn apply_acknowledge(alert: &mut Alert, input: &AcknowledgeInput, now: DateTime<Utc>) -> bool {
    if alert.status != AlertStatus::Active {
        return false;
    }

    alert.status = AlertStatus::Acknowledged;
    alert.acknowledged_by = Some(input.acknowledged_by.clone());
    alert.acknowledged_at = Some(now);

    if let Some(note) = &input.note {
        alert.notes.push(AlertNote::Acknowledged {
            message: note.clone(),
            author: input.acknowledged_by.clone(),
            timestamp: now,
        });
    }

    true
}

/// Apply a resolve. A resolved alert does not change.
fn apply_resolve(alert: &mut Alert, input: &ResolveInput, now: DateTime<Utc>) -> bool {
    if alert.status == AlertStatus::Resolved {
        return false;
    }

    if alert.status == AlertStatus::Active {
        alert
            .acknowledged_by
            .get_or_insert_with(|| input.resolved_by.clone());
        alert.acknowledged_at.get_or_insert(now);
        alert.status = AlertStatus::Acknowledged;
    }

    alert.status = AlertStatus::Resolved;
    alert.resolved_by = Some(input.resolved_by.clone());
    alert.resolved_at = Some(now);
    alert.resolution = Some(input.resolution.clone());
    alert.notes.push(AlertNote::Resolved {
        message: input.note.clone().unwrap_or_else(|| input.resolution.clone()),
        author: input.resolved_by.clone(),
        timestamp: now,
    });

    true
}

/// Format alert message
fn format_alert_message(reading: &TemperatureReading, direction: AlertDirection) -> String {
    let unit = reading.unit.as_str();
    let (verb, bound) = match direction {
        AlertDirection::Low => ("fell below minimum", reading.threshold.min),
        AlertDirection::High => ("exceeded maximum", reading.threshold.max),
    };

    let equipment = match &reading.equipment_type {
        Some(t) => format!("{} ({})", reading.equipment_id, t),
        None => reading.equipment_id.clone(),
    };

    format!(
        "{} at location {} {} of {:.1}°{} (reading: {:.1}°{})",
        equipment,
        reading.location_id,
        verb,
        bound.unwrap_or_default(),
        unit,
        reading.temperature,
        unit
    )
}
