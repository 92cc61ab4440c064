//! In-process store for development and tests

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Alert, AlertFilter, AlertSummary, ReadingFilter, TemperatureReading};

use super::{AlertStore, ComplianceStore, ReadingStore};

#[derive(Default)]
struct State {
    readings: Vec<TemperatureReading>,
    alerts: HashMap<Uuid, Alert>,
}

impl State {
    fn check_alert_is_new(&self, alert: &Alert) -> Result<()> {
        if self.alerts.contains_key(&alert.id) {
            return Err(Error::storage(format!("alert {} already exists", alert.id)));
        }
        Ok(())
    }

    fn list_alerts(&self, filter: &AlertFilter) -> Vec<Alert> {
        let mut alerts: Vec<_> = self
            .alerts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        take_limit(alerts, filter.limit)
    }

    fn count_alerts(&self, filter: &AlertFilter) -> AlertSummary {
        let mut summary = AlertSummary::default();
        for alert in self.alerts.values().filter(|a| filter.matches_scope(a)) {
            summary.add(alert.status, 1);
        }
        summary
    }
}

/// Store holding readings and alerts in memory.
///
/// Clones share the same underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored readings
    pub fn reading_count(&self) -> usize {
        self.state.read().readings.len()
    }

    /// Number of stored alerts
    pub fn alert_count(&self) -> usize {
        self.state.read().alerts.len()
    }
}

fn take_limit<T>(mut items: Vec<T>, limit: Option<i64>) -> Vec<T> {
    if let Some(limit) = limit {
        items.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
    }
    items
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert_reading(&self, reading: &TemperatureReading) -> Result<()> {
        self.state.write().readings.push(reading.clone());
        Ok(())
    }

    async fn list_readings(&self, filter: &ReadingFilter) -> Result<Vec<TemperatureReading>> {
        let state = self.state.read();
        let mut readings: Vec<_> = state
            .readings
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        readings.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(take_limit(readings, filter.limit))
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        let mut state = self.state.write();
        state.check_alert_is_new(alert)?;
        state.alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        Ok(self.state.read().alerts.get(&id).cloned())
    }

    async fn update_alert(&self, alert: &Alert) -> Result<bool> {
        let mut state = self.state.write();
        match state.alerts.get_mut(&alert.id) {
            Some(stored) if stored.version == alert.version => {
                *stored = alert.clone();
                stored.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>> {
        Ok(self.state.read().list_alerts(filter))
    }

    async fn count_alerts(&self, filter: &AlertFilter) -> Result<AlertSummary> {
        Ok(self.state.read().count_alerts(filter))
    }

    async fn query_alerts(&self, filter: &AlertFilter) -> Result<(Vec<Alert>, AlertSummary)> {
        let state = self.state.read();
        Ok((state.list_alerts(filter), state.count_alerts(filter)))
    }
}

#[async_trait]
impl ComplianceStore for MemoryStore {
    async fn insert_reading_with_alert(
        &self,
        reading: &TemperatureReading,
        alert: Option<&Alert>,
    ) -> Result<()> {
        let mut state = self.state.write();
        if let Some(alert) = alert {
            state.check_alert_is_new(alert)?;
            state.alerts.insert(alert.id, alert.clone());
        }
        state.readings.push(reading.clone());
        Ok(())
    }
}
