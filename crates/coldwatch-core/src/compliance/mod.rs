//! Temperature compliance engine
//!
//! Ties threshold resolution, reading ingestion, the alert lifecycle and
//! statistics together behind [`ComplianceEngine`].

mod ingest;
pub mod period;
pub mod statistics;
pub mod threshold;

pub use ingest::{ReadingIngestor, RecordedReading};
pub use period::{resolve_period, resolve_period_at};
pub use statistics::{calculate_statistics, calculate_trends, equipment_breakdown};
pub use threshold::{in_range, violated_bound, ThresholdPolicy, ThresholdResolver};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::alerting::{
    AlertLifecycle, AlertNotifier, DeviationSeverityPolicy, NotificationSender, SeverityPolicy,
};
use crate::config::Config;
use crate::db::ComplianceStore;
use crate::error::Result;
use crate::models::{
    AcknowledgeInput, Alert, AlertFilter, AlertQueryResult, CommentInput, EquipmentStatistics,
    NewReading, ReadingFilter, ReadingStatistics, ResolveInput, TemperatureReading,
    TemperatureTrends, TemperatureUnit, Threshold,
};

/// Entry point for recording readings and managing alerts
pub struct ComplianceEngine {
    store: Arc<dyn ComplianceStore>,
    lifecycle: Arc<AlertLifecycle>,
    ingestor: ReadingIngestor,
}

impl ComplianceEngine {
    /// Build an engine from configuration.
    ///
    /// Notification channels listed under `[alerting]` are wired in
    /// automatically.
    pub fn new(store: Arc<dyn ComplianceStore>, config: &Config) -> Result<Self> {
        let severity_policy = Arc::new(DeviationSeverityPolicy::new(
            config.alerting.critical_deviation,
        ));
        let engine = Self::with_parts(
            store,
            ThresholdPolicy::from_config(&config.thresholds),
            severity_policy,
            config.alerting.max_update_retries,
        );

        if config.alerting.channels.is_empty() {
            return Ok(engine);
        }

        let sender = NotificationSender::new(
            config.alerting.channels.clone(),
            Duration::from_secs(config.alerting.notification_timeout_seconds),
        )?;
        Ok(engine.with_notifier(Arc::new(sender)))
    }

    /// Build an engine from explicit parts
    pub fn with_parts(
        store: Arc<dyn ComplianceStore>,
        policy: ThresholdPolicy,
        severity_policy: Arc<dyn SeverityPolicy>,
        max_update_retries: u32,
    ) -> Self {
        let lifecycle = Arc::new(AlertLifecycle::new(
            store.clone(),
            severity_policy,
            max_update_retries,
        ));
        let ingestor = ReadingIngestor::new(
            ThresholdResolver::new(policy),
            lifecycle.clone(),
            store.clone(),
        );

        Self {
            store,
            lifecycle,
            ingestor,
        }
    }

    /// Deliver new alerts through `notifier`
    pub fn with_notifier(self, notifier: Arc<dyn AlertNotifier>) -> Self {
        Self {
            ingestor: self.ingestor.with_notifier(notifier),
            ..self
        }
    }

    /// Record a reading
    pub async fn record(&self, input: NewReading) -> Result<RecordedReading> {
        self.ingestor.record(input).await
    }

    /// Acknowledge an alert
    pub async fn acknowledge_alert(
        &self,
        id: Uuid,
        input: AcknowledgeInput,
    ) -> Result<Option<Alert>> {
        self.lifecycle.acknowledge(id, input).await
    }

    /// Resolve an alert
    pub async fn resolve_alert(&self, id: Uuid, input: ResolveInput) -> Result<Option<Alert>> {
        self.lifecycle.resolve(id, input).await
    }

    /// Add a comment to an alert
    pub async fn comment_alert(&self, id: Uuid, input: CommentInput) -> Result<Option<Alert>> {
        self.lifecycle.comment(id, input).await
    }

    /// Get an alert by ID
    pub async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        self.lifecycle.get(id).await
    }

    /// Query alerts with status counts
    pub async fn get_alerts(&self, filter: &AlertFilter) -> Result<AlertQueryResult> {
        self.lifecycle.query(filter).await
    }

    /// List readings, newest first
    pub async fn list_readings(&self, filter: &ReadingFilter) -> Result<Vec<TemperatureReading>> {
        self.store.list_readings(filter).await
    }

    /// Statistics over the readings matching `filter`
    pub async fn get_statistics(&self, filter: &ReadingFilter) -> Result<ReadingStatistics> {
        let readings = self.store.list_readings(filter).await?;
        Ok(calculate_statistics(&readings))
    }

    /// Trends over the readings matching `filter`
    pub async fn get_trends(&self, filter: &ReadingFilter) -> Result<TemperatureTrends> {
        let readings = self.store.list_readings(filter).await?;
        Ok(calculate_trends(&readings))
    }

    /// Per-equipment statistics over the readings matching `filter`
    pub async fn get_equipment_breakdown(
        &self,
        filter: &ReadingFilter,
    ) -> Result<Vec<EquipmentStatistics>> {
        let readings = self.store.list_readings(filter).await?;
        Ok(equipment_breakdown(&readings))
    }

    /// Threshold a reading with these inputs would be evaluated against
    ///
    /// Fails with a validation error when the overrides are non-finite or inverted.
    pub fn resolve_threshold(
        &self,
        equipment_type: Option<&str>,
        override_min: Option<f64>,
        override_max: Option<f64>,
        unit: TemperatureUnit,
    ) -> Result<Threshold> {
        self.ingestor
            .resolver()
            .resolve_for_unit(equipment_type, override_min, override_max, unit)
    }

    /// The active threshold table
    pub fn thresholds(&self) -> &ThresholdPolicy {
        self.ingestor.resolver().policy()
    }

    /// Cutoff instant for a period token
    pub fn resolve_period(token: Option<&str>) -> Option<DateTime<Utc>> {
        resolve_period(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RangeConfig;
    use crate::db::MemoryStore;
    use crate::models::{AlertDirection, AlertNote, AlertStatus, AlertSummary};
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;

    fn engine(store: &MemoryStore) -> ComplianceEngine {
        ComplianceEngine::new(Arc::new(store.clone()), &Config::default()).unwrap()
    }

    fn fridge(equipment_id: &str, temperature: f64) -> NewReading {
        NewReading::new("loc-1", equipment_id, temperature, "sam").equipment_type("refrigerator")
    }

    #[tokio::test]
    async fn test_reading_to_resolution() {
        let store = MemoryStore::new();
        let engine = engine(&store);

        let recorded = engine.record(fridge("walkin-1", 50.0)).await.unwrap();
        assert!(!recorded.reading.is_in_range);
        let alert = recorded.alert.unwrap();
        assert_eq!(alert.status, AlertStatus::Active);

        let acked = engine
            .acknowledge_alert(
                alert.id,
                AcknowledgeInput {
                    acknowledged_by: "sam".to_string(),
                    note: Some("checking".to_string()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);

        let resolved = engine
            .resolve_alert(
                alert.id,
                ResolveInput {
                    resolved_by: "sam".to_string(),
                    note: None,
                    resolution: "replaced sensor".to_string(),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(resolved.acknowledged_by.as_deref(), Some("sam"));
        assert_eq!(resolved.resolved_by.as_deref(), Some("sam"));
        let messages: Vec<_> = resolved.notes.iter().map(AlertNote::message).collect();
        assert_eq!(messages, vec!["checking", "replaced sensor"]);

        let fetched = engine.get_alert(alert.id).await.unwrap().unwrap();
        assert_eq!(fetched, resolved);
    }

    #[tokio::test]
    async fn test_summary_ignores_status_filter() {
        let store = MemoryStore::new();
        let engine = engine(&store);

        let mut ids = Vec::new();
        for temperature in [50.0, 55.0, 20.0] {
            let recorded = engine.record(fridge("walkin-1", temperature)).await.unwrap();
            ids.push(recorded.alert.unwrap().id);
        }
        engine.record(fridge("walkin-2", 60.0)).await.unwrap();
        engine.record(fridge("walkin-1", 38.0)).await.unwrap();

        engine
            .acknowledge_alert(
                ids[0],
                AcknowledgeInput {
                    acknowledged_by: "sam".to_string(),
                    note: None,
                },
            )
            .await
            .unwrap();
        engine
            .resolve_alert(
                ids[1],
                ResolveInput {
                    resolved_by: "kim".to_string(),
                    note: None,
                    resolution: "door closed".to_string(),
                },
            )
            .await
            .unwrap();

        let result = engine
            .get_alerts(&AlertFilter {
                equipment_id: Some("walkin-1".to_string()),
                status: Some(AlertStatus::Active),
                ..AlertFilter::default()
            })
            .await
            .unwrap();

        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].direction, AlertDirection::Low);
        assert_eq!(
            result.summary,
            AlertSummary {
                active: 1,
                acknowledged: 1,
                resolved: 1,
            }
        );

        let everything = engine.get_alerts(&AlertFilter::default()).await.unwrap();
        assert_eq!(everything.summary.total(), 4);
        assert_eq!(everything.alerts.len() as i64, everything.summary.total());
    }

    #[tokio::test]
    async fn test_statistics_and_trends() {
        let store = MemoryStore::new();
        let engine = engine(&store);
        let start = Utc::now() - ChronoDuration::hours(2);

        for (minutes, equipment_id, temperature) in [
            (0, "walkin-1", 36.0),
            (10, "walkin-1", 38.0),
            (20, "walkin-2", 45.0),
            (30, "walkin-2", 40.0),
        ] {
            engine
                .record(
                    fridge(equipment_id, temperature)
                        .recorded_at(start + ChronoDuration::minutes(minutes)),
                )
                .await
                .unwrap();
        }

        let all = ReadingFilter::default();
        let stats = engine.get_statistics(&all).await.unwrap();
        assert_eq!(stats.total_readings, 4);
        assert_eq!(stats.out_of_range, 1);
        assert_eq!(stats.average_temp, Some(39.75));
        assert_eq!(stats.compliance_rate, Some(75.0));

        let trends = engine
            .get_trends(&ReadingFilter {
                equipment_id: Some("walkin-2".to_string()),
                ..ReadingFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(trends.min, Some(40.0));
        assert_eq!(trends.max, Some(45.0));
        assert_eq!(trends.latest.unwrap().temperature, 40.0);

        let breakdown = engine.get_equipment_breakdown(&all).await.unwrap();
        let ids: Vec<_> = breakdown.iter().map(|e| e.equipment_id.as_str()).collect();
        assert_eq!(ids, vec!["walkin-1", "walkin-2"]);
        assert_eq!(breakdown[1].statistics.out_of_range, 1);

        let recent = engine
            .get_statistics(&ReadingFilter {
                since: ComplianceEngine::resolve_period(Some("24h")),
                ..ReadingFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(recent.total_readings, 4);
    }

    #[tokio::test]
    async fn test_configured_thresholds_apply() {
        let store = MemoryStore::new();
        let mut config = Config::default();
        config.thresholds.equipment.insert(
            "Blast-Chiller".to_string(),
            RangeConfig {
                min: -40.0,
                max: 3.0,
            },
        );
        let engine = ComplianceEngine::new(Arc::new(store.clone()), &config).unwrap();

        assert_eq!(
            engine
                .resolve_threshold(Some("blast-chiller"), None, None, TemperatureUnit::Fahrenheit)
                .unwrap(),
            Threshold::new(-40.0, 3.0)
        );
        assert!(engine
            .resolve_threshold(Some("blast-chiller"), Some(5.0), Some(-5.0), TemperatureUnit::Fahrenheit)
            .unwrap_err()
            .is_validation());
        assert!(engine.thresholds().is_known("freezer"));

        let recorded = engine
            .record(NewReading::new("loc-1", "bc-1", 10.0, "sam").equipment_type("blast-chiller"))
            .await
            .unwrap();
        assert_eq!(recorded.alert.unwrap().direction, AlertDirection::High);
    }
}
