//! Reading ingestion
//!
//! Recording a reading resolves its threshold, evaluates it, and stores it
//! together with the alert it opens when out of range. Notifications go out
//! only after both rows are stored.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alerting::{record_created, AlertLifecycle, AlertNotifier};
use crate::db::ComplianceStore;
use crate::error::{Error, Result};
use crate::models::{Alert, NewReading, TemperatureReading};

use super::threshold::{in_range, violated_bound, ThresholdResolver};

/// Outcome of recording a reading
#[derive(Debug, Clone)]
pub struct RecordedReading {
    /// The stored reading
    pub reading: TemperatureReading,
    /// Alert opened by the reading, present exactly when it was out of range
    pub alert: Option<Alert>,
}

/// Validates, evaluates and persists incoming readings
pub struct ReadingIngestor {
    resolver: ThresholdResolver,
    lifecycle: Arc<AlertLifecycle>,
    store: Arc<dyn ComplianceStore>,
    notifier: Option<Arc<dyn AlertNotifier>>,
}

impl ReadingIngestor {
    /// Create a new ingestor
    pub fn new(
        resolver: ThresholdResolver,
        lifecycle: Arc<AlertLifecycle>,
        store: Arc<dyn ComplianceStore>,
    ) -> Self {
        Self {
            resolver,
            lifecycle,
            store,
            notifier: None,
        }
    }

    /// Send every new alert to `notifier` once stored
    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// The threshold resolver used for new readings
    pub fn resolver(&self) -> &ThresholdResolver {
        &self.resolver
    }

    /// Record a reading, opening an alert when it is out of range
    pub async fn record(&self, input: NewReading) -> Result<RecordedReading> {
        validate(&input)?;

        let threshold = self.resolver.resolve_for_unit(
            input.equipment_type.as_deref(),
            input.threshold_min_override,
            input.threshold_max_override,
            input.unit,
        )?;
        let is_in_range = in_range(input.temperature, &threshold);

        let mut reading = TemperatureReading {
            id: Uuid::new_v4(),
            location_id: input.location_id,
            equipment_id: input.equipment_id,
            equipment_type: input.equipment_type,
            temperature: input.temperature,
            unit: input.unit,
            threshold,
            is_in_range,
            source: input.source.unwrap_or_default(),
            sensor_id: input.sensor_id,
            recorded_by: input.recorded_by,
            recorded_at: input.recorded_at.unwrap_or_else(Utc::now),
            notes: input.notes,
            corrective_action: input.corrective_action,
            alert_sent: false,
            metadata: input.metadata,
        };

        let alert = match violated_bound(reading.temperature, &reading.threshold) {
            Some(direction) => {
                let alert = self.lifecycle.build(&reading, direction, None)?;
                reading.alert_sent = true;
                Some(alert)
            }
            None => None,
        };

        self.store
            .insert_reading_with_alert(&reading, alert.as_ref())
            .await?;

        metrics::counter!(
            "coldwatch_readings_recorded_total",
            "in_range" => if is_in_range { "true" } else { "false" }
        )
        .increment(1);

        match &alert {
            Some(alert) => {
                record_created(alert);
                info!(
                    reading_id = %reading.id,
                    alert_id = %alert.id,
                    equipment_id = %reading.equipment_id,
                    temperature = reading.temperature,
                    threshold = %reading.threshold,
                    severity = alert.severity.as_str(),
                    "Out-of-range reading recorded"
                );
                self.notify(alert).await;
            }
            None => debug!(
                reading_id = %reading.id,
                equipment_id = %reading.equipment_id,
                temperature = reading.temperature,
                "Reading recorded"
            ),
        }

        Ok(RecordedReading { reading, alert })
    }

    async fn notify(&self, alert: &Alert) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        for result in notifier.notify(alert).await {
            if !result.success {
                warn!(
                    alert_id = %alert.id,
                    channel = %result.channel_type,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Alert notification was not delivered"
                );
            }
        }
    }
}

fn validate(input: &NewReading) -> Result<()> {
    for (field, value) in [
        ("locationId", &input.location_id),
        ("equipmentId", &input.equipment_id),
        ("recordedBy", &input.recorded_by),
    ] {
        if value.trim().is_empty() {
            return Err(Error::validation(format!("{field} is required")));
        }
    }

    if !input.temperature.is_finite() {
        return Err(Error::validation("temperature must be a finite number"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::{DeviationSeverityPolicy, NotificationResult};
    use crate::db::{AlertStore, MemoryStore, ReadingStore};
    use crate::models::{
        AlertDirection, AlertFilter, AlertStatus, AlertSummary, ReadingFilter, ReadingSource,
        Severity, TemperatureUnit, Threshold,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ingestor(store: &MemoryStore) -> ReadingIngestor {
        let store: Arc<dyn ComplianceStore> = Arc::new(store.clone());
        let lifecycle = Arc::new(AlertLifecycle::new(
            store.clone(),
            Arc::new(DeviationSeverityPolicy::default()),
            3,
        ));
        ReadingIngestor::new(ThresholdResolver::default(), lifecycle, store)
    }

    #[tokio::test]
    async fn test_out_of_range_reading_opens_alert() {
        let store = MemoryStore::new();
        let ingestor = ingestor(&store);

        let recorded = ingestor
            .record(NewReading::new("loc-1", "walkin-1", 50.0, "sam").equipment_type("refrigerator"))
            .await
            .unwrap();

        let reading = &recorded.reading;
        assert!(!reading.is_in_range);
        assert!(reading.alert_sent);
        assert_eq!(reading.threshold, Threshold::new(33.0, 41.0));
        assert_eq!(reading.source, ReadingSource::Manual);

        let alert = recorded.alert.unwrap();
        assert_eq!(alert.temperature_log_id, reading.id);
        assert_eq!(alert.direction, AlertDirection::High);
        assert_eq!(alert.status, AlertStatus::Active);
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.threshold, reading.threshold);

        assert_eq!(store.reading_count(), 1);
        assert_eq!(store.alert_count(), 1);
        let stored = store.get_alert(alert.id).await.unwrap().unwrap();
        assert_eq!(stored, alert);
    }

    #[tokio::test]
    async fn test_in_range_reading_has_no_alert() {
        let store = MemoryStore::new();
        let ingestor = ingestor(&store);

        let recorded = ingestor
            .record(
                NewReading::new("loc-1", "freezer-2", 0.0, "sensor-feed")
                    .equipment_type("Freezer")
                    .from_sensor("probe-7"),
            )
            .await
            .unwrap();

        assert!(recorded.reading.is_in_range);
        assert!(!recorded.reading.alert_sent);
        assert!(recorded.alert.is_none());
        assert_eq!(recorded.reading.source, ReadingSource::Sensor);
        assert_eq!(store.alert_count(), 0);
    }

    #[tokio::test]
    async fn test_overrides_and_celsius() {
        let store = MemoryStore::new();
        let ingestor = ingestor(&store);

        let overridden = ingestor
            .record(NewReading::new("loc-1", "blast-1", -30.0, "sam").thresholds(-40.0, -20.0))
            .await
            .unwrap();
        assert!(overridden.reading.is_in_range);

        let celsius = ingestor
            .record(
                NewReading::new("loc-1", "walkin-1", 6.0, "sam")
                    .equipment_type("fridge")
                    .unit(TemperatureUnit::Celsius),
            )
            .await
            .unwrap();
        assert_eq!(celsius.reading.threshold, Threshold::new(0.56, 5.0));
        assert_eq!(celsius.alert.unwrap().direction, AlertDirection::High);
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let store = MemoryStore::new();
        let ingestor = ingestor(&store);

        let cases = vec![
            NewReading::new("loc-1", "walkin-1", f64::NAN, "sam"),
            NewReading::new("loc-1", "walkin-1", f64::INFINITY, "sam"),
            NewReading::new(" ", "walkin-1", 38.0, "sam"),
            NewReading::new("loc-1", "", 38.0, "sam"),
            NewReading::new("loc-1", "walkin-1", 38.0, ""),
            NewReading::new("loc-1", "walkin-1", 38.0, "sam").thresholds(45.0, 30.0),
            NewReading::new("loc-1", "walkin-1", 38.0, "sam").thresholds(f64::NAN, 30.0),
        ];

        for input in cases {
            let err = ingestor.record(input).await.unwrap_err();
            assert!(err.is_validation(), "{err}");
        }
        assert_eq!(store.reading_count(), 0);
    }

    /// Store without transactions whose alert inserts always fail
    struct AlertlessStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl ReadingStore for AlertlessStore {
        async fn insert_reading(&self, reading: &TemperatureReading) -> Result<()> {
            self.inner.insert_reading(reading).await
        }

        async fn list_readings(&self, filter: &ReadingFilter) -> Result<Vec<TemperatureReading>> {
            self.inner.list_readings(filter).await
        }
    }

    #[async_trait]
    impl AlertStore for AlertlessStore {
        async fn insert_alert(&self, _alert: &Alert) -> Result<()> {
            Err(Error::storage("alerts table unavailable"))
        }

        async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
            self.inner.get_alert(id).await
        }

        async fn update_alert(&self, alert: &Alert) -> Result<bool> {
            self.inner.update_alert(alert).await
        }

        async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>> {
            self.inner.list_alerts(filter).await
        }

        async fn count_alerts(&self, filter: &AlertFilter) -> Result<AlertSummary> {
            self.inner.count_alerts(filter).await
        }
    }

    impl ComplianceStore for AlertlessStore {}

    #[tokio::test]
    async fn test_failed_alert_insert_is_reported_as_partial_write() {
        let inner = MemoryStore::new();
        let store: Arc<dyn ComplianceStore> = Arc::new(AlertlessStore {
            inner: inner.clone(),
        });
        let lifecycle = Arc::new(AlertLifecycle::new(
            store.clone(),
            Arc::new(DeviationSeverityPolicy::default()),
            3,
        ));
        let ingestor = ReadingIngestor::new(ThresholdResolver::default(), lifecycle, store);

        let err = ingestor
            .record(NewReading::new("loc-1", "walkin-1", 55.0, "sam").equipment_type("fridge"))
            .await
            .unwrap_err();

        match err {
            Error::PartialWrite { reading_id, reason } => {
                let stored = inner.list_readings(&ReadingFilter::default()).await.unwrap();
                assert_eq!(stored.len(), 1);
                assert_eq!(stored[0].id, reading_id);
                assert!(!stored[0].is_in_range);
                assert_eq!(stored[0].alert_sent, inner.alert_count() == 1);
                assert!(!stored[0].alert_sent);
                assert!(reason.contains("alerts table unavailable"));
            }
            other => panic!("expected partial write, got {other:?}"),
        }
        assert_eq!(inner.alert_count(), 0);
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl AlertNotifier for RecordingNotifier {
        async fn notify(&self, alert: &Alert) -> Vec<NotificationResult> {
            self.seen.lock().push(alert.id);
            vec![NotificationResult {
                channel_type: "test".to_string(),
                success: false,
                error: Some("offline".to_string()),
                sent_at: Utc::now(),
            }]
        }
    }

    #[tokio::test]
    async fn test_notifier_sees_only_new_alerts() {
        let store = MemoryStore::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let ingestor = ingestor(&store).with_notifier(notifier.clone());

        ingestor
            .record(NewReading::new("loc-1", "walkin-1", 38.0, "sam").equipment_type("fridge"))
            .await
            .unwrap();
        let recorded = ingestor
            .record(NewReading::new("loc-1", "walkin-1", 28.0, "sam").equipment_type("fridge"))
            .await
            .unwrap();

        // delivery failures do not fail the recording
        let alert = recorded.alert.unwrap();
        assert_eq!(alert.direction, AlertDirection::Low);
        assert_eq!(*notifier.seen.lock(), vec![alert.id]);
    }

    proptest! {
        #[test]
        fn prop_alert_exists_iff_out_of_range(temperature in -100.0f64..250.0) {
            let store = MemoryStore::new();
            let ingestor = ingestor(&store);

            let recorded = tokio_test::block_on(
                ingestor.record(NewReading::new("loc-1", "walkin-1", temperature, "sam").equipment_type("fridge")),
            )
            .unwrap();

            let threshold = Threshold::new(33.0, 41.0);
            prop_assert_eq!(recorded.reading.is_in_range, in_range(temperature, &threshold));
            prop_assert_eq!(recorded.alert.is_some(), !recorded.reading.is_in_range);
            prop_assert_eq!(recorded.reading.alert_sent, recorded.alert.is_some());
            prop_assert_eq!(store.alert_count(), usize::from(recorded.alert.is_some()));
        }
    }
}
