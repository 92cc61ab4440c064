//! Persistence layer for Coldwatch
//!
//! The engine talks to storage through the [`ReadingStore`], [`AlertStore`]
//! and [`ComplianceStore`] traits. [`PgStore`] backs them with PostgreSQL;
//! [`MemoryStore`] keeps everything in process.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgStore, PostgresPool};

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Alert, AlertFilter, AlertSummary, ReadingFilter, TemperatureReading};

/// Append-only storage for readings
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Insert a reading
    async fn insert_reading(&self, reading: &TemperatureReading) -> Result<()>;

    /// List readings matching a filter, newest first
    async fn list_readings(&self, filter: &ReadingFilter) -> Result<Vec<TemperatureReading>>;
}

/// Storage for alerts
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Insert a new alert
    async fn insert_alert(&self, alert: &Alert) -> Result<()>;

    /// Get an alert by ID
    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>>;

    /// Store `alert` if the stored version still equals `alert.version`.
    ///
    /// On success the stored version becomes `alert.version + 1`. Returns
    /// `false` when the alert is missing or another writer got there first.
    async fn update_alert(&self, alert: &Alert) -> Result<bool>;

    /// List alerts matching a filter, newest first
    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>>;

    /// Count alerts by status, ignoring the filter's `status` and `limit`
    async fn count_alerts(&self, filter: &AlertFilter) -> Result<AlertSummary>;

    /// Matching alerts together with the status summary of their scope.
    ///
    /// Both halves must come from the same snapshot. The default runs the
    /// two reads back to back; stores that can read consistently override it.
    async fn query_alerts(&self, filter: &AlertFilter) -> Result<(Vec<Alert>, AlertSummary)> {
        let alerts = self.list_alerts(filter).await?;
        let summary = self.count_alerts(filter).await?;
        Ok((alerts, summary))
    }
}

/// Combined store used by the ingestion path
#[async_trait]
pub trait ComplianceStore: ReadingStore + AlertStore {
    /// Persist a reading and, when present, the alert it opened.
    ///
    /// The default performs two inserts in sequence, alert first, so a
    /// stored reading never claims an alert that does not exist. When the
    /// alert insert fails the reading is still stored, with `alert_sent`
    /// cleared, and the call returns [`Error::PartialWrite`]. Stores with
    /// transactions should override this so both rows land together or not
    /// at all.
    async fn insert_reading_with_alert(
        &self,
        reading: &TemperatureReading,
        alert: Option<&Alert>,
    ) -> Result<()> {
        let Some(alert) = alert else {
            return self.insert_reading(reading).await;
        };

        if let Err(e) = self.insert_alert(alert).await {
            let unalerted = TemperatureReading {
                alert_sent: false,
                ..reading.clone()
            };
            self.insert_reading(&unalerted).await?;
            return Err(Error::PartialWrite {
                reading_id: reading.id,
                reason: e.to_string(),
            });
        }

        self.insert_reading(reading).await
    }
}

/// Database connections bundle
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL connection pool
    pub postgres: PostgresPool,
}

impl Database {
    /// Create a new database connection bundle
    pub async fn new(config: &Config) -> Result<Self> {
        let postgres = PostgresPool::new(&config.database).await?;
        Ok(Self { postgres })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        self.postgres.migrate().await
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        self.postgres.health_check().await
    }

    /// Store backed by this database
    pub fn store(&self) -> PgStore {
        PgStore::new(&self.postgres)
    }
}
