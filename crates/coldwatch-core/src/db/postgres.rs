//! PostgreSQL connection and queries

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::{
    Alert, AlertFilter, AlertNote, AlertSummary, ReadingFilter, TemperatureReading, Threshold,
};

use super::{AlertStore, ComplianceStore, ReadingStore};

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Store for readings and alerts backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }
}

async fn insert_reading<'e>(executor: impl PgExecutor<'e>, reading: &TemperatureReading) -> Result<()> {
    let metadata = serde_json::to_value(&reading.metadata)?;

    sqlx::query(
        r#"
        INSERT INTO temperature_readings (
            id, location_id, equipment_id, equipment_type, temperature, unit,
            threshold_min, threshold_max, is_in_range, source, sensor_id,
            recorded_by, recorded_at, notes, corrective_action, alert_sent, metadata
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(reading.id)
    .bind(&reading.location_id)
    .bind(&reading.equipment_id)
    .bind(&reading.equipment_type)
    .bind(reading.temperature)
    .bind(reading.unit.as_str())
    .bind(reading.threshold.min)
    .bind(reading.threshold.max)
    .bind(reading.is_in_range)
    .bind(reading.source.as_str())
    .bind(&reading.sensor_id)
    .bind(&reading.recorded_by)
    .bind(reading.recorded_at)
    .bind(&reading.notes)
    .bind(&reading.corrective_action)
    .bind(reading.alert_sent)
    .bind(&metadata)
    .execute(executor)
    .await?;

    Ok(())
}

async fn insert_alert<'e>(executor: impl PgExecutor<'e>, alert: &Alert) -> Result<()> {
    let notes = serde_json::to_value(&alert.notes)?;

    sqlx::query(
        r#"
        INSERT INTO temperature_alerts (
            id, temperature_log_id, location_id, equipment_id, equipment_type,
            temperature, unit, threshold_min, threshold_max, direction, status,
            severity, message, acknowledged_by, acknowledged_at, resolved_by,
            resolved_at, resolution, notes, created_at, updated_at, version
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
        "#,
    )
    .bind(alert.id)
    .bind(alert.temperature_log_id)
    .bind(&alert.location_id)
    .bind(&alert.equipment_id)
    .bind(&alert.equipment_type)
    .bind(alert.temperature)
    .bind(alert.unit.as_str())
    .bind(alert.threshold.min)
    .bind(alert.threshold.max)
    .bind(alert.direction.as_str())
    .bind(alert.status.as_str())
    .bind(alert.severity.as_str())
    .bind(&alert.message)
    .bind(&alert.acknowledged_by)
    .bind(alert.acknowledged_at)
    .bind(&alert.resolved_by)
    .bind(alert.resolved_at)
    .bind(&alert.resolution)
    .bind(&notes)
    .bind(alert.created_at)
    .bind(alert.updated_at)
    .bind(alert.version)
    .execute(executor)
    .await?;

    Ok(())
}

fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, filter: &AlertFilter) {
    if let Some(location_id) = &filter.location_id {
        qb.push(" AND location_id = ").push_bind(location_id.clone());
    }
    if let Some(equipment_id) = &filter.equipment_id {
        qb.push(" AND equipment_id = ").push_bind(equipment_id.clone());
    }
    if let Some(since) = filter.since {
        qb.push(" AND created_at >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        qb.push(" AND created_at <= ").push_bind(until);
    }
}

async fn list_alerts<'e>(executor: impl PgExecutor<'e>, filter: &AlertFilter) -> Result<Vec<Alert>> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM temperature_alerts WHERE TRUE");
    push_scope(&mut qb, filter);

    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }

    qb.push(" ORDER BY created_at DESC, id");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }

    let rows = qb.build_query_as::<AlertRow>().fetch_all(executor).await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

async fn count_alerts<'e>(executor: impl PgExecutor<'e>, filter: &AlertFilter) -> Result<AlertSummary> {
    let mut qb =
        QueryBuilder::<Postgres>::new("SELECT status, COUNT(*) FROM temperature_alerts WHERE TRUE");
    push_scope(&mut qb, filter);
    qb.push(" GROUP BY status");

    let rows = qb
        .build_query_as::<(String, i64)>()
        .fetch_all(executor)
        .await?;

    let mut summary = AlertSummary::default();
    for (status, count) in rows {
        let status = status.parse().map_err(Error::internal)?;
        summary.add(status, count);
    }

    Ok(summary)
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn insert_reading(&self, reading: &TemperatureReading) -> Result<()> {
        insert_reading(&self.pool, reading).await
    }

    async fn list_readings(&self, filter: &ReadingFilter) -> Result<Vec<TemperatureReading>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM temperature_readings WHERE TRUE");

        if let Some(location_id) = &filter.location_id {
            qb.push(" AND location_id = ").push_bind(location_id.clone());
        }
        if let Some(equipment_id) = &filter.equipment_id {
            qb.push(" AND equipment_id = ").push_bind(equipment_id.clone());
        }
        if let Some(since) = filter.since {
            qb.push(" AND recorded_at >= ").push_bind(since);
        }
        if let Some(until) = filter.until {
            qb.push(" AND recorded_at <= ").push_bind(until);
        }
        if let Some(in_range) = filter.in_range {
            qb.push(" AND is_in_range = ").push_bind(in_range);
        }

        qb.push(" ORDER BY recorded_at DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let rows = qb
            .build_query_as::<ReadingRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        insert_alert(&self.pool, alert).await
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>("SELECT * FROM temperature_alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update_alert(&self, alert: &Alert) -> Result<bool> {
        let notes = serde_json::to_value(&alert.notes)?;

        let result = sqlx::query(
            r#"
            UPDATE temperature_alerts SET
                status = $2,
                acknowledged_by = $3,
                acknowledged_at = $4,
                resolved_by = $5,
                resolved_at = $6,
                resolution = $7,
                notes = $8,
                updated_at = $9,
                version = version + 1
            WHERE id = $1 AND version = $10
            "#,
        )
        .bind(alert.id)
        .bind(alert.status.as_str())
        .bind(&alert.acknowledged_by)
        .bind(alert.acknowledged_at)
        .bind(&alert.resolved_by)
        .bind(alert.resolved_at)
        .bind(&alert.resolution)
        .bind(&notes)
        .bind(alert.updated_at)
        .bind(alert.version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>> {
        list_alerts(&self.pool, filter).await
    }

    async fn count_alerts(&self, filter: &AlertFilter) -> Result<AlertSummary> {
        count_alerts(&self.pool, filter).await
    }

    async fn query_alerts(&self, filter: &AlertFilter) -> Result<(Vec<Alert>, AlertSummary)> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let alerts = list_alerts(&mut *tx, filter).await?;
        let summary = count_alerts(&mut *tx, filter).await?;

        tx.commit().await?;
        Ok((alerts, summary))
    }
}

#[async_trait]
impl ComplianceStore for PgStore {
    async fn insert_reading_with_alert(
        &self,
        reading: &TemperatureReading,
        alert: Option<&Alert>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        insert_reading(&mut *tx, reading).await?;
        if let Some(alert) = alert {
            insert_alert(&mut *tx, alert).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

// Database row types for mapping

#[derive(sqlx::FromRow)]
struct ReadingRow {
    id: Uuid,
    location_id: String,
    equipment_id: String,
    equipment_type: Option<String>,
    temperature: f64,
    unit: String,
    threshold_min: Option<f64>,
    threshold_max: Option<f64>,
    is_in_range: bool,
    source: String,
    sensor_id: Option<String>,
    recorded_by: String,
    recorded_at: DateTime<Utc>,
    notes: Option<String>,
    corrective_action: Option<String>,
    alert_sent: bool,
    metadata: serde_json::Value,
}

impl TryFrom<ReadingRow> for TemperatureReading {
    type Error = Error;

    fn try_from(row: ReadingRow) -> Result<Self> {
        Ok(TemperatureReading {
            id: row.id,
            location_id: row.location_id,
            equipment_id: row.equipment_id,
            equipment_type: row.equipment_type,
            temperature: row.temperature,
            unit: row.unit.parse().map_err(Error::internal)?,
            threshold: Threshold {
                min: row.threshold_min,
                max: row.threshold_max,
            },
            is_in_range: row.is_in_range,
            source: row.source.parse().map_err(Error::internal)?,
            sensor_id: row.sensor_id,
            recorded_by: row.recorded_by,
            recorded_at: row.recorded_at,
            notes: row.notes,
            corrective_action: row.corrective_action,
            alert_sent: row.alert_sent,
            metadata: serde_json::from_value(row.metadata)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    temperature_log_id: Uuid,
    location_id: String,
    equipment_id: String,
    equipment_type: Option<String>,
    temperature: f64,
    unit: String,
    threshold_min: Option<f64>,
    threshold_max: Option<f64>,
    direction: String,
    status: String,
    severity: String,
    message: String,
    acknowledged_by: Option<String>,
    acknowledged_at: Option<DateTime<Utc>>,
    resolved_by: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    resolution: Option<String>,
    notes: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<AlertRow> for Alert {
    type Error = Error;

    fn try_from(row: AlertRow) -> Result<Self> {
        let notes: Vec<AlertNote> = serde_json::from_value(row.notes)?;

        Ok(Alert {
            id: row.id,
            temperature_log_id: row.temperature_log_id,
            location_id: row.location_id,
            equipment_id: row.equipment_id,
            equipment_type: row.equipment_type,
            temperature: row.temperature,
            unit: row.unit.parse().map_err(Error::internal)?,
            threshold: Threshold {
                min: row.threshold_min,
                max: row.threshold_max,
            },
            direction: row.direction.parse().map_err(Error::internal)?,
            status: row.status.parse().map_err(Error::internal)?,
            severity: row.severity.parse().map_err(Error::internal)?,
            message: row.message,
            acknowledged_by: row.acknowledged_by,
            acknowledged_at: row.acknowledged_at,
            resolved_by: row.resolved_by,
            resolved_at: row.resolved_at,
            resolution: row.resolution,
            notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}
