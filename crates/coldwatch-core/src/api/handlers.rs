//! API handlers for the HTTP REST API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::compliance::{resolve_period, ComplianceEngine};
use crate::error::Error;
use crate::models::{
    AcknowledgeInput, Alert, AlertFilter, AlertQueryResult, AlertStatus, CommentInput,
    EquipmentStatistics, NewReading, ReadingFilter, ReadingSource, ReadingStatistics,
    ResolveInput, TemperatureReading, TemperatureTrends, TemperatureUnit, Threshold,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Compliance engine serving every request
    pub engine: Arc<ComplianceEngine>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Map an engine error to an HTTP status
fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        _ => {
            error!(error = %err, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

fn alert_not_found(id: Uuid) -> (StatusCode, String) {
    error_response(Error::not_found("Alert", id.to_string()))
}

fn parse_optional<T>(value: Option<&str>) -> Result<Option<T>, (StatusCode, String)>
where
    T: FromStr<Err = String>,
{
    value
        .map(str::parse::<T>)
        .transpose()
        .map_err(|e| error_response(Error::validation(e)))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the server is up
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Reading submission request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReadingRequest {
    /// Location the reading was taken at
    pub location_id: Option<String>,
    /// Equipment the reading was taken from
    pub equipment_id: Option<String>,
    /// Equipment type used for the threshold lookup
    pub equipment_type: Option<String>,
    /// Measured temperature
    pub temperature: Option<f64>,
    /// "F" or "C", Fahrenheit when absent
    pub unit: Option<String>,
    /// Who took the reading
    pub recorded_by: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Lower bound override, used only together with `thresholdMax`
    pub threshold_min: Option<f64>,
    /// Upper bound override, used only together with `thresholdMin`
    pub threshold_max: Option<f64>,
    /// "manual" or "sensor"
    pub source: Option<String>,
    /// Sensor identifier for automatic readings
    pub sensor_id: Option<String>,
    /// Action taken when the reading was out of range
    pub corrective_action: Option<String>,
    /// When the reading was taken, defaults to now
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    /// Extra key/value data stored with the reading
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Reading submission response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReadingResponse {
    /// The stored reading
    pub reading: TemperatureReading,
    /// Alert opened by the reading, if it was out of range
    pub alert: Option<Alert>,
}

/// Record a temperature reading
pub async fn record_reading(
    State(state): State<AppState>,
    Json(req): Json<RecordReadingRequest>,
) -> Result<(StatusCode, Json<RecordReadingResponse>), (StatusCode, String)> {
    let temperature = req
        .temperature
        .ok_or_else(|| error_response(Error::validation("temperature is required")))?;
    let unit: Option<TemperatureUnit> = parse_optional(req.unit.as_deref())?;
    let source: Option<ReadingSource> = parse_optional(req.source.as_deref())?;

    let input = NewReading {
        location_id: req.location_id.unwrap_or_default(),
        equipment_id: req.equipment_id.unwrap_or_default(),
        equipment_type: req.equipment_type,
        temperature,
        unit: unit.unwrap_or_default(),
        recorded_by: req.recorded_by.unwrap_or_default(),
        notes: req.notes,
        threshold_min_override: req.threshold_min,
        threshold_max_override: req.threshold_max,
        source,
        sensor_id: req.sensor_id,
        corrective_action: req.corrective_action,
        recorded_at: req.recorded_at,
        metadata: req.metadata,
    };

    let recorded = state.engine.record(input).await.map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(RecordReadingResponse {
            reading: recorded.reading,
            alert: recorded.alert,
        }),
    ))
}

/// Query parameters shared by reading endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsQuery {
    /// Only readings from this location
    pub location_id: Option<String>,
    /// Only readings from this equipment
    pub equipment_id: Option<String>,
    /// Relative period token ("24h", "7d", "30d" or hours)
    pub period: Option<String>,
    /// Only readings recorded at or before this instant
    pub until: Option<DateTime<Utc>>,
    /// Only in-range (`true`) or out-of-range (`false`) readings
    pub in_range: Option<bool>,
    /// Maximum number of readings
    pub limit: Option<i64>,
}

impl ReadingsQuery {
    fn into_filter(self) -> ReadingFilter {
        ReadingFilter {
            location_id: self.location_id,
            equipment_id: self.equipment_id,
            since: resolve_period(self.period.as_deref()),
            until: self.until,
            in_range: self.in_range,
            limit: self.limit,
        }
    }
}

/// List readings response
#[derive(Serialize)]
pub struct ListReadingsResponse {
    /// Matching readings, newest first
    pub readings: Vec<TemperatureReading>,
    /// Number of readings returned
    pub total: usize,
}

/// List readings, newest first
pub async fn list_readings(
    State(state): State<AppState>,
    Query(query): Query<ReadingsQuery>,
) -> ApiResult<ListReadingsResponse> {
    let filter = ReadingsQuery {
        limit: Some(query.limit.unwrap_or(100)),
        ..query
    }
    .into_filter();

    let readings = state
        .engine
        .list_readings(&filter)
        .await
        .map_err(error_response)?;

    let total = readings.len();
    Ok(Json(ListReadingsResponse { readings, total }))
}

/// Statistics response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResponse {
    #[serde(flatten)]
    /// Statistics over all matching readings
    pub statistics: ReadingStatistics,
    /// Statistics per piece of equipment
    pub by_equipment: Vec<EquipmentStatistics>,
}

/// Summary statistics over matching readings
pub async fn get_statistics(
    State(state): State<AppState>,
    Query(query): Query<ReadingsQuery>,
) -> ApiResult<StatisticsResponse> {
    let filter = query.into_filter();

    let statistics = state
        .engine
        .get_statistics(&filter)
        .await
        .map_err(error_response)?;
    let by_equipment = state
        .engine
        .get_equipment_breakdown(&filter)
        .await
        .map_err(error_response)?;

    Ok(Json(StatisticsResponse {
        statistics,
        by_equipment,
    }))
}

/// Temperature trends over matching readings
pub async fn get_trends(
    State(state): State<AppState>,
    Query(query): Query<ReadingsQuery>,
) -> ApiResult<TemperatureTrends> {
    let trends = state
        .engine
        .get_trends(&query.into_filter())
        .await
        .map_err(error_response)?;

    Ok(Json(trends))
}

/// Query parameters for listing alerts
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsQuery {
    /// Only alerts from this location
    pub location_id: Option<String>,
    /// Only alerts from this equipment
    pub equipment_id: Option<String>,
    /// "active", "acknowledged" or "resolved"
    pub status: Option<String>,
    /// Relative period token ("24h", "7d", "30d" or hours)
    pub period: Option<String>,
    /// Maximum number of alerts
    pub limit: Option<i64>,
}

/// List alerts with a status summary
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> ApiResult<AlertQueryResult> {
    let status: Option<AlertStatus> = parse_optional(query.status.as_deref())?;

    let filter = AlertFilter {
        location_id: query.location_id,
        equipment_id: query.equipment_id,
        status,
        since: resolve_period(query.period.as_deref()),
        until: None,
        limit: Some(query.limit.unwrap_or(100)),
    };

    let result = state
        .engine
        .get_alerts(&filter)
        .await
        .map_err(error_response)?;

    Ok(Json(result))
}

/// Get a single alert
pub async fn get_alert(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Alert> {
    let alert = state
        .engine
        .get_alert(id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| alert_not_found(id))?;

    Ok(Json(alert))
}

/// Acknowledge request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
    /// Who acknowledged the alert
    pub acknowledged_by: Option<String>,
    /// Optional note for the audit trail
    pub note: Option<String>,
}

/// Acknowledge an alert
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AcknowledgeRequest>,
) -> ApiResult<Alert> {
    let input = AcknowledgeInput {
        acknowledged_by: req.acknowledged_by.unwrap_or_default(),
        note: req.note,
    };

    let alert = state
        .engine
        .acknowledge_alert(id, input)
        .await
        .map_err(error_response)?
        .ok_or_else(|| alert_not_found(id))?;

    Ok(Json(alert))
}

/// Resolve request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    /// Who resolved the alert
    pub resolved_by: Option<String>,
    /// Optional note for the audit trail
    pub note: Option<String>,
    /// How the problem was fixed
    pub resolution: Option<String>,
}

/// Resolve an alert
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<Alert> {
    let input = ResolveInput {
        resolved_by: req.resolved_by.unwrap_or_default(),
        note: req.note,
        resolution: req.resolution.unwrap_or_default(),
    };

    let alert = state
        .engine
        .resolve_alert(id, input)
        .await
        .map_err(error_response)?
        .ok_or_else(|| alert_not_found(id))?;

    Ok(Json(alert))
}

/// Comment request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    /// Comment author
    pub author: Option<String>,
    /// Comment text
    pub message: Option<String>,
}

/// Add a comment to an alert
pub async fn comment_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<Alert> {
    let input = CommentInput {
        author: req.author.unwrap_or_default(),
        message: req.message.unwrap_or_default(),
    };

    let alert = state
        .engine
        .comment_alert(id, input)
        .await
        .map_err(error_response)?
        .ok_or_else(|| alert_not_found(id))?;

    Ok(Json(alert))
}

/// Query parameters for threshold lookup
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdQuery {
    /// Equipment type to resolve
    pub equipment_type: Option<String>,
    /// "F" or "C", Fahrenheit when absent
    pub unit: Option<String>,
    /// Lower bound override
    pub threshold_min: Option<f64>,
    /// Upper bound override
    pub threshold_max: Option<f64>,
}

/// Threshold lookup response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdResponse {
    /// Equipment type that was resolved
    pub equipment_type: Option<String>,
    /// Unit the threshold is expressed in
    pub unit: TemperatureUnit,
    /// Resolved acceptable range
    pub threshold: Threshold,
    /// Whether the equipment type has its own policy entry
    pub known: bool,
}

/// Resolve the threshold for an equipment type
pub async fn get_threshold(
    State(state): State<AppState>,
    Query(query): Query<ThresholdQuery>,
) -> ApiResult<ThresholdResponse> {
    let unit: TemperatureUnit = parse_optional(query.unit.as_deref())?.unwrap_or_default();

    let threshold = state
        .engine
        .resolve_threshold(
            query.equipment_type.as_deref(),
            query.threshold_min,
            query.threshold_max,
            unit,
        )
        .map_err(error_response)?;
    let known = query
        .equipment_type
        .as_deref()
        .is_some_and(|t| state.engine.thresholds().is_known(t));

    Ok(Json(ThresholdResponse {
        equipment_type: query.equipment_type,
        unit,
        threshold,
        known,
    }))
}
