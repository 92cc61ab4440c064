//! Summary statistics and trends over reading sets

use std::collections::BTreeMap;

use crate::models::{EquipmentStatistics, ReadingStatistics, TemperatureReading, TemperatureTrends};

/// Round to two decimal places
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(readings: &[TemperatureReading]) -> Option<f64> {
    if readings.is_empty() {
        return None;
    }
    let sum: f64 = readings.iter().map(|r| r.temperature).sum();
    Some(round2(sum / readings.len() as f64))
}

/// Count, out-of-range count and mean temperature
pub fn calculate_statistics(readings: &[TemperatureReading]) -> ReadingStatistics {
    let total_readings = readings.len();
    let out_of_range = readings.iter().filter(|r| !r.is_in_range).count();

    let compliance_rate = (total_readings > 0).then(|| {
        round2((total_readings - out_of_range) as f64 / total_readings as f64 * 100.0)
    });

    ReadingStatistics {
        total_readings,
        out_of_range,
        average_temp: mean(readings),
        compliance_rate,
    }
}

/// Average, extremes and the most recently recorded reading
pub fn calculate_trends(readings: &[TemperatureReading]) -> TemperatureTrends {
    let min = readings.iter().map(|r| r.temperature).reduce(f64::min);
    let max = readings.iter().map(|r| r.temperature).reduce(f64::max);
    let latest = readings.iter().max_by_key(|r| r.recorded_at).cloned();

    TemperatureTrends {
        average: mean(readings),
        min,
        max,
        latest,
    }
}

/// Statistics per equipment id, sorted by id
pub fn equipment_breakdown(readings: &[TemperatureReading]) -> Vec<EquipmentStatistics> {
    let mut grouped: BTreeMap<&str, Vec<TemperatureReading>> = BTreeMap::new();
    for reading in readings {
        grouped
            .entry(reading.equipment_id.as_str())
            .or_default()
            .push(reading.clone());
    }

    grouped
        .into_iter()
        .map(|(equipment_id, group)| EquipmentStatistics {
            equipment_id: equipment_id.to_string(),
            statistics: calculate_statistics(&group),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ReadingSource, TemperatureUnit, Threshold};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use uuid::Uuid;

    pub(crate) fn create_test_reading(
        equipment_id: &str,
        temperature: f64,
        recorded_at: DateTime<Utc>,
    ) -> TemperatureReading {
        let threshold = Threshold::new(33.0, 41.0);
        TemperatureReading {
            id: Uuid::new_v4(),
            location_id: "loc-1".to_string(),
            equipment_id: equipment_id.to_string(),
            equipment_type: Some("fridge".to_string()),
            temperature,
            unit: TemperatureUnit::Fahrenheit,
            threshold,
            is_in_range: crate::compliance::in_range(temperature, &threshold),
            source: ReadingSource::Manual,
            sensor_id: None,
            recorded_by: "tester".to_string(),
            recorded_at,
            notes: None,
            corrective_action: None,
            alert_sent: false,
            metadata: HashMap::new(),
        }
    }

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_statistics_empty() {
        let stats = calculate_statistics(&[]);
        assert_eq!(
            stats,
            ReadingStatistics {
                total_readings: 0,
                out_of_range: 0,
                average_temp: None,
                compliance_rate: None,
            }
        );
    }

    #[test]
    fn test_statistics_counts_out_of_range() {
        let readings = vec![
            create_test_reading("f1", 35.0, t(0)),
            create_test_reading("f1", 50.0, t(1)),
            create_test_reading("f1", 20.0, t(2)),
            create_test_reading("f1", 38.0, t(3)),
        ];

        let stats = calculate_statistics(&readings);

        assert_eq!(stats.total_readings, 4);
        assert_eq!(stats.out_of_range, 2);
        assert_eq!(stats.average_temp, Some(35.75));
        assert_eq!(stats.compliance_rate, Some(50.0));
    }

    #[test]
    fn test_trends_empty() {
        let trends = calculate_trends(&[]);
        assert_eq!(trends.average, None);
        assert_eq!(trends.min, None);
        assert_eq!(trends.max, None);
        assert!(trends.latest.is_none());
    }

    #[test]
    fn test_trends_latest_is_by_time_not_value() {
        // recorded at t1 < t3 < t2, so the 40 degree reading is newest
        let readings = vec![
            create_test_reading("f1", 35.0, t(1)),
            create_test_reading("f1", 40.0, t(3)),
            create_test_reading("f1", 37.0, t(2)),
        ];

        let trends = calculate_trends(&readings);

        assert_eq!(trends.average, Some(37.33));
        assert_eq!(trends.min, Some(35.0));
        assert_eq!(trends.max, Some(40.0));
        assert_eq!(trends.latest.map(|r| r.temperature), Some(40.0));
    }

    #[test]
    fn test_trends_latest_can_be_a_middle_value() {
        let readings = vec![
            create_test_reading("f1", 30.0, t(0)),
            create_test_reading("f1", 45.0, t(1)),
            create_test_reading("f1", 36.0, t(9)),
        ];

        let latest = calculate_trends(&readings).latest.unwrap();
        assert_eq!(latest.temperature, 36.0);
    }

    #[test]
    fn test_equipment_breakdown() {
        let readings = vec![
            create_test_reading("walkin-2", 50.0, t(0)),
            create_test_reading("walkin-1", 35.0, t(1)),
            create_test_reading("walkin-2", 36.0, t(2)),
        ];

        let breakdown = equipment_breakdown(&readings);

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].equipment_id, "walkin-1");
        assert_eq!(breakdown[0].statistics.total_readings, 1);
        assert_eq!(breakdown[1].equipment_id, "walkin-2");
        assert_eq!(breakdown[1].statistics.out_of_range, 1);
        assert_eq!(breakdown[1].statistics.average_temp, Some(43.0));
    }
}
