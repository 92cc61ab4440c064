//! Threshold policy, resolution and range evaluation

use std::collections::HashMap;

use crate::config::ThresholdConfig;
use crate::error::{Error, Result};
use crate::models::{AlertDirection, TemperatureUnit, Threshold};

/// Immutable table of acceptable ranges by equipment type, in °F.
///
/// Keys are stored lowercase so lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    ranges: HashMap<String, Threshold>,
    default: Threshold,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ThresholdPolicy {
    /// The standard food-safety table
    pub fn builtin() -> Self {
        let mut ranges = HashMap::new();

        ranges.insert("freezer".to_string(), Threshold::new(-10.0, 10.0));

        let cold = Threshold::new(33.0, 41.0);
        ranges.insert("fridge".to_string(), cold);
        ranges.insert("refrigerator".to_string(), cold);
        ranges.insert("coldhold".to_string(), cold);

        ranges.insert("hothold".to_string(), Threshold::new(135.0, 165.0));
        ranges.insert("ambient".to_string(), Threshold::new(65.0, 80.0));

        Self {
            ranges,
            default: Threshold::new(33.0, 165.0),
        }
    }

    /// The built-in table with configured entries merged over it
    pub fn from_config(config: &ThresholdConfig) -> Self {
        let mut policy = Self::builtin();
        policy.default = Threshold::new(config.default.min, config.default.max);

        for (equipment_type, range) in &config.equipment {
            policy
                .ranges
                .insert(normalize(equipment_type), Threshold::new(range.min, range.max));
        }

        policy
    }

    /// Range for an equipment type, falling back to the default range
    pub fn lookup(&self, equipment_type: Option<&str>) -> Threshold {
        equipment_type
            .and_then(|t| self.ranges.get(&normalize(t)))
            .copied()
            .unwrap_or(self.default)
    }

    /// Whether the equipment type has its own entry
    pub fn is_known(&self, equipment_type: &str) -> bool {
        self.ranges.contains_key(&normalize(equipment_type))
    }

    /// All entries sorted by equipment type
    pub fn entries(&self) -> Vec<(&str, Threshold)> {
        let mut entries: Vec<_> = self.ranges.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Range applied to unknown equipment types
    pub fn default_range(&self) -> Threshold {
        self.default
    }
}

fn normalize(equipment_type: &str) -> String {
    equipment_type.trim().to_lowercase()
}

/// Maps equipment types and per-reading overrides to a threshold
#[derive(Debug, Clone, Default)]
pub struct ThresholdResolver {
    policy: ThresholdPolicy,
}

impl ThresholdResolver {
    /// Create a resolver over a policy table
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    /// Resolve the threshold in °F.
    ///
    /// When both overrides are present they win outright; otherwise the
    /// policy entry for `equipment_type` applies. Non-finite overrides and
    /// an override pair with `min > max` are rejected.
    pub fn resolve(
        &self,
        equipment_type: Option<&str>,
        override_min: Option<f64>,
        override_max: Option<f64>,
    ) -> Result<Threshold> {
        self.resolve_for_unit(
            equipment_type,
            override_min,
            override_max,
            TemperatureUnit::Fahrenheit,
        )
    }

    /// Resolve the threshold in the unit the reading was taken in.
    ///
    /// Overrides are already in the reading's unit and are not converted.
    pub fn resolve_for_unit(
        &self,
        equipment_type: Option<&str>,
        override_min: Option<f64>,
        override_max: Option<f64>,
        unit: TemperatureUnit,
    ) -> Result<Threshold> {
        check_overrides(override_min, override_max)?;

        Ok(match (override_min, override_max) {
            (Some(min), Some(max)) => Threshold::new(min, max),
            _ => convert(self.policy.lookup(equipment_type), unit),
        })
    }

    /// The underlying policy table
    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }
}

fn check_overrides(override_min: Option<f64>, override_max: Option<f64>) -> Result<()> {
    for (field, value) in [("thresholdMin", override_min), ("thresholdMax", override_max)] {
        if value.is_some_and(|v| !v.is_finite()) {
            return Err(Error::validation(format!("{field} must be a finite number")));
        }
    }

    if let (Some(min), Some(max)) = (override_min, override_max) {
        if min > max {
            return Err(Error::validation(format!(
                "thresholdMin {min} is greater than thresholdMax {max}"
            )));
        }
    }

    Ok(())
}

fn convert(threshold: Threshold, unit: TemperatureUnit) -> Threshold {
    match unit {
        TemperatureUnit::Fahrenheit => threshold,
        TemperatureUnit::Celsius => {
            let to_c = |f: f64| ((f - 32.0) * 5.0 / 9.0 * 100.0).round() / 100.0;
            Threshold {
                min: threshold.min.map(to_c),
                max: threshold.max.map(to_c),
            }
        }
    }
}

/// Whether `value` lies within `threshold`, bounds inclusive
pub fn in_range(value: f64, threshold: &Threshold) -> bool {
    threshold.min.map_or(true, |min| value >= min) && threshold.max.map_or(true, |max| value <= max)
}

/// Which bound `value` violates, if any
pub fn violated_bound(value: f64, threshold: &Threshold) -> Option<AlertDirection> {
    match (threshold.min, threshold.max) {
        (Some(min), _) if value < min => Some(AlertDirection::Low),
        (_, Some(max)) if value > max => Some(AlertDirection::High),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RangeConfig;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("freezer", -10.0, 10.0)]
    #[case("FREEZER", -10.0, 10.0)]
    #[case("fridge", 33.0, 41.0)]
    #[case("Refrigerator", 33.0, 41.0)]
    #[case("coldHold", 33.0, 41.0)]
    #[case("hotHold", 135.0, 165.0)]
    #[case("HOTHOLD", 135.0, 165.0)]
    #[case("ambient", 65.0, 80.0)]
    #[case("walk-in display", 33.0, 165.0)]
    fn test_policy_lookup(#[case] equipment_type: &str, #[case] min: f64, #[case] max: f64) {
        let resolver = ThresholdResolver::default();
        assert_eq!(
            resolver.resolve(Some(equipment_type), None, None).unwrap(),
            Threshold::new(min, max)
        );
    }

    #[test]
    fn test_missing_type_uses_default() {
        let resolver = ThresholdResolver::default();
        assert_eq!(resolver.resolve(None, None, None).unwrap(), Threshold::new(33.0, 165.0));
    }

    #[test]
    fn test_overrides_win() {
        let resolver = ThresholdResolver::default();
        assert_eq!(
            resolver.resolve(Some("freezer"), Some(32.0), Some(40.0)).unwrap(),
            Threshold::new(32.0, 40.0)
        );
        assert_eq!(
            resolver.resolve(None, Some(32.0), Some(40.0)).unwrap(),
            Threshold::new(32.0, 40.0)
        );
    }

    #[test]
    fn test_single_override_is_ignored() {
        let resolver = ThresholdResolver::default();
        assert_eq!(
            resolver.resolve(Some("freezer"), Some(0.0), None).unwrap(),
            Threshold::new(-10.0, 10.0)
        );
        assert_eq!(
            resolver.resolve(Some("freezer"), None, Some(0.0)).unwrap(),
            Threshold::new(-10.0, 10.0)
        );
    }

    #[test]
    fn test_config_entries_merge_over_builtin() {
        let mut config = ThresholdConfig::default();
        config
            .equipment
            .insert("Blast_Chiller".to_string(), RangeConfig { min: -20.0, max: 38.0 });
        config
            .equipment
            .insert("freezer".to_string(), RangeConfig { min: -5.0, max: 5.0 });

        let policy = ThresholdPolicy::from_config(&config);

        assert_eq!(policy.lookup(Some("blast_chiller")), Threshold::new(-20.0, 38.0));
        assert_eq!(policy.lookup(Some("Freezer")), Threshold::new(-5.0, 5.0));
        assert_eq!(policy.lookup(Some("ambient")), Threshold::new(65.0, 80.0));
        assert!(policy.is_known("BLAST_CHILLER"));
    }

    #[test]
    fn test_celsius_conversion_skips_overrides() {
        let resolver = ThresholdResolver::default();

        let policy = resolver
            .resolve_for_unit(Some("fridge"), None, None, TemperatureUnit::Celsius)
            .unwrap();
        assert_eq!(policy, Threshold::new(0.56, 5.0));

        let overridden = resolver
            .resolve_for_unit(Some("fridge"), Some(1.0), Some(4.0), TemperatureUnit::Celsius)
            .unwrap();
        assert_eq!(overridden, Threshold::new(1.0, 4.0));
    }

    #[rstest]
    #[case(Some(50.0), Some(40.0))]
    #[case(Some(f64::NAN), Some(40.0))]
    #[case(Some(33.0), Some(f64::INFINITY))]
    #[case(None, Some(f64::NAN))]
    fn test_invalid_overrides_are_rejected(#[case] min: Option<f64>, #[case] max: Option<f64>) {
        let resolver = ThresholdResolver::default();

        let err = resolver.resolve(Some("fridge"), min, max).unwrap_err();
        assert!(err.is_validation(), "{err}");

        let err = resolver
            .resolve_for_unit(Some("fridge"), min, max, TemperatureUnit::Celsius)
            .unwrap_err();
        assert!(err.is_validation(), "{err}");
    }

    #[test]
    fn test_equal_overrides_are_accepted() {
        let resolver = ThresholdResolver::default();
        let threshold = resolver.resolve(None, Some(38.0), Some(38.0)).unwrap();
        assert!(threshold.is_ordered());
    }

    #[test]
    fn test_in_range_is_inclusive() {
        let threshold = Threshold::new(33.0, 41.0);
        assert!(in_range(33.0, &threshold));
        assert!(in_range(41.0, &threshold));
        assert!(!in_range(32.9, &threshold));
        assert!(!in_range(41.1, &threshold));
    }

    #[test]
    fn test_missing_bounds_are_unbounded() {
        let no_min = Threshold { min: None, max: Some(41.0) };
        assert!(in_range(-1000.0, &no_min));
        assert!(!in_range(42.0, &no_min));

        let no_max = Threshold { min: Some(33.0), max: None };
        assert!(in_range(1000.0, &no_max));
        assert_eq!(violated_bound(1000.0, &no_max), None);
        assert_eq!(violated_bound(10.0, &no_max), Some(AlertDirection::Low));

        assert!(in_range(f64::MAX, &Threshold::default()));
    }

    #[test]
    fn test_violated_bound() {
        let threshold = Threshold::new(33.0, 41.0);
        assert_eq!(violated_bound(50.0, &threshold), Some(AlertDirection::High));
        assert_eq!(violated_bound(20.0, &threshold), Some(AlertDirection::Low));
        assert_eq!(violated_bound(35.0, &threshold), None);
    }

    proptest! {
        #[test]
        fn prop_violation_iff_out_of_range(
            value in -500.0f64..500.0,
            a in -300.0f64..300.0,
            b in -300.0f64..300.0,
        ) {
            let threshold = Threshold::new(a.min(b), a.max(b));
            let direction = violated_bound(value, &threshold);
            prop_assert_eq!(direction.is_none(), in_range(value, &threshold));
            match direction {
                Some(AlertDirection::Low) => prop_assert!(value < a.min(b)),
                Some(AlertDirection::High) => prop_assert!(value > a.max(b)),
                None => {}
            }
        }

        #[test]
        fn prop_lookup_ignores_case(name in "[a-zA-Z]{1,12}") {
            let resolver = ThresholdResolver::default();
            prop_assert_eq!(
                resolver.resolve(Some(&name.to_uppercase()), None, None).unwrap(),
                resolver.resolve(Some(&name.to_lowercase()), None, None).unwrap()
            );
        }
    }
}
