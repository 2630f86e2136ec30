//! Feed scoring weight configuration
//!
//! Weights used by the feed ranker to score candidates:
//!   recency   = 0.40  exponential decay
//!   specialty = 0.30  tag overlap with the user's declared interests
//!   affinity  = 0.30  accumulated interaction points with the author
//!
//! Cohorts and experiment variants store partial overrides as JSON; any
//! missing or mistyped field falls back to the default per field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resolved feed scoring weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    pub recency: f64,
    pub specialty: f64,
    pub affinity: f64,
    /// Min interactions before a user leaves cold-start handling
    pub cold_start_threshold: u32,
    /// Raw affinity points that map to an affinity score of 1.0
    pub affinity_ceiling: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            recency: 0.40,
            specialty: 0.30,
            affinity: 0.30,
            cold_start_threshold: 10,
            affinity_ceiling: 50.0,
        }
    }
}

impl WeightConfig {
    /// Build a config from a stored override object, field by field.
    pub fn from_overrides(overrides: &Value) -> Self {
        let defaults = Self::default();
        Self {
            recency: f64_field(overrides, "recency", defaults.recency),
            specialty: f64_field(overrides, "specialty", defaults.specialty),
            affinity: f64_field(overrides, "affinity", defaults.affinity),
            cold_start_threshold: overrides
                .get("cold_start_threshold")
                .and_then(Value::as_u64)
                .map(|v| v as u32)
                .unwrap_or(defaults.cold_start_threshold),
            affinity_ceiling: f64_field(overrides, "affinity_ceiling", defaults.affinity_ceiling),
        }
    }
}

fn f64_field(value: &Value, key: &str, default: f64) -> f64 {
    value.get(key).and_then(Value::as_f64).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_production_weights() {
        let config = WeightConfig::default();
        assert_eq!(config.recency, 0.40);
        assert_eq!(config.specialty, 0.30);
        assert_eq!(config.affinity, 0.30);
        assert_eq!(config.cold_start_threshold, 10);
        assert_eq!(config.affinity_ceiling, 50.0);
    }

    #[test]
    fn partial_overrides_fall_back_per_field() {
        let config = WeightConfig::from_overrides(&json!({"recency": 0.2, "affinity": 0.5}));
        assert_eq!(config.recency, 0.2);
        assert_eq!(config.affinity, 0.5);
        assert_eq!(config.specialty, 0.30);
        assert_eq!(config.cold_start_threshold, 10);
    }

    #[test]
    fn mistyped_and_unknown_fields_are_ignored() {
        let config =
            WeightConfig::from_overrides(&json!({"recency": "fast", "unknown_knob": 9.9}));
        assert_eq!(config, WeightConfig::default());
    }

    #[test]
    fn null_overrides_yield_defaults() {
        assert_eq!(
            WeightConfig::from_overrides(&Value::Null),
            WeightConfig::default()
        );
    }
}
