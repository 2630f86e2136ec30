//! Data structures for cohorts, experiments, and experiment events.
//!
//! Cohorts group users by shared characteristics and map to custom feed
//! scoring weights stored in `feed_algorithm` JSONB. Experiments run
//! multi-variant tests within a cohort; the `variants` JSONB field holds an
//! array of `{name, traffic_pct, algorithm_config}` objects — two variants
//! covers control/treatment, more are supported. Experiment events capture
//! per-user telemetry for computing per-variant metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use std::fmt;
use uuid::Uuid;

/// Experiment status (matches the `experiment_status` database enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "experiment_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    Completed,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Draft => "DRAFT",
            ExperimentStatus::Running => "RUNNING",
            ExperimentStatus::Paused => "PAUSED",
            ExperimentStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Experiment event type (matches the `experiment_event_type` database enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "experiment_event_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentEventType {
    Impression,
    Click,
    Like,
    Comment,
    Share,
    SessionStart,
    SessionEnd,
}

/// Admin-defined user segment with custom feed scoring weights.
///
/// `rules` stores the membership rule spec as JSON for display purposes;
/// actual membership is resolved externally and passed in as `cohort_ids`.
/// Higher `priority` wins when a user belongs to multiple active cohorts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cohort {
    pub cohort_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub rules: Option<Value>,
    /// Feed ranking weight overrides:
    /// {recency, specialty, affinity, cold_start_threshold, affinity_ceiling}
    pub feed_algorithm: Value,
    pub priority: i16,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Cohort creation input
#[derive(Debug, Clone, Deserialize)]
pub struct NewCohort {
    pub name: String,
    pub description: Option<String>,
    pub rules: Option<Value>,
    pub feed_algorithm: Value,
    pub priority: i16,
    pub is_active: bool,
    pub created_by: Uuid,
}

/// Partial cohort update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CohortUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rules: Option<Value>,
    pub feed_algorithm: Option<Value>,
    pub priority: Option<i16>,
    pub is_active: Option<bool>,
}

/// Single variant definition inside an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    /// Percentage of cohort traffic routed to this variant (0-100)
    pub traffic_pct: u32,
    /// Feed weight overrides applied while this variant is assigned
    #[serde(default)]
    pub algorithm_config: Value,
}

/// Multi-variant A/B experiment targeting a cohort
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Experiment {
    pub experiment_id: Uuid,
    pub cohort_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: ExperimentStatus,
    pub variants: Json<Vec<Variant>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Computed per-variant results, written back by the results calculator
    pub results: Option<Value>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Experiment creation input; experiments always start in DRAFT
#[derive(Debug, Clone, Deserialize)]
pub struct NewExperiment {
    pub cohort_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub variants: Vec<Variant>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
}

/// Partial experiment update; only allowed in DRAFT or PAUSED
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperimentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub variants: Option<Vec<Variant>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Immutable per-user telemetry row; `occurred_at` is server-assigned
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExperimentEvent {
    pub event_id: Uuid,
    pub experiment_id: Uuid,
    pub user_id: Uuid,
    pub variant_name: String,
    pub event_type: ExperimentEventType,
    pub post_id: Option<Uuid>,
    /// Continuous metric payload, only set for SESSION_END events
    pub session_duration_s: Option<i32>,
    pub occurred_at: DateTime<Utc>,
}

/// Event ingestion input
#[derive(Debug, Clone, Deserialize)]
pub struct NewExperimentEvent {
    pub experiment_id: Uuid,
    pub user_id: Uuid,
    pub variant_name: String,
    pub event_type: ExperimentEventType,
    pub post_id: Option<Uuid>,
    pub session_duration_s: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&ExperimentStatus::Draft).unwrap();
        assert_eq!(json, "\"DRAFT\"");
        let back: ExperimentStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(back, ExperimentStatus::Completed);
    }

    #[test]
    fn event_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&ExperimentEventType::SessionStart).unwrap();
        assert_eq!(json, "\"SESSION_START\"");
    }

    #[test]
    fn variant_config_defaults_to_null_when_absent() {
        let v: Variant = serde_json::from_str(r#"{"name":"control","traffic_pct":50}"#).unwrap();
        assert_eq!(v.traffic_pct, 50);
        assert!(v.algorithm_config.is_null());
    }
}
