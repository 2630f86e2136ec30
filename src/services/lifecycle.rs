//! Experiment lifecycle rules
//!
//! The pure state machine and validation checks. Persistence (row locking,
//! transactional apply) lives in `db::experiment_repo`; everything here is
//! side-effect free so the rules are exhaustively testable.

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, Result};
use crate::models::{ExperimentStatus, Variant};

/// Minimum run length when an end date is set
pub const MIN_DURATION_DAYS: i64 = 7;

/// Lifecycle transition requested by an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Pause,
    Complete,
}

impl LifecycleAction {
    pub fn verb(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Pause => "pause",
            LifecycleAction::Complete => "complete",
        }
    }
}

/// Transition table:
/// start: DRAFT | PAUSED -> RUNNING
/// pause: RUNNING -> PAUSED
/// complete: RUNNING | PAUSED -> COMPLETED (terminal)
pub fn next_status(current: ExperimentStatus, action: LifecycleAction) -> Result<ExperimentStatus> {
    use ExperimentStatus::*;
    match (current, action) {
        (Draft | Paused, LifecycleAction::Start) => Ok(Running),
        (Running, LifecycleAction::Pause) => Ok(Paused),
        (Running | Paused, LifecycleAction::Complete) => Ok(Completed),
        (current, action) => Err(AppError::Transition {
            action: action.verb(),
            current,
        }),
    }
}

/// Traffic percentages across all variants must sum to exactly 100.
pub fn validate_variants(variants: &[Variant]) -> Result<()> {
    let total: u32 = variants.iter().map(|v| v.traffic_pct).sum();
    if total != 100 {
        return Err(AppError::VariantTraffic(total));
    }
    Ok(())
}

/// An end date, when present, must be at least `MIN_DURATION_DAYS` after
/// the start baseline.
pub fn validate_duration(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<()> {
    if let Some(end) = end {
        if end < start + Duration::days(MIN_DURATION_DAYS) {
            return Err(AppError::Duration {
                min_days: MIN_DURATION_DAYS,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn variants(pcts: &[u32]) -> Vec<Variant> {
        pcts.iter()
            .enumerate()
            .map(|(i, &traffic_pct)| Variant {
                name: format!("v{i}"),
                traffic_pct,
                algorithm_config: json!({}),
            })
            .collect()
    }

    #[test]
    fn start_allowed_from_draft_and_paused() {
        assert_eq!(
            next_status(ExperimentStatus::Draft, LifecycleAction::Start).unwrap(),
            ExperimentStatus::Running
        );
        assert_eq!(
            next_status(ExperimentStatus::Paused, LifecycleAction::Start).unwrap(),
            ExperimentStatus::Running
        );
    }

    #[test]
    fn start_rejected_from_running_and_completed() {
        for current in [ExperimentStatus::Running, ExperimentStatus::Completed] {
            let err = next_status(current, LifecycleAction::Start).unwrap_err();
            assert!(matches!(err, AppError::Transition { action: "start", .. }));
        }
    }

    #[test]
    fn pause_only_from_running() {
        assert_eq!(
            next_status(ExperimentStatus::Running, LifecycleAction::Pause).unwrap(),
            ExperimentStatus::Paused
        );
        for current in [
            ExperimentStatus::Draft,
            ExperimentStatus::Paused,
            ExperimentStatus::Completed,
        ] {
            assert!(next_status(current, LifecycleAction::Pause).is_err());
        }
    }

    #[test]
    fn complete_from_running_or_paused_only() {
        assert_eq!(
            next_status(ExperimentStatus::Running, LifecycleAction::Complete).unwrap(),
            ExperimentStatus::Completed
        );
        assert_eq!(
            next_status(ExperimentStatus::Paused, LifecycleAction::Complete).unwrap(),
            ExperimentStatus::Completed
        );
        assert!(next_status(ExperimentStatus::Draft, LifecycleAction::Complete).is_err());
        assert!(next_status(ExperimentStatus::Completed, LifecycleAction::Complete).is_err());
    }

    #[test]
    fn completed_is_terminal() {
        for action in [
            LifecycleAction::Start,
            LifecycleAction::Pause,
            LifecycleAction::Complete,
        ] {
            assert!(next_status(ExperimentStatus::Completed, action).is_err());
        }
    }

    #[test]
    fn pause_then_complete_sequence() {
        let paused = next_status(ExperimentStatus::Running, LifecycleAction::Pause).unwrap();
        let completed = next_status(paused, LifecycleAction::Complete).unwrap();
        assert_eq!(completed, ExperimentStatus::Completed);
    }

    #[test]
    fn traffic_must_sum_to_exactly_100() {
        assert!(validate_variants(&variants(&[40, 35, 25])).is_ok());
        assert!(matches!(
            validate_variants(&variants(&[50, 49])).unwrap_err(),
            AppError::VariantTraffic(99)
        ));
        assert!(matches!(
            validate_variants(&variants(&[50, 51])).unwrap_err(),
            AppError::VariantTraffic(101)
        ));
        assert!(matches!(
            validate_variants(&[]).unwrap_err(),
            AppError::VariantTraffic(0)
        ));
    }

    #[test]
    fn end_date_must_leave_seven_days() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let too_soon = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        let exactly_seven = Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap();

        assert!(matches!(
            validate_duration(start, Some(too_soon)).unwrap_err(),
            AppError::Duration { min_days: 7 }
        ));
        assert!(validate_duration(start, Some(exactly_seven)).is_ok());
        assert!(validate_duration(start, None).is_ok());
    }
}
