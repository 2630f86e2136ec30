//! Per-variant results computation
//!
//! Aggregates ingested events by variant and computes metrics with 95%
//! confidence intervals: the Wilson score interval for CTR (valid at small
//! sample sizes, unlike the normal approximation) and a normal-approximation
//! interval for mean session duration. Variants below the sample floor are
//! flagged low-confidence rather than omitted; variants with zero events
//! report n=0 instead of erroring.
//!
//! CTR denominators are event-level raw impression counts. Duplicate
//! exposures from the same user are counted as-is; the ingestion path does
//! not deduplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::db::{EventRepo, ExperimentRepo, VariantEventAggregate};
use crate::error::Result;
use crate::models::ExperimentEventType;

/// z-score for 95% confidence
pub const Z_95: f64 = 1.96;

/// Below this many samples a metric is flagged low-confidence
pub const LOW_CONFIDENCE_MIN_SAMPLES: i64 = 30;

/// One metric with its sample size and confidence interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub n: i64,
    pub value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub low_confidence: bool,
}

/// Computed metrics for a single variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResults {
    pub impressions: i64,
    pub clicks: i64,
    pub likes: i64,
    pub session_starts: i64,
    /// clicks / impressions with a Wilson score interval
    pub ctr: MetricSummary,
    pub likes_per_session: f64,
    /// Mean session duration with a normal-approximation interval;
    /// absent when no SESSION_END events carried a duration
    pub avg_session_duration_s: Option<MetricSummary>,
}

/// Results for all variants of an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub experiment_id: Uuid,
    pub variants: BTreeMap<String, VariantResults>,
    /// True when the treatment CTR interval sits entirely above control's
    pub is_significant: bool,
    pub computed_at: DateTime<Utc>,
}

/// Wilson score confidence interval for a proportion, clamped to [0, 1].
/// Zero trials yield (0, 0) rather than a division error.
pub fn wilson_interval(successes: i64, trials: i64, z: f64) -> (f64, f64) {
    if trials == 0 {
        return (0.0, 0.0);
    }
    let n = trials as f64;
    let p = successes as f64 / n;
    let denominator = 1.0 + z * z / n;
    let centre = (p + z * z / (2.0 * n)) / denominator;
    let margin = z * (p * (1.0 - p) / n + z * z / (4.0 * n * n)).sqrt() / denominator;
    ((centre - margin).max(0.0), (centre + margin).min(1.0))
}

/// Normal-approximation interval around a sample mean: mean ± z * s/√n
pub fn normal_interval(mean: f64, stddev: f64, n: i64, z: f64) -> (f64, f64) {
    if n == 0 {
        return (mean, mean);
    }
    let se = stddev / (n as f64).sqrt();
    (mean - z * se, mean + z * se)
}

#[derive(Debug, Default, Clone)]
struct VariantCounts {
    impressions: i64,
    clicks: i64,
    likes: i64,
    session_starts: i64,
    duration_samples: i64,
    avg_duration: Option<f64>,
    stddev_duration: Option<f64>,
}

/// Fold aggregate rows into per-variant results. Declared variants with no
/// events still get an entry; undeclared variant names appearing in events
/// (e.g. after a variant rename) are reported too.
pub fn build_results(
    experiment_id: Uuid,
    declared_variants: &[String],
    rows: &[VariantEventAggregate],
) -> ExperimentResults {
    let mut counts: BTreeMap<String, VariantCounts> = declared_variants
        .iter()
        .map(|name| (name.clone(), VariantCounts::default()))
        .collect();

    for row in rows {
        let entry = counts.entry(row.variant_name.clone()).or_default();
        match row.event_type {
            ExperimentEventType::Impression => entry.impressions = row.events,
            ExperimentEventType::Click => entry.clicks = row.events,
            ExperimentEventType::Like => entry.likes = row.events,
            ExperimentEventType::SessionStart => entry.session_starts = row.events,
            ExperimentEventType::SessionEnd => {
                entry.duration_samples = row.duration_samples;
                entry.avg_duration = row.avg_duration;
                entry.stddev_duration = row.stddev_duration;
            }
            ExperimentEventType::Comment | ExperimentEventType::Share => {}
        }
    }

    let variants: BTreeMap<String, VariantResults> = counts
        .into_iter()
        .map(|(name, c)| (name, summarize(&c)))
        .collect();

    let is_significant = match (variants.get("control"), variants.get("treatment")) {
        (Some(control), Some(treatment)) => treatment.ctr.ci_low > control.ctr.ci_high,
        _ => false,
    };

    ExperimentResults {
        experiment_id,
        variants,
        is_significant,
        computed_at: Utc::now(),
    }
}

fn summarize(counts: &VariantCounts) -> VariantResults {
    let ctr_value = if counts.impressions > 0 {
        counts.clicks as f64 / counts.impressions as f64
    } else {
        0.0
    };
    let (ci_low, ci_high) = wilson_interval(counts.clicks, counts.impressions, Z_95);
    let ctr = MetricSummary {
        n: counts.impressions,
        value: ctr_value,
        ci_low,
        ci_high,
        low_confidence: counts.impressions < LOW_CONFIDENCE_MIN_SAMPLES,
    };

    let avg_session_duration_s = counts.avg_duration.map(|mean| {
        let stddev = counts.stddev_duration.unwrap_or(0.0);
        let (ci_low, ci_high) = normal_interval(mean, stddev, counts.duration_samples, Z_95);
        MetricSummary {
            n: counts.duration_samples,
            value: mean,
            ci_low,
            ci_high,
            low_confidence: counts.duration_samples < LOW_CONFIDENCE_MIN_SAMPLES,
        }
    });

    let likes_per_session = if counts.session_starts > 0 {
        counts.likes as f64 / counts.session_starts as f64
    } else {
        0.0
    };

    VariantResults {
        impressions: counts.impressions,
        clicks: counts.clicks,
        likes: counts.likes,
        session_starts: counts.session_starts,
        ctr,
        likes_per_session,
        avg_session_duration_s,
    }
}

/// Read-only results computation over the events table.
pub struct ResultsCalculator {
    experiments: ExperimentRepo,
    events: EventRepo,
}

impl ResultsCalculator {
    pub fn new(pool: PgPool) -> Self {
        Self {
            experiments: ExperimentRepo::new(pool.clone()),
            events: EventRepo::new(pool),
        }
    }

    /// Compute per-variant statistics and persist them onto the experiment.
    pub async fn compute(&self, experiment_id: Uuid) -> Result<ExperimentResults> {
        let experiment = self.experiments.get(experiment_id).await?;
        let rows = self.events.aggregate_by_variant(experiment_id).await?;

        let declared: Vec<String> = experiment
            .variants
            .iter()
            .map(|v| v.name.clone())
            .collect();
        let results = build_results(experiment_id, &declared, &rows);

        self.experiments
            .store_results(experiment_id, serde_json::to_value(&results)?)
            .await?;

        info!(
            "computed results for experiment '{}' ({} variants, significant={})",
            experiment.name,
            results.variants.len(),
            results.is_significant
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(
        variant: &str,
        event_type: ExperimentEventType,
        events: i64,
    ) -> VariantEventAggregate {
        VariantEventAggregate {
            variant_name: variant.to_string(),
            event_type,
            events,
            duration_samples: 0,
            avg_duration: None,
            stddev_duration: None,
        }
    }

    fn duration_agg(
        variant: &str,
        samples: i64,
        avg: f64,
        stddev: f64,
    ) -> VariantEventAggregate {
        VariantEventAggregate {
            variant_name: variant.to_string(),
            event_type: ExperimentEventType::SessionEnd,
            events: samples,
            duration_samples: samples,
            avg_duration: Some(avg),
            stddev_duration: Some(stddev),
        }
    }

    #[test]
    fn wilson_brackets_raw_proportion_within_unit_interval() {
        // 2 conversions out of 10 exposures
        let (low, high) = wilson_interval(2, 10, Z_95);
        assert!(low > 0.0 && low < 0.2, "low: {low}");
        assert!(high > 0.2 && high < 1.0, "high: {high}");
    }

    #[test]
    fn wilson_stays_in_unit_interval_at_extremes() {
        let (low, _) = wilson_interval(0, 10, Z_95);
        assert_eq!(low, 0.0);
        let (_, high) = wilson_interval(10, 10, Z_95);
        assert!(high <= 1.0);
    }

    #[test]
    fn wilson_zero_trials_is_defined() {
        assert_eq!(wilson_interval(0, 0, Z_95), (0.0, 0.0));
    }

    #[test]
    fn wilson_narrows_with_sample_size() {
        let (small_low, small_high) = wilson_interval(20, 100, Z_95);
        let (big_low, big_high) = wilson_interval(2_000, 10_000, Z_95);
        assert!(big_high - big_low < small_high - small_low);
    }

    #[test]
    fn variant_with_zero_events_reports_no_data() {
        let experiment_id = Uuid::new_v4();
        let declared = vec!["control".to_string(), "treatment".to_string()];
        let rows = vec![
            agg("control", ExperimentEventType::Impression, 100),
            agg("control", ExperimentEventType::Click, 10),
        ];

        let results = build_results(experiment_id, &declared, &rows);
        let treatment = &results.variants["treatment"];
        assert_eq!(treatment.impressions, 0);
        assert_eq!(treatment.ctr.n, 0);
        assert_eq!(treatment.ctr.value, 0.0);
        assert_eq!((treatment.ctr.ci_low, treatment.ctr.ci_high), (0.0, 0.0));
        assert!(treatment.ctr.low_confidence);
        assert!(!results.is_significant);
    }

    #[test]
    fn ctr_low_confidence_below_sample_floor() {
        let declared = vec!["control".to_string()];
        let rows = vec![
            agg("control", ExperimentEventType::Impression, 10),
            agg("control", ExperimentEventType::Click, 2),
        ];
        let results = build_results(Uuid::new_v4(), &declared, &rows);
        let control = &results.variants["control"];
        assert_eq!(control.ctr.value, 0.2);
        assert!(control.ctr.low_confidence);
        assert!(control.ctr.ci_low < 0.2 && control.ctr.ci_high > 0.2);
    }

    #[test]
    fn separated_intervals_flag_significance() {
        let declared = vec!["control".to_string(), "treatment".to_string()];
        let rows = vec![
            agg("control", ExperimentEventType::Impression, 10_000),
            agg("control", ExperimentEventType::Click, 100),
            agg("treatment", ExperimentEventType::Impression, 10_000),
            agg("treatment", ExperimentEventType::Click, 900),
        ];
        let results = build_results(Uuid::new_v4(), &declared, &rows);
        assert!(results.is_significant);
    }

    #[test]
    fn overlapping_intervals_are_not_significant() {
        let declared = vec!["control".to_string(), "treatment".to_string()];
        let rows = vec![
            agg("control", ExperimentEventType::Impression, 100),
            agg("control", ExperimentEventType::Click, 10),
            agg("treatment", ExperimentEventType::Impression, 100),
            agg("treatment", ExperimentEventType::Click, 12),
        ];
        let results = build_results(Uuid::new_v4(), &declared, &rows);
        assert!(!results.is_significant);
    }

    #[test]
    fn session_duration_interval_and_confidence_flag() {
        let declared = vec!["control".to_string(), "treatment".to_string()];
        let rows = vec![
            duration_agg("control", 100, 240.0, 60.0),
            duration_agg("treatment", 12, 250.0, 80.0),
        ];
        let results = build_results(Uuid::new_v4(), &declared, &rows);

        let control = results.variants["control"]
            .avg_session_duration_s
            .as_ref()
            .unwrap();
        assert_eq!(control.n, 100);
        assert!(!control.low_confidence);
        // mean ± 1.96 * 60/sqrt(100) = 240 ± 11.76
        assert!((control.ci_low - 228.24).abs() < 0.01);
        assert!((control.ci_high - 251.76).abs() < 0.01);

        let treatment = results.variants["treatment"]
            .avg_session_duration_s
            .as_ref()
            .unwrap();
        assert!(treatment.low_confidence);
    }

    #[test]
    fn likes_per_session_defined_without_sessions() {
        let declared = vec!["control".to_string()];
        let rows = vec![agg("control", ExperimentEventType::Like, 5)];
        let results = build_results(Uuid::new_v4(), &declared, &rows);
        let control = &results.variants["control"];
        assert_eq!(control.likes, 5);
        assert_eq!(control.likes_per_session, 0.0);
    }

    #[test]
    fn undeclared_variant_names_from_events_are_reported() {
        let declared = vec!["control".to_string()];
        let rows = vec![agg("legacy", ExperimentEventType::Impression, 3)];
        let results = build_results(Uuid::new_v4(), &declared, &rows);
        assert!(results.variants.contains_key("legacy"));
        assert!(results.variants.contains_key("control"));
    }
}
