//! Per-user weight resolution
//!
//! Resolution order:
//! 1. No cohort memberships -> default weights, no cache touch
//! 2. Cache hit on (user, cohort-set hash) -> cached weights
//! 3. Highest-priority active cohort; a RUNNING experiment on that cohort
//!    overrides via deterministic variant assignment, otherwise the
//!    cohort's own `feed_algorithm` applies
//! 4. Result cached with a short TTL
//!
//! The cache is fail-open: any get/set/decode error is logged and the
//! resolve proceeds on the uncached path. Cache unavailability never
//! surfaces to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::WeightsCache;
use crate::db::{CohortRepo, ExperimentRepo};
use crate::error::Result;
use crate::models::{Cohort, Experiment};
use crate::services::assignment::assign_variant;
use crate::services::scoring::WeightConfig;

/// Cache key pattern for resolved weight configs
const WEIGHTS_CACHE_KEY_PREFIX: &str = "experiments:weights:";

/// Store-side lookups the resolver needs, kept behind a trait so tests can
/// inject doubles.
#[async_trait]
pub trait CohortSource: Send + Sync {
    async fn highest_priority_active(&self, cohort_ids: &[Uuid]) -> Result<Option<Cohort>>;
    async fn running_experiment(
        &self,
        cohort_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Experiment>>;
}

/// Postgres-backed cohort source
pub struct PgCohortSource {
    cohorts: CohortRepo,
    experiments: ExperimentRepo,
}

impl PgCohortSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            cohorts: CohortRepo::new(pool.clone()),
            experiments: ExperimentRepo::new(pool),
        }
    }
}

#[async_trait]
impl CohortSource for PgCohortSource {
    async fn highest_priority_active(&self, cohort_ids: &[Uuid]) -> Result<Option<Cohort>> {
        self.cohorts.highest_priority_active(cohort_ids).await
    }

    async fn running_experiment(
        &self,
        cohort_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Experiment>> {
        self.experiments
            .find_running_for_cohort(cohort_id, now)
            .await
    }
}

/// Resolved weights plus a label describing where they came from:
/// `"default"`, `"cohort"`, or `"experiment:{name}:{variant}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWeights {
    #[serde(flatten)]
    pub config: WeightConfig,
    pub source: String,
}

impl ResolvedWeights {
    fn default_weights() -> Self {
        Self {
            config: WeightConfig::default(),
            source: "default".to_string(),
        }
    }
}

pub struct WeightResolver {
    source: Arc<dyn CohortSource>,
    cache: Arc<dyn WeightsCache>,
    cache_ttl_secs: u64,
}

impl WeightResolver {
    pub fn new(
        source: Arc<dyn CohortSource>,
        cache: Arc<dyn WeightsCache>,
        cache_ttl_secs: u64,
    ) -> Self {
        Self {
            source,
            cache,
            cache_ttl_secs,
        }
    }

    /// Resolve the effective weight config for a user.
    pub async fn resolve(&self, user_id: Uuid, cohort_ids: &[Uuid]) -> Result<ResolvedWeights> {
        if cohort_ids.is_empty() {
            return Ok(ResolvedWeights::default_weights());
        }

        let key = cache_key(user_id, cohort_ids);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<ResolvedWeights>(&bytes) {
                Ok(resolved) => {
                    debug!("weights resolved from cache for user {}", user_id);
                    return Ok(resolved);
                }
                Err(e) => warn!("discarding undecodable weights cache entry: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!("weights cache read failed, resolving uncached: {}", e),
        }

        let resolved = self.resolve_uncached(user_id, cohort_ids).await?;

        match serde_json::to_vec(&resolved) {
            Ok(bytes) => {
                if let Err(e) = self.cache.set(&key, &bytes, self.cache_ttl_secs).await {
                    warn!("weights cache write failed: {}", e);
                }
            }
            Err(e) => warn!("failed to serialize weights for cache: {}", e),
        }

        Ok(resolved)
    }

    async fn resolve_uncached(&self, user_id: Uuid, cohort_ids: &[Uuid]) -> Result<ResolvedWeights> {
        let cohort = match self.source.highest_priority_active(cohort_ids).await? {
            Some(cohort) => cohort,
            None => return Ok(ResolvedWeights::default_weights()),
        };

        let now = Utc::now();
        if let Some(experiment) = self
            .source
            .running_experiment(cohort.cohort_id, now)
            .await?
        {
            let variant = assign_variant(user_id, experiment.experiment_id, &experiment.variants)?;
            debug!(
                "user {} assigned variant '{}' in experiment '{}'",
                user_id, variant.name, experiment.name
            );
            return Ok(ResolvedWeights {
                config: WeightConfig::from_overrides(&variant.algorithm_config),
                source: format!("experiment:{}:{}", experiment.name, variant.name),
            });
        }

        Ok(ResolvedWeights {
            config: WeightConfig::from_overrides(&cohort.feed_algorithm),
            source: "cohort".to_string(),
        })
    }
}

/// `experiments:weights:{user_id}:{cohort_hash}` where the hash is over the
/// sorted cohort id set, so membership order does not fragment the cache.
fn cache_key(user_id: Uuid, cohort_ids: &[Uuid]) -> String {
    let mut ids: Vec<String> = cohort_ids.iter().map(Uuid::to_string).collect();
    ids.sort();
    let digest = Sha256::digest(ids.join(",").as_bytes());
    let cohort_hash = &hex::encode(digest)[..16];
    format!("{WEIGHTS_CACHE_KEY_PREFIX}{user_id}:{cohort_hash}")
}
