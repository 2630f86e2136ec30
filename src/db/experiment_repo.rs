//! Experiment repository
//!
//! CRUD plus persisted lifecycle transitions. Transitions lock the row
//! (`SELECT ... FOR UPDATE`) so two concurrent transitions cannot both
//! succeed from the same prior state; a failed validation rolls the
//! transaction back and leaves the row unchanged.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Experiment, ExperimentStatus, ExperimentUpdate, NewExperiment, Variant};
use crate::services::lifecycle::{self, LifecycleAction};

const EXPERIMENT_COLUMNS: &str = "experiment_id, cohort_id, name, description, status, \
                                  variants, start_date, end_date, results, created_by, created_at";

pub struct ExperimentRepo {
    pool: PgPool,
}

impl ExperimentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an experiment in DRAFT after validating variants and duration.
    ///
    /// # Errors
    /// - `VariantTraffic` if traffic percentages do not sum to 100
    /// - `Duration` if end_date is under the minimum duration after start
    /// - `Conflict` if the experiment name already exists
    pub async fn create(&self, input: NewExperiment) -> Result<Experiment> {
        lifecycle::validate_variants(&input.variants)?;
        let start_baseline = input.start_date.unwrap_or_else(Utc::now);
        lifecycle::validate_duration(start_baseline, input.end_date)?;

        let experiment = sqlx::query_as::<_, Experiment>(&format!(
            r#"
            INSERT INTO ab_experiments (experiment_id, cohort_id, name, description,
                                        status, variants, start_date, end_date, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {EXPERIMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.cohort_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(ExperimentStatus::Draft)
        .bind(Json(&input.variants))
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "experiment with name '{}' already exists",
                input.name
            )),
            _ => AppError::Database(e),
        })?;

        info!(
            "created experiment '{}' (id={}, {} variants)",
            experiment.name,
            experiment.experiment_id,
            experiment.variants.len()
        );
        Ok(experiment)
    }

    /// List all experiments, newest first
    pub async fn list(&self) -> Result<Vec<Experiment>> {
        let experiments = sqlx::query_as::<_, Experiment>(&format!(
            "SELECT {EXPERIMENT_COLUMNS} FROM ab_experiments ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(experiments)
    }

    pub async fn get(&self, experiment_id: Uuid) -> Result<Experiment> {
        sqlx::query_as::<_, Experiment>(&format!(
            "SELECT {EXPERIMENT_COLUMNS} FROM ab_experiments WHERE experiment_id = $1"
        ))
        .bind(experiment_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::ExperimentNotFound(experiment_id))
    }

    /// Apply a partial update; allowed only in DRAFT or PAUSED.
    ///
    /// New variants are re-validated; the effective end_date is re-checked
    /// against the experiment's start (or creation time before any start).
    pub async fn update(
        &self,
        experiment_id: Uuid,
        updates: ExperimentUpdate,
    ) -> Result<Experiment> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Experiment>(&format!(
            "SELECT {EXPERIMENT_COLUMNS} FROM ab_experiments WHERE experiment_id = $1 FOR UPDATE"
        ))
        .bind(experiment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::ExperimentNotFound(experiment_id))?;

        if !matches!(
            current.status,
            ExperimentStatus::Draft | ExperimentStatus::Paused
        ) {
            return Err(AppError::Transition {
                action: "update",
                current: current.status,
            });
        }

        if let Some(variants) = &updates.variants {
            lifecycle::validate_variants(variants)?;
        }
        let start_baseline = current.start_date.unwrap_or(current.created_at);
        let effective_end = updates.end_date.or(current.end_date);
        lifecycle::validate_duration(start_baseline, effective_end)?;

        let updated = sqlx::query_as::<_, Experiment>(&format!(
            r#"
            UPDATE ab_experiments
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                variants = COALESCE($4, variants),
                end_date = COALESCE($5, end_date)
            WHERE experiment_id = $1
            RETURNING {EXPERIMENT_COLUMNS}
            "#
        ))
        .bind(experiment_id)
        .bind(&updates.name)
        .bind(&updates.description)
        .bind(updates.variants.map(Json::<Vec<Variant>>))
        .bind(updates.end_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Apply a lifecycle transition under a row lock.
    ///
    /// `start` stamps `start_date = now` and re-checks that an existing
    /// end_date still leaves the minimum run duration.
    pub async fn transition(
        &self,
        experiment_id: Uuid,
        action: LifecycleAction,
    ) -> Result<Experiment> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Experiment>(&format!(
            "SELECT {EXPERIMENT_COLUMNS} FROM ab_experiments WHERE experiment_id = $1 FOR UPDATE"
        ))
        .bind(experiment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::ExperimentNotFound(experiment_id))?;

        let next = lifecycle::next_status(current.status, action)?;

        let start_date: Option<DateTime<Utc>> = match action {
            LifecycleAction::Start => {
                let now = Utc::now();
                lifecycle::validate_duration(now, current.end_date)?;
                Some(now)
            }
            LifecycleAction::Pause | LifecycleAction::Complete => None,
        };

        let updated = sqlx::query_as::<_, Experiment>(&format!(
            r#"
            UPDATE ab_experiments
            SET status = $2, start_date = COALESCE($3, start_date)
            WHERE experiment_id = $1
            RETURNING {EXPERIMENT_COLUMNS}
            "#
        ))
        .bind(experiment_id)
        .bind(next)
        .bind(start_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            "experiment {} transitioned {} -> {}",
            experiment_id, current.status, next
        );
        Ok(updated)
    }

    /// RUNNING experiment for a cohort whose start date has passed, if any
    pub async fn find_running_for_cohort(
        &self,
        cohort_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Experiment>> {
        let experiment = sqlx::query_as::<_, Experiment>(&format!(
            r#"
            SELECT {EXPERIMENT_COLUMNS} FROM ab_experiments
            WHERE cohort_id = $1
              AND status = $2
              AND start_date IS NOT NULL
              AND start_date <= $3
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(cohort_id)
        .bind(ExperimentStatus::Running)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(experiment)
    }

    /// Persist computed results back onto the experiment row
    pub async fn store_results(
        &self,
        experiment_id: Uuid,
        results: serde_json::Value,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE ab_experiments SET results = $2 WHERE experiment_id = $1")
            .bind(experiment_id)
            .bind(results)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::ExperimentNotFound(experiment_id));
        }
        Ok(())
    }
}
