//! Cohort repository
//!
//! CRUD for admin-defined cohorts plus the resolver-side lookup of the
//! highest-priority active cohort among a user's memberships.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Cohort, CohortUpdate, NewCohort};

const COHORT_COLUMNS: &str = "cohort_id, name, description, rules, feed_algorithm, \
                              priority, is_active, created_by, created_at";

pub struct CohortRepo {
    pool: PgPool,
}

impl CohortRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new cohort
    ///
    /// # Errors
    /// Returns `Conflict` if a cohort with the same name already exists.
    pub async fn create(&self, input: NewCohort) -> Result<Cohort> {
        let cohort = sqlx::query_as::<_, Cohort>(&format!(
            r#"
            INSERT INTO cohorts (cohort_id, name, description, rules, feed_algorithm,
                                 priority, is_active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COHORT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.rules)
        .bind(&input.feed_algorithm)
        .bind(input.priority)
        .bind(input.is_active)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("cohort with name '{}' already exists", input.name))
            }
            _ => AppError::Database(e),
        })?;

        info!("created cohort '{}' (id={})", cohort.name, cohort.cohort_id);
        Ok(cohort)
    }

    /// List all cohorts, highest priority first
    pub async fn list(&self) -> Result<Vec<Cohort>> {
        let cohorts = sqlx::query_as::<_, Cohort>(&format!(
            "SELECT {COHORT_COLUMNS} FROM cohorts ORDER BY priority DESC, created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(cohorts)
    }

    pub async fn get(&self, cohort_id: Uuid) -> Result<Cohort> {
        sqlx::query_as::<_, Cohort>(&format!(
            "SELECT {COHORT_COLUMNS} FROM cohorts WHERE cohort_id = $1"
        ))
        .bind(cohort_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::CohortNotFound(cohort_id))
    }

    /// Apply a partial update; `None` fields keep their current value
    pub async fn update(&self, cohort_id: Uuid, updates: CohortUpdate) -> Result<Cohort> {
        sqlx::query_as::<_, Cohort>(&format!(
            r#"
            UPDATE cohorts
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                rules = COALESCE($4, rules),
                feed_algorithm = COALESCE($5, feed_algorithm),
                priority = COALESCE($6, priority),
                is_active = COALESCE($7, is_active)
            WHERE cohort_id = $1
            RETURNING {COHORT_COLUMNS}
            "#
        ))
        .bind(cohort_id)
        .bind(&updates.name)
        .bind(&updates.description)
        .bind(&updates.rules)
        .bind(&updates.feed_algorithm)
        .bind(updates.priority)
        .bind(updates.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::CohortNotFound(cohort_id))
    }

    pub async fn delete(&self, cohort_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM cohorts WHERE cohort_id = $1")
            .bind(cohort_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::CohortNotFound(cohort_id));
        }
        info!("deleted cohort {}", cohort_id);
        Ok(())
    }

    /// Highest-priority active cohort among the given ids, if any
    pub async fn highest_priority_active(&self, cohort_ids: &[Uuid]) -> Result<Option<Cohort>> {
        let cohort = sqlx::query_as::<_, Cohort>(&format!(
            r#"
            SELECT {COHORT_COLUMNS} FROM cohorts
            WHERE cohort_id = ANY($1) AND is_active = TRUE
            ORDER BY priority DESC
            LIMIT 1
            "#
        ))
        .bind(cohort_ids)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cohort)
    }
}
