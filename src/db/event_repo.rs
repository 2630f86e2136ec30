//! Experiment event repository
//!
//! Append-only writes (no updates, no deletes) and the read-only aggregate
//! the results calculator consumes. Referential validity is enforced by the
//! foreign key, not by a pre-check.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ExperimentEvent, ExperimentEventType, NewExperimentEvent};

pub struct EventRepo {
    pool: PgPool,
}

/// One GROUP BY (variant_name, event_type) aggregate row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VariantEventAggregate {
    pub variant_name: String,
    pub event_type: ExperimentEventType,
    pub events: i64,
    /// Count of rows with a non-null session_duration_s
    pub duration_samples: i64,
    pub avg_duration: Option<f64>,
    pub stddev_duration: Option<f64>,
}

impl EventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one event; `occurred_at` is assigned by the database
    pub async fn insert(&self, event: NewExperimentEvent) -> Result<ExperimentEvent> {
        let row = sqlx::query_as::<_, ExperimentEvent>(
            r#"
            INSERT INTO experiment_events (event_id, experiment_id, user_id, variant_name,
                                           event_type, post_id, session_duration_s, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            RETURNING event_id, experiment_id, user_id, variant_name, event_type,
                      post_id, session_duration_s, occurred_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.experiment_id)
        .bind(event.user_id)
        .bind(&event.variant_name)
        .bind(event.event_type)
        .bind(event.post_id)
        .bind(event.session_duration_s)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Aggregate counts and duration statistics per (variant, event type)
    pub async fn aggregate_by_variant(
        &self,
        experiment_id: Uuid,
    ) -> Result<Vec<VariantEventAggregate>> {
        let rows = sqlx::query_as::<_, VariantEventAggregate>(
            r#"
            SELECT variant_name,
                   event_type,
                   COUNT(*) AS events,
                   COUNT(session_duration_s) AS duration_samples,
                   AVG(session_duration_s)::float8 AS avg_duration,
                   STDDEV_SAMP(session_duration_s)::float8 AS stddev_duration
            FROM experiment_events
            WHERE experiment_id = $1
            GROUP BY variant_name, event_type
            "#,
        )
        .bind(experiment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
