//! Event ingestion
//!
//! Appends immutable experiment events. No deduplication happens here;
//! duplicate exposures are expected and handled at aggregation time. The
//! foreign key on `experiment_id` enforces referential validity, so the
//! write path does no existence pre-check.

use sqlx::PgPool;
use tracing::debug;

use crate::db::EventRepo;
use crate::error::Result;
use crate::models::{ExperimentEvent, NewExperimentEvent};

pub struct EventIngestor {
    events: EventRepo,
}

impl EventIngestor {
    pub fn new(pool: PgPool) -> Self {
        Self {
            events: EventRepo::new(pool),
        }
    }

    /// Record one event; the timestamp is server-assigned.
    pub async fn ingest(&self, event: NewExperimentEvent) -> Result<ExperimentEvent> {
        let row = self.events.insert(event).await?;
        debug!(
            "ingested {:?} event for experiment {} variant '{}'",
            row.event_type, row.experiment_id, row.variant_name
        );
        Ok(row)
    }
}
