/// Database access layer
///
/// Repository implementations for cohorts, experiments, and experiment
/// events. All queries run against an injected `PgPool`; lifecycle
/// transitions take a row lock so concurrent transitions serialize.
pub mod cohort_repo;
pub mod event_repo;
pub mod experiment_repo;

pub use cohort_repo::CohortRepo;
pub use event_repo::{EventRepo, VariantEventAggregate};
pub use experiment_repo::ExperimentRepo;
