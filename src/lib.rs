/// Experiment Service Library
///
/// Core of the A/B experimentation subsystem for the content domain:
/// cohorts with custom feed scoring weights, multi-variant experiments with
/// a validated lifecycle, deterministic variant assignment, per-user weight
/// resolution (Redis-cached, fail-open), append-only event ingestion, and
/// per-variant results computation with confidence intervals.
///
/// HTTP routing, request-schema validation, and auth are the embedding
/// service's responsibility; this crate exposes the domain operations as
/// async methods over injected `PgPool` / cache handles.
///
/// # Modules
///
/// - `models`: Cohort, experiment, variant, and event data structures
/// - `db`: Database access layer and repositories
/// - `cache`: Weight-config cache trait and Redis implementation
/// - `services`: Assignment, weight resolution, lifecycle, ingestion, results
/// - `error`: Error types and handling
/// - `config`: Configuration management
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, ErrorKind, Result};
