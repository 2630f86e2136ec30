/// Business logic layer
///
/// - `assignment`: deterministic variant bucketing
/// - `scoring`: feed weight configuration and override merging
/// - `weights`: per-user weight resolution with cache fail-open
/// - `lifecycle`: experiment state machine and validation rules
/// - `ingest`: append-only event ingestion
/// - `results`: per-variant metrics with confidence intervals
pub mod assignment;
pub mod ingest;
pub mod lifecycle;
pub mod results;
pub mod scoring;
pub mod weights;
