//! Cache layer
//!
//! The weight resolver treats the cache as an optimization, never a
//! correctness mechanism; implementations report errors and callers decide
//! whether to fail open.

pub mod weights_cache;

pub use weights_cache::{RedisWeightsCache, WeightsCache};
