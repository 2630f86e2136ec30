//! Deterministic variant assignment
//!
//! Pure function mapping (user, experiment) to a variant bucket via
//! SHA-256, so a user's variant can be re-derived on demand without ever
//! persisting the assignment. No database or cache access.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Variant;

/// Bucket space resolution. traffic_pct is scaled by 100 so a 1% share
/// spans 100 buckets.
const BUCKET_SPACE: u64 = 10_000;

/// Assign a user to a variant deterministically.
///
/// `bucket = u64(first 8 bytes of SHA-256("{user_id}:{experiment_id}")) % 10000`,
/// then the variants are walked in declared order accumulating
/// `traffic_pct * 100` until the cumulative share exceeds the bucket.
///
/// Same inputs always yield the same variant. If the percentages do not sum
/// to 100 (prevented at creation), the last variant absorbs the remainder.
pub fn assign_variant<'a>(
    user_id: Uuid,
    experiment_id: Uuid,
    variants: &'a [Variant],
) -> Result<&'a Variant> {
    if variants.is_empty() {
        return Err(AppError::Internal(format!(
            "experiment {experiment_id} has no variants"
        )));
    }

    let bucket = bucket_for(user_id, experiment_id);

    let mut cumulative = 0u64;
    for variant in variants {
        cumulative += u64::from(variant.traffic_pct) * 100;
        if bucket < cumulative {
            return Ok(variant);
        }
    }

    // Remainder absorption when percentages sum below 100.
    Ok(&variants[variants.len() - 1])
}

fn bucket_for(user_id: Uuid, experiment_id: Uuid) -> u64 {
    let digest = Sha256::digest(format!("{user_id}:{experiment_id}").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % BUCKET_SPACE
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn variant(name: &str, traffic_pct: u32) -> Variant {
        Variant {
            name: name.to_string(),
            traffic_pct,
            algorithm_config: json!({}),
        }
    }

    #[test]
    fn assignment_is_deterministic() {
        let variants = vec![variant("control", 50), variant("treatment", 50)];
        let user_id = Uuid::new_v4();
        let experiment_id = Uuid::new_v4();

        let first = assign_variant(user_id, experiment_id, &variants).unwrap();
        for _ in 0..100 {
            let again = assign_variant(user_id, experiment_id, &variants).unwrap();
            assert_eq!(first.name, again.name);
        }
    }

    #[test]
    fn assignment_only_returns_declared_variants() {
        let variants = vec![variant("A", 40), variant("B", 35), variant("C", 25)];
        let experiment_id = Uuid::new_v4();
        for i in 0..1_000u128 {
            let assigned = assign_variant(Uuid::from_u128(i), experiment_id, &variants).unwrap();
            assert!(["A", "B", "C"].contains(&assigned.name.as_str()));
        }
    }

    #[test]
    fn distribution_converges_to_traffic_split() {
        let variants = vec![variant("A", 30), variant("B", 70)];
        let experiment_id = Uuid::from_u128(42);

        let samples = 100_000u128;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for i in 0..samples {
            let assigned = assign_variant(Uuid::from_u128(i), experiment_id, &variants).unwrap();
            *counts.entry(assigned.name.clone()).or_insert(0) += 1;
        }

        let a_share = *counts.get("A").unwrap_or(&0) as f64 / samples as f64;
        let b_share = *counts.get("B").unwrap_or(&0) as f64 / samples as f64;
        assert!((a_share - 0.30).abs() < 0.02, "A share: {a_share}");
        assert!((b_share - 0.70).abs() < 0.02, "B share: {b_share}");
    }

    #[test]
    fn last_variant_absorbs_remainder() {
        // Sums to 90; buckets 9000..9999 must still land somewhere.
        let variants = vec![variant("A", 45), variant("B", 45)];
        let experiment_id = Uuid::new_v4();
        for i in 0..10_000u128 {
            let assigned = assign_variant(Uuid::from_u128(i), experiment_id, &variants).unwrap();
            assert!(["A", "B"].contains(&assigned.name.as_str()));
        }
    }

    #[test]
    fn empty_variant_list_is_an_error() {
        let result = assign_variant(Uuid::new_v4(), Uuid::new_v4(), &[]);
        assert!(result.is_err());
    }

    #[test]
    fn full_allocation_takes_whole_bucket_space() {
        let variants = vec![variant("only", 100)];
        for i in 0..1_000u128 {
            let assigned = assign_variant(Uuid::from_u128(i), Uuid::from_u128(7), &variants).unwrap();
            assert_eq!(assigned.name, "only");
        }
    }
}
