//! Deterministic seed derivation for replications.

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// "REPLICAT" (tag)
const DOMAIN_REPLICATION: u64 = 0x5245_504C_4943_4154;

/// Seed for replication `run` of a trial started from `base`.
///
/// Distinct runs get well-separated seeds, and the same `(base, run)` pair
/// always yields the same seed.
pub fn replication_seed(base: u64, run: u64) -> u64 {
    splitmix64(base ^ DOMAIN_REPLICATION ^ splitmix64(run))
}
