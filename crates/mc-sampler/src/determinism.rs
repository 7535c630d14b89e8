use mc_core::derive_substream_seed;

/// Derives the deterministic seed used by worker `rank` of a multi-worker run.
pub fn worker_seed(master_seed: u64, rank: usize) -> u64 {
    derive_substream_seed(master_seed, rank as u64)
}
