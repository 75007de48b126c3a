use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wavelet::context::Context;

/// Generates `n` random bytes, reproducibly per seed.
pub fn random_text(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen()).collect()
}

/// Generates `n` random symbols drawn from the given alphabet.
pub fn random_text_over(n: usize, alphabet: &[u8], seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

/// Generates `n` random 16-bit symbols over an alphabet of `distinct`
/// random values scattered across the whole range.
pub fn random_wide_text(n: usize, distinct: usize, seed: u64) -> Vec<u16> {
    let mut rng = StdRng::seed_from_u64(seed);
    let alphabet: Vec<u16> = (0..distinct).map(|_| rng.gen()).collect();
    (0..n)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

/// Repeats `pattern` up to `n` symbols.
pub fn periodic_text(pattern: &[u8], n: usize) -> Vec<u8> {
    pattern.iter().copied().cycle().take(n).collect()
}

/// Writes `text` to a path every worker can read. The contents are in
/// place on return.
pub fn shared_input(ctx: &Context, name: &str, text: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("wavelet_ptest_{}.bin", name));
    if ctx.is_master() {
        std::fs::write(&path, text).unwrap();
    }
    ctx.synchronize();
    path
}
