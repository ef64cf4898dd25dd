use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Builds the generator used for one unit of work. A fixed seed gives a
/// reproducible stream; `None` draws fresh entropy from the operating system.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Resolves the base seed for a batch of repetitions. When the caller did not
/// fix one, a single value is drawn from entropy so that every repetition in
/// the batch still derives its own, independent stream from it.
pub fn resolve_base_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(seed) => seed,
        None => StdRng::from_entropy().r#gen::<u64>(),
    }
}

/// Seed for repetition `index` of a batch started at `base`.
pub fn repetition_seed(base: u64, index: usize) -> u64 {
    base.wrapping_add(index as u64)
}
