#![allow(dead_code)]

use hindsight::cohort::data::{Cohort, Dataset};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

pub const FEATURE_NAMES: [&str; 10] = [
    "age", "sex", "bmi", "bp", "s1", "s2", "s3", "s4", "s5", "s6",
];

const MEANS: [f64; 10] = [48.5, 1.5, 26.4, 94.6, 189.1, 115.4, 49.8, 4.1, 4.6, 91.3];
const SCALES: [f64; 10] = [13.1, 0.5, 4.4, 13.8, 34.6, 30.4, 12.9, 1.3, 0.5, 11.5];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Ten correlated clinical-looking features and a progression-style target
/// `152 + 40·u0 + 30·u2 + 20·u3 + target_noise·e`, where `u` are the
/// unscaled latent features.
pub fn diabetes_like_cohort(n: usize, target_noise: f64, seed: u64) -> Cohort {
    let mut rng = StdRng::seed_from_u64(seed);
    let z: Array2<f64> = Array2::from_shape_simple_fn((n, 10), || rng.sample(StandardNormal));

    // Neighbouring columns share half of their latent draw.
    let mut latent = z.clone();
    for j in 1..10 {
        let previous = z.column(j - 1).to_owned();
        latent.column_mut(j).scaled_add(0.5, &previous);
    }

    let mut features = latent.clone();
    for j in 0..10 {
        features
            .column_mut(j)
            .mapv_inplace(|u| MEANS[j] + SCALES[j] * u);
    }

    let target = Array1::from_shape_fn(n, |i| {
        let e: f64 = rng.sample(StandardNormal);
        152.0 + 40.0 * latent[[i, 0]] + 30.0 * latent[[i, 2]] + 20.0 * latent[[i, 3]]
            + target_noise * e
    });

    let names = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
    Cohort::new(names, features, target).unwrap()
}

/// Features with no relation to the balanced, randomly ordered labels.
pub fn pure_noise_dataset(n: usize, p: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: Array2<f64> = Array2::from_shape_simple_fn((n, p), || rng.sample(StandardNormal));
    let mut labels: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
    rand::seq::SliceRandom::shuffle(labels.as_mut_slice(), &mut rng);
    let names = (0..p).map(|j| format!("x{}", j)).collect();
    Dataset::new(names, x, Array1::from(labels)).unwrap()
}

/// Pearson correlation of two equally long columns.
pub fn pearson(a: ndarray::ArrayView1<f64>, b: ndarray::ArrayView1<f64>) -> f64 {
    let ma = a.mean().unwrap();
    let mb = b.mean().unwrap();
    let da = a.mapv(|v| v - ma);
    let db = b.mapv(|v| v - mb);
    da.dot(&db) / (da.dot(&da).sqrt() * db.dot(&db).sqrt())
}
