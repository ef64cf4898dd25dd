//! Pure-noise feature columns.
//!
//! Appending columns that are unrelated to the label by construction is how the
//! feature-selection experiments probe false-positive selection: every noise
//! column a selector keeps is a column it should not have kept.

use crate::cohort::data::{DataError, Dataset};
use crate::cohort::scaler::StandardScaler;
use ndarray::Array2;
use rand::Rng;
use rand_distr::StandardNormal;
use std::collections::HashSet;

pub const NOISE_PREFIX: &str = "noise_";

/// Generates `k` names `noise_0 … noise_{k-1}`, suffixing any that would
/// collide with `existing` until they are distinct.
pub fn noise_feature_names(existing: &[String], k: usize) -> Vec<String> {
    let mut taken: HashSet<String> = existing.iter().cloned().collect();
    let mut names = Vec::with_capacity(k);
    for i in 0..k {
        let mut name = format!("{}{}", NOISE_PREFIX, i);
        while taken.contains(&name) {
            name.push('_');
        }
        taken.insert(name.clone());
        names.push(name);
    }
    names
}

/// An `n × k` block of standard-normal draws, each column standardized by a
/// scaler fit on the block itself.
pub fn standardized_noise<R: Rng + ?Sized>(n: usize, k: usize, rng: &mut R) -> Array2<f64> {
    let raw: Array2<f64> = Array2::from_shape_simple_fn((n, k), || rng.sample(StandardNormal));
    let (_, standardized) = StandardScaler::fit_transform(raw.view());
    standardized
}

/// Returns a copy of `dataset` with `k` standardized noise columns appended.
pub fn append_noise_features<R: Rng + ?Sized>(
    dataset: &Dataset,
    k: usize,
    rng: &mut R,
) -> Result<Dataset, DataError> {
    if k == 0 {
        return Ok(dataset.clone());
    }
    let names = noise_feature_names(dataset.feature_names(), k);
    let noise = standardized_noise(dataset.n_samples(), k, rng);
    log::debug!(
        "Appending {} noise features to a dataset with {} features",
        k,
        dataset.n_features()
    );
    dataset.with_appended_columns(names, noise.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Axis, array};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn names_are_distinct_from_existing_columns() {
        let existing = vec!["age".to_string(), "noise_1".to_string()];
        let names = noise_feature_names(&existing, 3);
        assert_eq!(names, vec!["noise_0", "noise_1_", "noise_2"]);
    }

    #[test]
    fn noise_columns_are_standardized() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = standardized_noise(200, 4, &mut rng);
        assert_eq!(noise.shape(), &[200, 4]);
        for column in noise.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-10);
            assert_abs_diff_eq!(column.std(0.0), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn append_keeps_labels_and_original_columns() {
        let data = Dataset::new(
            vec!["bmi".into()],
            array![[20.0], [25.0], [30.0]],
            array![0.0, 1.0, 1.0],
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let noisy = append_noise_features(&data, 2, &mut rng).unwrap();
        assert_eq!(noisy.n_features(), 3);
        assert_eq!(noisy.labels(), data.labels());
        assert_eq!(noisy.features().column(0), data.features().column(0));
        assert_eq!(&noisy.feature_names()[1..], &["noise_0".to_string(), "noise_1".to_string()]);

        let unchanged = append_noise_features(&data, 0, &mut rng).unwrap();
        assert_eq!(unchanged, data);
    }
}
