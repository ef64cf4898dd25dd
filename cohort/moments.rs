//! First and second moments of a joint feature+target sample, and the
//! sampling factor that turns standard-normal draws into draws from the
//! matching multivariate normal.

use crate::cohort::synth::CohortError;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_linalg::{Eigh, UPLO};

/// Relative tolerance below which a variance (or eigenvalue) is treated as zero.
const DEGENERACY_TOLERANCE: f64 = 1e-10;

/// Empirical mean vector and sample covariance (denominator `n - 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct JointMoments {
    pub mean: Array1<f64>,
    pub covariance: Array2<f64>,
}

impl JointMoments {
    /// Estimates moments over the rows of `x`. Requires at least two rows.
    pub fn from_samples(x: ArrayView2<f64>) -> Result<Self, CohortError> {
        let n = x.nrows();
        if n < 2 {
            return Err(CohortError::TooFewSamples {
                found: n,
                required: 2,
            });
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or(CohortError::TooFewSamples {
                found: n,
                required: 2,
            })?;
        let centered = &x - &mean;
        let mut covariance = centered.t().dot(&centered) / (n as f64 - 1.0);

        // Symmetrize to remove round-off asymmetry from the product.
        let transposed = covariance.t().to_owned();
        covariance = (&covariance + &transposed) * 0.5;

        Ok(Self { mean, covariance })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Returns the indices of columns whose variance is zero relative to the
    /// column's magnitude. Such columns make the covariance singular.
    pub fn zero_variance_columns(&self) -> Vec<usize> {
        (0..self.dim())
            .filter(|&j| {
                let variance = self.covariance[[j, j]];
                let magnitude = self.mean[j] * self.mean[j];
                !variance.is_finite() || variance <= DEGENERACY_TOLERANCE * magnitude.max(1.0)
            })
            .collect()
    }

    /// Computes `A` with `A Aᵀ = Σ` from the symmetric eigendecomposition
    /// `Σ = V Λ Vᵀ`, taking `A = V Λ^{1/2}`.
    ///
    /// Eigenvalues that are negative only through round-off are clipped to zero;
    /// anything more negative than `DEGENERACY_TOLERANCE · max|λ|` means the
    /// matrix is not positive semi-definite and sampling cannot proceed.
    pub fn sampling_factor(&self) -> Result<Array2<f64>, CohortError> {
        if self.covariance.iter().any(|v| !v.is_finite()) {
            return Err(CohortError::DegenerateCovariance(
                "covariance contains non-finite entries".to_string(),
            ));
        }

        let (eigenvalues, eigenvectors) = self
            .covariance
            .eigh(UPLO::Lower)
            .map_err(|e| CohortError::DegenerateCovariance(format!("eigendecomposition failed: {e}")))?;

        let max_abs = eigenvalues.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
        let min_eig = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
        log::debug!(
            "Joint covariance spectrum: min eigenvalue {:.3e}, max |eigenvalue| {:.3e}",
            min_eig,
            max_abs
        );
        if min_eig < -DEGENERACY_TOLERANCE * max_abs {
            return Err(CohortError::DegenerateCovariance(format!(
                "covariance is not positive semi-definite (smallest eigenvalue {:.3e})",
                min_eig
            )));
        }

        let roots = eigenvalues.mapv(|v| v.max(0.0).sqrt());
        Ok(&eigenvectors * &roots.view().insert_axis(Axis(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn moments_match_hand_computed_values() {
        let x = array![[1.0, 2.0], [3.0, 6.0], [5.0, 10.0], [7.0, 2.0]];
        let m = JointMoments::from_samples(x.view()).unwrap();
        assert_abs_diff_eq!(m.mean[0], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.mean[1], 5.0, epsilon = 1e-12);
        // var(x0) = (9 + 1 + 1 + 9) / 3
        assert_abs_diff_eq!(m.covariance[[0, 0]], 20.0 / 3.0, epsilon = 1e-12);
        // cov = ((-3)(-3) + (-1)(1) + (1)(5) + (3)(-3)) / 3 = 4 / 3
        assert_abs_diff_eq!(m.covariance[[0, 1]], 4.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.covariance[[1, 0]], m.covariance[[0, 1]]);
    }

    #[test]
    fn sampling_factor_reconstructs_covariance() {
        let x = array![
            [1.0, 2.0, 0.5],
            [2.0, 1.0, 1.5],
            [3.0, 4.0, 0.0],
            [4.0, 3.0, 2.5],
            [0.5, 0.0, 1.0]
        ];
        let m = JointMoments::from_samples(x.view()).unwrap();
        let a = m.sampling_factor().unwrap();
        let rebuilt = a.dot(&a.t());
        for (r, c) in rebuilt.iter().zip(m.covariance.iter()) {
            assert_abs_diff_eq!(*r, *c, epsilon = 1e-9);
        }
    }

    #[test]
    fn constant_column_is_flagged() {
        let x = array![[0.1, 1.0], [0.1, 2.0], [0.1, 4.0]];
        let m = JointMoments::from_samples(x.view()).unwrap();
        assert_eq!(m.zero_variance_columns(), vec![0]);
    }

    #[test]
    fn indefinite_matrix_is_rejected() {
        let m = JointMoments {
            mean: array![0.0, 0.0],
            covariance: array![[1.0, 2.0], [2.0, 1.0]],
        };
        match m.sampling_factor() {
            Err(CohortError::DegenerateCovariance(_)) => {}
            other => panic!("Expected DegenerateCovariance, got {:?}", other),
        }
    }

    #[test]
    fn single_row_is_too_few() {
        let x = array![[1.0, 2.0]];
        assert!(matches!(
            JointMoments::from_samples(x.view()),
            Err(CohortError::TooFewSamples { found: 1, required: 2 })
        ));
    }
}
