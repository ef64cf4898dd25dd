use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Column-wise standardization to zero mean and unit (population) variance.
///
/// The fitted statistics are kept so the same transform can be applied to data
/// the scaler never saw, which is what keeps held-out folds honest. Columns with
/// zero variance are centred but not rescaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Estimates per-column mean and standard deviation. An empty matrix yields
    /// zero means and unit scales.
    pub fn fit(x: ArrayView2<f64>) -> Self {
        let p = x.ncols();
        if x.nrows() == 0 {
            return Self {
                mean: Array1::zeros(p),
                scale: Array1::ones(p),
            };
        }
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(p));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|sd| if sd > 0.0 && sd.is_finite() { sd } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }

    pub fn fit_transform(x: ArrayView2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(x);
        let transformed = scaler.transform(x);
        (scaler, transformed)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}
