//! Univariate feature ranking by the one-way ANOVA F statistic.
//!
//! For a binary label the F statistic of a feature compares the spread of
//! the two class means against the pooled within-class variance:
//!
//! `F = (SS_between / (k - 1)) / (SS_within / (n - k))` with `k = 2`.
//!
//! Features are ranked by descending F; equal statistics keep column order,
//! so ranking is deterministic.

use crate::evaluate::search::EvaluationError;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// Per-feature F statistics and the resulting ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRanking {
    pub f_statistics: Array1<f64>,
    /// Column indices from most to least discriminative.
    pub order: Vec<usize>,
}

impl FeatureRanking {
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Self, EvaluationError> {
        let f_statistics = anova_f_statistics(x, y)?;
        let mut order: Vec<usize> = (0..f_statistics.len()).collect();
        // Stable sort keeps lower column indices first among ties.
        order.sort_by(|&a, &b| rank_key(f_statistics[b]).total_cmp(&rank_key(f_statistics[a])));
        Ok(Self {
            f_statistics,
            order,
        })
    }

    pub fn n_features(&self) -> usize {
        self.order.len()
    }

    /// Column indices of the `k` best features, in ascending column order.
    ///
    /// `k` larger than the number of features is rejected rather than clamped,
    /// as is `k == 0`.
    pub fn top_k(&self, k: usize) -> Result<Vec<usize>, EvaluationError> {
        if k == 0 || k > self.n_features() {
            return Err(EvaluationError::InvalidSearchSpace(format!(
                "cannot select {} of {} features",
                k,
                self.n_features()
            )));
        }
        let mut selected = self.order[..k].to_vec();
        selected.sort_unstable();
        Ok(selected)
    }
}

/// NaN statistics (constant features within both classes) rank last.
fn rank_key(f: f64) -> f64 {
    if f.is_nan() { f64::NEG_INFINITY } else { f }
}

/// One F statistic per column of `x` for the binary grouping `y`.
pub fn anova_f_statistics(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Result<Array1<f64>, EvaluationError> {
    if x.nrows() != y.len() {
        return Err(EvaluationError::DimensionMismatch {
            context: "feature rows vs. labels",
            expected: x.nrows(),
            found: y.len(),
        });
    }
    let positives: Vec<usize> = (0..y.len()).filter(|&i| y[i] > 0.5).collect();
    let negatives: Vec<usize> = (0..y.len()).filter(|&i| y[i] <= 0.5).collect();
    if positives.is_empty() || negatives.is_empty() {
        return Err(EvaluationError::InsufficientSamples {
            context: "ANOVA F statistic",
            negatives: negatives.len(),
            positives: positives.len(),
        });
    }

    let n = y.len() as f64;
    let n_pos = positives.len() as f64;
    let n_neg = negatives.len() as f64;
    let df_within = n - 2.0;

    let x_pos = x.select(Axis(0), &positives);
    let x_neg = x.select(Axis(0), &negatives);

    let stats = x
        .axis_iter(Axis(1))
        .zip(x_pos.axis_iter(Axis(1)).zip(x_neg.axis_iter(Axis(1))))
        .map(|(all, (pos, neg))| {
            let grand_mean = all.sum() / n;
            let mean_pos = pos.sum() / n_pos;
            let mean_neg = neg.sum() / n_neg;
            let ss_between = n_pos * (mean_pos - grand_mean).powi(2)
                + n_neg * (mean_neg - grand_mean).powi(2);
            let ss_within = pos.iter().map(|v| (v - mean_pos).powi(2)).sum::<f64>()
                + neg.iter().map(|v| (v - mean_neg).powi(2)).sum::<f64>();
            if df_within <= 0.0 {
                return f64::NAN;
            }
            if ss_within <= 0.0 {
                return if ss_between > 0.0 { f64::INFINITY } else { f64::NAN };
            }
            ss_between / (ss_within / df_within)
        })
        .collect();

    Ok(Array1::from_vec(stats))
}
