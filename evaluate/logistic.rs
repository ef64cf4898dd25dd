//! L2-penalized logistic regression fitted by iteratively reweighted least
//! squares (Newton–Raphson on the penalized log-likelihood).
//!
//! The objective is the usual "inverse regularization strength" form
//!
//! `Σ logloss(yᵢ, σ(b + xᵢᵀw)) + ‖w‖² / (2C)`
//!
//! with the intercept `b` left unpenalized. Each iteration solves
//! `(XᵀWX + P/C) δ = Xᵀ(μ − y) + Pβ/C` and takes a Newton step, halving the
//! step while the penalized objective fails to decrease.

use crate::evaluate::search::EvaluationError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use ndarray_linalg::Solve;
use serde::{Deserialize, Serialize};

const MIN_WEIGHT: f64 = 1e-10;
const PROB_EPS: f64 = 1e-12;
const MAX_STEP_HALVINGS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    /// Inverse regularization strength; smaller values penalize more.
    pub c: f64,
    pub max_iterations: usize,
    /// Convergence threshold on the relative change of the penalized objective.
    pub tolerance: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitStatus {
    Converged,
    MaxIterationsReached,
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub intercept: f64,
    pub coefficients: Array1<f64>,
    pub status: FitStatus,
    pub iterations: usize,
}

impl LogisticRegression {
    pub fn fit(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        config: &LogisticConfig,
    ) -> Result<Self, EvaluationError> {
        if x.nrows() != y.len() {
            return Err(EvaluationError::DimensionMismatch {
                context: "design rows vs. labels",
                expected: x.nrows(),
                found: y.len(),
            });
        }
        if !(config.c.is_finite() && config.c > 0.0) {
            return Err(EvaluationError::InvalidSearchSpace(format!(
                "regularization strength C must be finite and positive, got {}",
                config.c
            )));
        }

        let n = x.nrows();
        let p = x.ncols();
        let design = with_intercept_column(x);
        let lambda = 1.0 / config.c;

        // Penalty diagonal: zero for the intercept, lambda for every slope.
        let mut penalty = Array1::from_elem(p + 1, lambda);
        penalty[0] = 0.0;

        // Start from the log-odds of the base rate.
        let mut beta = Array1::<f64>::zeros(p + 1);
        let base_rate = (y.sum() / n.max(1) as f64).clamp(PROB_EPS, 1.0 - PROB_EPS);
        beta[0] = (base_rate / (1.0 - base_rate)).ln();

        let mut objective = penalized_objective(&design, y, &beta, &penalty);
        let mut status = FitStatus::MaxIterationsReached;
        let mut iterations = 0;

        for iter in 1..=config.max_iterations {
            iterations = iter;
            let eta = design.dot(&beta);
            let mu = eta.mapv(sigmoid);
            let weights = (&mu * &mu.mapv(|m| 1.0 - m)).mapv(|w| w.max(MIN_WEIGHT));

            let gradient = design.t().dot(&(&mu - &y)) + &penalty * &beta;
            let weighted = &design * &weights.view().insert_axis(Axis(1));
            let mut hessian = design.t().dot(&weighted);
            for j in 0..=p {
                hessian[[j, j]] += penalty[j];
            }

            let step = hessian
                .solve_into(gradient)
                .map_err(EvaluationError::LinearSystemSolveFailed)?;

            let mut scale = 1.0;
            let mut candidate = &beta - &step;
            let mut candidate_objective = penalized_objective(&design, y, &candidate, &penalty);
            let mut halvings = 0;
            while !(candidate_objective <= objective) && halvings < MAX_STEP_HALVINGS {
                scale *= 0.5;
                candidate = &beta - &(&step * scale);
                candidate_objective = penalized_objective(&design, y, &candidate, &penalty);
                halvings += 1;
            }
            if !(candidate_objective <= objective) {
                // No descent along the Newton direction: we are at the optimum
                // up to floating-point resolution.
                status = FitStatus::Converged;
                break;
            }

            let change = (objective - candidate_objective).abs() / (objective.abs() + 1e-12);
            beta = candidate;
            objective = candidate_objective;
            if change < config.tolerance {
                status = FitStatus::Converged;
                break;
            }
        }

        if status == FitStatus::MaxIterationsReached {
            log::warn!(
                "Logistic regression reached {} iterations without converging (C = {:.3e}, {} features)",
                config.max_iterations,
                config.c,
                p
            );
        }

        Ok(Self {
            intercept: beta[0],
            coefficients: beta.slice(s![1..]).to_owned(),
            status,
            iterations,
        })
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EvaluationError> {
        if x.ncols() != self.n_features() {
            return Err(EvaluationError::DimensionMismatch {
                context: "prediction columns vs. fitted coefficients",
                expected: self.n_features(),
                found: x.ncols(),
            });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    /// Predicted probability of the positive class.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EvaluationError> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }
}

fn with_intercept_column(x: ArrayView2<f64>) -> Array2<f64> {
    let mut design = Array2::<f64>::ones((x.nrows(), x.ncols() + 1));
    design.slice_mut(s![.., 1..]).assign(&x);
    design
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// Negative log-likelihood plus half the penalty, computed from the linear
/// predictor with `log(1 + e^η)` evaluated stably.
fn penalized_objective(
    design: &Array2<f64>,
    y: ArrayView1<f64>,
    beta: &Array1<f64>,
    penalty: &Array1<f64>,
) -> f64 {
    let eta = design.dot(beta);
    let nll: f64 = eta
        .iter()
        .zip(y.iter())
        .map(|(&e, &yi)| softplus(e) - yi * e)
        .sum();
    let pen: f64 = beta
        .iter()
        .zip(penalty.iter())
        .map(|(&b, &l)| l * b * b)
        .sum();
    nll + 0.5 * pen
}

fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}
