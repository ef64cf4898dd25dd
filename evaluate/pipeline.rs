//! The model pipeline evaluated by every protocol:
//!
//! optional ANOVA-F top-k selection → standardization → penalized logistic regression.
//!
//! Every stage is fitted on the training rows it is given and only applied to
//! held-out rows, so running the whole pipeline inside a fold keeps feature
//! selection from seeing the fold's test rows.

use crate::cohort::data::Dataset;
use crate::cohort::scaler::StandardScaler;
use crate::evaluate::logistic::{LogisticConfig, LogisticRegression};
use crate::evaluate::metrics::roc_auc;
use crate::evaluate::search::EvaluationError;
use crate::evaluate::selection::FeatureRanking;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One point of a search space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    /// Number of top-ranked features to keep.
    FeatureCount(usize),
    /// Inverse regularization strength `C` of the logistic regression.
    Regularization(f64),
}

impl Param {
    /// The configuration value as reported in score tables.
    pub fn value(&self) -> f64 {
        match *self {
            Param::FeatureCount(k) => k as f64,
            Param::Regularization(c) => c,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::FeatureCount(k) => write!(f, "k={}", k),
            Param::Regularization(c) => write!(f, "C={}", c),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSpec {
    /// Keep only the `k` features with the largest F statistic. `None` keeps all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select_k: Option<usize>,
    pub standardize: bool,
    pub logistic: LogisticConfig,
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self {
            select_k: None,
            standardize: true,
            logistic: LogisticConfig::default(),
        }
    }
}

impl PipelineSpec {
    /// A copy of this spec with `param` substituted.
    pub fn with_param(&self, param: Param) -> PipelineSpec {
        let mut spec = self.clone();
        match param {
            Param::FeatureCount(k) => spec.select_k = Some(k),
            Param::Regularization(c) => spec.logistic.c = c,
        }
        spec
    }

    /// Checks the spec against a dataset with `n_features` columns.
    pub fn validate(&self, n_features: usize) -> Result<(), EvaluationError> {
        if let Some(k) = self.select_k {
            if k == 0 || k > n_features {
                return Err(EvaluationError::InvalidSearchSpace(format!(
                    "feature count {} is outside 1..={}",
                    k, n_features
                )));
            }
        }
        let c = self.logistic.c;
        if !(c.is_finite() && c > 0.0) {
            return Err(EvaluationError::InvalidSearchSpace(format!(
                "regularization strength C must be finite and positive, got {}",
                c
            )));
        }
        Ok(())
    }

    pub fn fit(&self, data: &Dataset) -> Result<FittedPipeline, EvaluationError> {
        self.validate(data.n_features())?;
        let (negatives, positives) = data.class_counts();
        if negatives == 0 || positives == 0 {
            return Err(EvaluationError::InsufficientSamples {
                context: "pipeline training data",
                negatives,
                positives,
            });
        }

        let selected = match self.select_k {
            Some(k) => {
                let ranking = FeatureRanking::fit(data.features(), data.labels())?;
                Some(ranking.top_k(k)?)
            }
            None => None,
        };

        let x = project(data.features(), selected.as_deref());
        let (scaler, x) = if self.standardize {
            let (scaler, z) = StandardScaler::fit_transform(x.view());
            (Some(scaler), z)
        } else {
            (None, x)
        };

        let model = LogisticRegression::fit(x.view(), data.labels(), &self.logistic)?;
        Ok(FittedPipeline {
            n_input_features: data.n_features(),
            selected,
            scaler,
            model,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FittedPipeline {
    n_input_features: usize,
    selected: Option<Vec<usize>>,
    scaler: Option<StandardScaler>,
    model: LogisticRegression,
}

impl FittedPipeline {
    /// Column indices kept by the selection stage, if there is one.
    pub fn selected_features(&self) -> Option<&[usize]> {
        self.selected.as_deref()
    }

    pub fn model(&self) -> &LogisticRegression {
        &self.model
    }

    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EvaluationError> {
        if x.ncols() != self.n_input_features {
            return Err(EvaluationError::DimensionMismatch {
                context: "prediction columns vs. training columns",
                expected: self.n_input_features,
                found: x.ncols(),
            });
        }
        let x = project(x, self.selected.as_deref());
        let x = match &self.scaler {
            Some(scaler) => scaler.transform(x.view()),
            None => x,
        };
        self.model.predict_proba(x.view())
    }

    /// ROC-AUC of the predicted probabilities on `data`.
    pub fn score(&self, data: &Dataset) -> Result<f64, EvaluationError> {
        let proba = self.predict_proba(data.features())?;
        roc_auc(data.labels(), proba.view())
    }
}

fn project(x: ArrayView2<f64>, columns: Option<&[usize]>) -> Array2<f64> {
    match columns {
        Some(columns) => x.select(Axis(1), columns),
        None => x.to_owned(),
    }
}
