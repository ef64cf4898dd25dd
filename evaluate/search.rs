//! # Grid Search over a Finite Configuration Space
//!
//! Every candidate configuration is scored by k-fold cross-validation on the
//! *same* partition, and the candidate with the highest mean validation ROC-AUC
//! wins. Ties go to the candidate enumerated first: the comparison is a strict
//! `>`, so a later candidate must beat the incumbent to replace it.
//!
//! The best mean validation score returned here is exactly the quantity that is
//! optimistically biased when reported as a performance estimate, because the
//! folds that chose the winner are the folds that scored it.

use crate::cohort::data::{DataError, Dataset};
use crate::evaluate::folds::{Fold, FoldStrategy, k_fold};
use crate::evaluate::pipeline::{FittedPipeline, Param, PipelineSpec};
use rand::Rng;
use thiserror::Error;

/// A comprehensive error type for the evaluation protocols.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(
        "Not enough samples of each class for {context}: found {negatives} negative and {positives} positive. ROC-AUC and model fitting need both classes."
    )]
    InsufficientSamples {
        context: &'static str,
        negatives: usize,
        positives: usize,
    },

    #[error("Invalid search space: {0}")]
    InvalidSearchSpace(String),

    #[error("Dimension mismatch in {context}: expected {expected}, found {found}.")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid evaluation configuration: {0}")]
    InvalidConfiguration(String),

    #[error("A linear system solve failed. The penalized Hessian may be singular. Error: {0}")]
    LinearSystemSolveFailed(ndarray_linalg::error::LinalgError),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Cross-validated score of one candidate configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub param: Param,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSearchResult {
    pub candidates: Vec<CandidateScore>,
    pub best_index: usize,
}

impl GridSearchResult {
    pub fn best(&self) -> &CandidateScore {
        &self.candidates[self.best_index]
    }

    pub fn best_param(&self) -> Param {
        self.best().param
    }

    /// Best mean validation score. Biased upward as an estimate of performance.
    pub fn best_score(&self) -> f64 {
        self.best().mean_score
    }
}

/// Rejects an empty space and any candidate the pipeline could not fit on
/// `n_features` columns.
pub fn validate_search_space(
    spec: &PipelineSpec,
    space: &[Param],
    n_features: usize,
) -> Result<(), EvaluationError> {
    if space.is_empty() {
        return Err(EvaluationError::InvalidSearchSpace(
            "the configuration grid is empty".to_string(),
        ));
    }
    for &param in space {
        spec.with_param(param).validate(n_features)?;
    }
    Ok(())
}

/// Scores `spec` on every fold: fit on the training rows, ROC-AUC on the held-out rows.
pub fn cross_val_scores(
    data: &Dataset,
    spec: &PipelineSpec,
    folds: &[Fold],
) -> Result<Vec<f64>, EvaluationError> {
    folds
        .iter()
        .map(|fold| -> Result<f64, EvaluationError> {
            let train = data.subset(&fold.train)?;
            let test = data.subset(&fold.test)?;
            spec.fit(&train)?.score(&test)
        })
        .collect()
}

/// Grid search with `n_folds`-fold cross-validation on one random partition
/// drawn from `rng`.
pub fn grid_search<R: Rng + ?Sized>(
    data: &Dataset,
    spec: &PipelineSpec,
    space: &[Param],
    n_folds: usize,
    strategy: FoldStrategy,
    rng: &mut R,
) -> Result<GridSearchResult, EvaluationError> {
    validate_search_space(spec, space, data.n_features())?;
    let folds = k_fold(data.labels(), n_folds, strategy, rng)?;
    grid_search_on_folds(data, spec, space, &folds)
}

/// Grid search on a fixed partition.
pub fn grid_search_on_folds(
    data: &Dataset,
    spec: &PipelineSpec,
    space: &[Param],
    folds: &[Fold],
) -> Result<GridSearchResult, EvaluationError> {
    validate_search_space(spec, space, data.n_features())?;

    let mut candidates: Vec<CandidateScore> = Vec::with_capacity(space.len());
    let mut best_index = 0;
    for (index, &param) in space.iter().enumerate() {
        let fold_scores = cross_val_scores(data, &spec.with_param(param), folds)?;
        let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        log::debug!(
            "Grid candidate {}: mean validation AUC {:.4} over {} folds",
            param,
            mean_score,
            folds.len()
        );
        if index > 0 && mean_score > candidates[best_index].mean_score {
            best_index = index;
        }
        candidates.push(CandidateScore {
            param,
            fold_scores,
            mean_score,
        });
    }

    let result = GridSearchResult {
        candidates,
        best_index,
    };
    log::info!(
        "Grid search selected {} (mean validation AUC {:.4}) from {} candidates",
        result.best_param(),
        result.best_score(),
        space.len()
    );
    Ok(result)
}

/// Runs a grid search on `data`, then refits the winning configuration on all of `data`.
pub fn grid_search_refit<R: Rng + ?Sized>(
    data: &Dataset,
    spec: &PipelineSpec,
    space: &[Param],
    n_folds: usize,
    strategy: FoldStrategy,
    rng: &mut R,
) -> Result<(GridSearchResult, FittedPipeline), EvaluationError> {
    let result = grid_search(data, spec, space, n_folds, strategy, rng)?;
    let fitted = spec.with_param(result.best_param()).fit(data)?;
    Ok((result, fitted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::StandardNormal;

    fn dataset(n: usize, p: usize, signal: f64, seed: u64) -> Dataset {
        let mut rng = StdRng::seed_from_u64(seed);
        let x: Array2<f64> = Array2::from_shape_simple_fn((n, p), || rng.sample(StandardNormal));
        let y = Array1::from_shape_fn(n, |i| {
            let noise: f64 = rng.sample(StandardNormal);
            if signal * (x[[i, 0]] + x[[i, 1]]) + noise > 0.0 { 1.0 } else { 0.0 }
        });
        Dataset::new((0..p).map(|j| format!("f{}", j)).collect(), x, y).unwrap()
    }

    #[test]
    fn empty_space_is_rejected() {
        let data = dataset(40, 3, 1.0, 0);
        let mut rng = StdRng::seed_from_u64(0);
        let err = grid_search(
            &data,
            &PipelineSpec::default(),
            &[],
            3,
            FoldStrategy::Stratified,
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidSearchSpace(_)));
    }

    #[test]
    fn oversized_feature_count_is_rejected_before_fitting() {
        let data = dataset(40, 3, 1.0, 0);
        let space = [Param::FeatureCount(1), Param::FeatureCount(4)];
        let err = validate_search_space(&PipelineSpec::default(), &space, data.n_features())
            .unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidSearchSpace(_)));
    }

    #[test]
    fn ties_resolve_to_the_first_candidate() {
        let data = dataset(90, 4, 1.5, 3);
        // Identical candidates produce identical fold scores.
        let space = [
            Param::Regularization(1.0),
            Param::Regularization(1.0),
            Param::Regularization(1.0),
        ];
        let mut rng = StdRng::seed_from_u64(5);
        let result = grid_search(
            &data,
            &PipelineSpec::default(),
            &space,
            3,
            FoldStrategy::Stratified,
            &mut rng,
        )
        .unwrap();
        assert_eq!(result.best_index, 0);
        assert_eq!(result.candidates.len(), 3);
        assert_eq!(result.candidates[0].mean_score, result.candidates[2].mean_score);
    }

    #[test]
    fn informative_feature_counts_beat_a_single_noise_column() {
        let data = dataset(200, 6, 2.0, 9);
        let space = [Param::FeatureCount(2), Param::FeatureCount(6)];
        let mut rng = StdRng::seed_from_u64(1);
        let (result, fitted) = grid_search_refit(
            &data,
            &PipelineSpec::default(),
            &space,
            5,
            FoldStrategy::Stratified,
            &mut rng,
        )
        .unwrap();
        assert!(result.best_score() > 0.8);
        let kept = fitted.selected_features().unwrap().len();
        assert_eq!(kept, match result.best_param() {
            Param::FeatureCount(k) => k,
            Param::Regularization(_) => unreachable!(),
        });
    }
}
