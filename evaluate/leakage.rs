//! Cross-validation after whole-dataset feature selection.
//!
//! The top-`k` features are ranked on *every* row, then a model restricted to
//! those columns is cross-validated. Each held-out fold helped choose the
//! columns it is scored on, so the estimate leaks. For comparison the same
//! folds also score the pipeline that ranks features inside each training part.

use crate::cohort::data::Dataset;
use crate::evaluate::folds::{FoldStrategy, k_fold};
use crate::evaluate::pipeline::{Param, PipelineSpec};
use crate::evaluate::report::{ScoreRecord, ScoreTable};
use crate::evaluate::search::{EvaluationError, cross_val_scores};
use crate::evaluate::selection::FeatureRanking;
use rand::Rng;

pub const PRESELECTED: &str = "preselected";
pub const IN_FOLD: &str = "in_fold";

#[derive(Debug, Clone, PartialEq)]
pub struct PreselectionComparison {
    pub k: usize,
    /// Columns ranked top-`k` on the whole dataset, ascending.
    pub selected: Vec<usize>,
    /// Fold AUCs of the model on the preselected columns.
    pub preselected: Vec<f64>,
    /// Fold AUCs of the pipeline that selects inside each training part.
    pub in_fold: Vec<f64>,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

impl PreselectionComparison {
    pub fn preselected_score(&self) -> f64 {
        mean(&self.preselected)
    }

    pub fn in_fold_score(&self) -> f64 {
        mean(&self.in_fold)
    }

    /// Fold-level records; `run` is the fold index and `config` is `k`.
    pub fn to_score_table(&self) -> ScoreTable {
        let mut table = ScoreTable::new();
        let k = Some(self.k as f64);
        for (fold, (&a, &b)) in self.preselected.iter().zip(&self.in_fold).enumerate() {
            table.push(ScoreRecord::auc(fold, PRESELECTED, k, a));
            table.push(ScoreRecord::auc(fold, IN_FOLD, k, b));
        }
        table
    }
}

/// Ranks features on all of `data`, keeps the top `k`, and cross-validates
/// `spec` on those columns over `n_folds` folds drawn from `rng`. The in-fold
/// pipeline `spec` with `select_k = k` is scored on the same folds.
pub fn cross_val_with_preselection<R: Rng + ?Sized>(
    data: &Dataset,
    spec: &PipelineSpec,
    k: usize,
    n_folds: usize,
    strategy: FoldStrategy,
    rng: &mut R,
) -> Result<PreselectionComparison, EvaluationError> {
    let in_fold_spec = spec.with_param(Param::FeatureCount(k));
    in_fold_spec.validate(data.n_features())?;

    let selected = FeatureRanking::fit(data.features(), data.labels())?.top_k(k)?;
    let reduced = data.select_features(&selected)?;
    let fixed_spec = PipelineSpec {
        select_k: None,
        ..spec.clone()
    };

    let folds = k_fold(data.labels(), n_folds, strategy, rng)?;
    let preselected = cross_val_scores(&reduced, &fixed_spec, &folds)?;
    let in_fold = cross_val_scores(data, &in_fold_spec, &folds)?;

    let comparison = PreselectionComparison {
        k,
        selected,
        preselected,
        in_fold,
    };
    log::info!(
        "k={}: CV AUC {:.4} with whole-dataset selection, {:.4} with in-fold selection over {} folds",
        k,
        comparison.preselected_score(),
        comparison.in_fold_score(),
        folds.len()
    );
    Ok(comparison)
}
