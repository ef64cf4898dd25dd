//! # Nested vs. Non-Nested Cross-Validation
//!
//! For each repetition `i` the comparator produces two scores from the same
//! dataset and search space:
//!
//! - **non-nested**: the best mean validation AUC of a grid search run with
//!   inner-fold CV over the whole dataset. The folds that pick the winner also
//!   score it, so this is optimistic.
//! - **nested**: the grid search itself is treated as the model and
//!   cross-validated over an outer partition. Each outer-training part gets its
//!   own grid search, the winner is refit on it, and it is scored on the
//!   outer-test part that took no part in the choice.
//!
//! Repetition `i` derives every partition it draws from `base_seed + i`. The
//! non-nested folds and the inner folds of every outer training part each get
//! a fresh generator on that seed. The outer partition draws from its own
//! stream, keyed by the same seed mixed with a fixed constant, so the outer
//! split is not a replay of the inner one. Repetitions share nothing and run
//! on the rayon pool; results are collected in repetition order.

use crate::cohort::data::Dataset;
use crate::evaluate::folds::{FoldStrategy, k_fold};
use crate::evaluate::pipeline::{Param, PipelineSpec};
use crate::evaluate::report::{ScoreRecord, ScoreTable, mean_and_std};
use crate::evaluate::search::{EvaluationError, grid_search, grid_search_refit, validate_search_space};
use crate::seeding::{repetition_seed, resolve_base_seed};
use ndarray::Array1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const NON_NESTED: &str = "non_nested";
pub const NESTED: &str = "nested";

const OUTER_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed of the outer partition for a repetition seeded with `seed`.
fn outer_partition_seed(seed: u64) -> u64 {
    seed ^ OUTER_STREAM
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Number of repetitions `R`.
    pub repeats: usize,
    pub inner_folds: usize,
    pub outer_folds: usize,
    pub fold_strategy: FoldStrategy,
    /// Base seed; repetition `i` uses `seed + i`. `None` draws one from entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            repeats: 10,
            inner_folds: 3,
            outer_folds: 5,
            fold_strategy: FoldStrategy::Stratified,
            seed: Some(0),
        }
    }
}

/// What one repetition chose along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct RepetitionDetail {
    pub repetition: usize,
    pub seed: u64,
    /// Winner of the whole-dataset grid search and its mean validation AUC.
    pub non_nested_best: Param,
    pub non_nested_score: f64,
    /// Winner of each outer training part's grid search.
    pub outer_best: Vec<Param>,
    /// AUC of each refit winner on its outer-test part.
    pub outer_scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BiasComparison {
    pub non_nested: Vec<f64>,
    pub nested: Vec<f64>,
    pub details: Vec<RepetitionDetail>,
}

/// Paired summary of a comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasSummary {
    pub repeats: usize,
    pub mean_non_nested: f64,
    pub mean_nested: f64,
    /// Mean of `non_nested[i] - nested[i]`.
    pub mean_difference: f64,
    /// Sample standard deviation of the paired differences.
    pub std_difference: f64,
    /// Paired t statistic. `None` with fewer than two repetitions or zero spread.
    pub t_statistic: Option<f64>,
    /// Repetitions where the non-nested score is strictly higher.
    pub non_nested_wins: usize,
}

impl BiasComparison {
    pub fn repeats(&self) -> usize {
        self.non_nested.len()
    }

    pub fn summary(&self) -> BiasSummary {
        let non_nested = Array1::from(self.non_nested.clone());
        let nested = Array1::from(self.nested.clone());
        let differences = &non_nested - &nested;
        let repeats = differences.len();

        let (mean_non_nested, _) = mean_and_std(non_nested.view()).unwrap_or((f64::NAN, 0.0));
        let (mean_nested, _) = mean_and_std(nested.view()).unwrap_or((f64::NAN, 0.0));
        let mean_difference = differences.mean().unwrap_or(f64::NAN);
        let std_difference = if repeats >= 2 {
            differences.std(1.0)
        } else {
            f64::NAN
        };
        let t_statistic = if repeats >= 2 && std_difference > 0.0 {
            Some(mean_difference / (std_difference / (repeats as f64).sqrt()))
        } else {
            None
        };

        BiasSummary {
            repeats,
            mean_non_nested,
            mean_nested,
            mean_difference,
            std_difference,
            t_statistic,
            non_nested_wins: differences.iter().filter(|&&d| d > 0.0).count(),
        }
    }

    /// One `non_nested` and one `nested` AUC record per repetition.
    pub fn to_score_table(&self) -> ScoreTable {
        let mut table = ScoreTable::new();
        for (run, (&a, &b)) in self.non_nested.iter().zip(&self.nested).enumerate() {
            table.push(ScoreRecord::auc(run, NON_NESTED, None, a));
            table.push(ScoreRecord::auc(run, NESTED, None, b));
        }
        table
    }
}

/// Runs `config.repeats` paired nested and non-nested evaluations of the grid
/// search over `space`.
pub fn compare_nested(
    data: &Dataset,
    spec: &PipelineSpec,
    space: &[Param],
    config: &ComparisonConfig,
) -> Result<BiasComparison, EvaluationError> {
    if config.repeats == 0 {
        return Err(EvaluationError::InvalidConfiguration(
            "the repeat count must be at least 1".to_string(),
        ));
    }
    validate_search_space(spec, space, data.n_features())?;

    let base_seed = resolve_base_seed(config.seed);
    log::info!(
        "Comparing nested and non-nested CV: {} repetitions, {} inner / {} outer folds, {} candidates, base seed {}",
        config.repeats,
        config.inner_folds,
        config.outer_folds,
        space.len(),
        base_seed
    );

    let details: Vec<RepetitionDetail> = (0..config.repeats)
        .into_par_iter()
        .map(|i| run_repetition(data, spec, space, config, i, repetition_seed(base_seed, i)))
        .collect::<Result<_, _>>()?;

    let non_nested: Vec<f64> = details.iter().map(|d| d.non_nested_score).collect();
    let nested: Vec<f64> = details.iter().map(|d| d.nested_score()).collect();
    let comparison = BiasComparison {
        non_nested,
        nested,
        details,
    };

    let summary = comparison.summary();
    log::info!(
        "Mean AUC non-nested {:.4}, nested {:.4} (difference {:.4}, non-nested higher in {}/{} repetitions)",
        summary.mean_non_nested,
        summary.mean_nested,
        summary.mean_difference,
        summary.non_nested_wins,
        summary.repeats
    );
    Ok(comparison)
}

impl RepetitionDetail {
    /// Mean AUC over the outer folds.
    pub fn nested_score(&self) -> f64 {
        self.outer_scores.iter().sum::<f64>() / self.outer_scores.len() as f64
    }
}

fn run_repetition(
    data: &Dataset,
    spec: &PipelineSpec,
    space: &[Param],
    config: &ComparisonConfig,
    repetition: usize,
    seed: u64,
) -> Result<RepetitionDetail, EvaluationError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let non_nested = grid_search(
        data,
        spec,
        space,
        config.inner_folds,
        config.fold_strategy,
        &mut rng,
    )?;

    let mut rng = StdRng::seed_from_u64(outer_partition_seed(seed));
    let outer = k_fold(data.labels(), config.outer_folds, config.fold_strategy, &mut rng)?;
    let mut outer_best = Vec::with_capacity(outer.len());
    let mut outer_scores = Vec::with_capacity(outer.len());
    for fold in &outer {
        let train = data.subset(&fold.train)?;
        let test = data.subset(&fold.test)?;
        let mut inner_rng = StdRng::seed_from_u64(seed);
        let (search, fitted) = grid_search_refit(
            &train,
            spec,
            space,
            config.inner_folds,
            config.fold_strategy,
            &mut inner_rng,
        )?;
        outer_best.push(search.best_param());
        outer_scores.push(fitted.score(&test)?);
    }

    let detail = RepetitionDetail {
        repetition,
        seed,
        non_nested_best: non_nested.best_param(),
        non_nested_score: non_nested.best_score(),
        outer_best,
        outer_scores,
    };
    log::debug!(
        "Repetition {} (seed {}): non-nested {:.4} with {}, nested {:.4}",
        repetition,
        seed,
        detail.non_nested_score,
        detail.non_nested_best,
        detail.nested_score()
    );
    Ok(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn comparison(non_nested: Vec<f64>, nested: Vec<f64>) -> BiasComparison {
        BiasComparison {
            non_nested,
            nested,
            details: Vec::new(),
        }
    }

    #[test]
    fn summary_reports_paired_differences() {
        let summary = comparison(vec![0.7, 0.8, 0.75], vec![0.5, 0.6, 0.65]).summary();
        assert_eq!(summary.repeats, 3);
        assert_abs_diff_eq!(summary.mean_non_nested, 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.mean_nested, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.mean_difference, 0.15, epsilon = 1e-12);
        // Differences 0.2, 0.2, 0.1: sample sd = sqrt(0.01 / 3).
        assert_abs_diff_eq!(summary.std_difference, (0.01f64 / 3.0).sqrt(), epsilon = 1e-12);
        let t = summary.t_statistic.unwrap();
        assert_abs_diff_eq!(t, 0.15 / ((0.01f64 / 3.0).sqrt() / 3f64.sqrt()), epsilon = 1e-9);
        assert_eq!(summary.non_nested_wins, 3);
    }

    #[test]
    fn single_repetition_has_no_t_statistic() {
        let summary = comparison(vec![0.7], vec![0.6]).summary();
        assert!(summary.t_statistic.is_none());
        assert!(summary.std_difference.is_nan());
    }

    #[test]
    fn score_table_interleaves_scenarios() {
        let table = comparison(vec![0.7, 0.8], vec![0.5, 0.6]).to_score_table();
        assert_eq!(table.len(), 4);
        assert_eq!(table.scenario_values(NON_NESTED), vec![0.7, 0.8]);
        assert_eq!(table.scenario_values(NESTED), vec![0.5, 0.6]);
        assert_eq!(table.records()[3].run, 1);
    }

    #[test]
    fn outer_partition_draws_from_its_own_stream() {
        let labels = Array1::from_shape_fn(60, |i| (i % 2) as f64);
        for seed in [0, 1, 17, u64::MAX] {
            assert_ne!(outer_partition_seed(seed), seed);
            let mut inner_rng = StdRng::seed_from_u64(seed);
            let mut outer_rng = StdRng::seed_from_u64(outer_partition_seed(seed));
            let inner = k_fold(labels.view(), 5, FoldStrategy::Stratified, &mut inner_rng).unwrap();
            let outer = k_fold(labels.view(), 5, FoldStrategy::Stratified, &mut outer_rng).unwrap();
            assert_ne!(inner, outer, "seed {}", seed);
        }
    }

    #[test]
    fn repetitions_are_reproducible_from_the_base_seed() {
        let data = Dataset::new(
            vec!["a".into(), "b".into()],
            Array2::from_shape_fn((40, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64 + (i % 2) as f64 * 2.0),
            Array1::from_shape_fn(40, |i| (i % 2) as f64),
        )
        .unwrap();
        let space = [Param::FeatureCount(1), Param::FeatureCount(2)];
        let config = ComparisonConfig {
            repeats: 2,
            seed: Some(3),
            ..ComparisonConfig::default()
        };
        let first = compare_nested(&data, &PipelineSpec::default(), &space, &config).unwrap();
        let second = compare_nested(&data, &PipelineSpec::default(), &space, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.details[1].seed, 4);
    }

    #[test]
    fn zero_repeats_is_rejected() {
        let data = Dataset::new(
            vec!["a".into()],
            ndarray::array![[0.0], [1.0], [2.0], [3.0]],
            ndarray::array![0.0, 1.0, 0.0, 1.0],
        )
        .unwrap();
        let config = ComparisonConfig {
            repeats: 0,
            ..ComparisonConfig::default()
        };
        let err = compare_nested(&data, &PipelineSpec::default(), &[Param::FeatureCount(1)], &config)
            .unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidConfiguration(_)));
    }
}
