//! Feature-count sweep: the one-level view of selection bias.
//!
//! One stratified train/test split is drawn. For each candidate count `k` the
//! top-`k` pipeline is fitted twice:
//!
//! - on the training part, and scored on the training part (`train`) and the
//!   held-out part (`test`);
//! - on the whole dataset, and scored on the whole dataset (`resubstitution`)
//!   and on an independent external cohort when one is supplied (`external`).
//!
//! Training AUC keeps rising with `k` while held-out AUC peaks and falls off
//! as noise columns enter the model. No cross-validation happens here.

use crate::cohort::data::Dataset;
use crate::evaluate::folds::train_test_split;
use crate::evaluate::pipeline::{Param, PipelineSpec};
use crate::evaluate::report::{ScoreRecord, ScoreTable};
use crate::evaluate::search::EvaluationError;
use crate::seeding::rng_from_seed;
use serde::{Deserialize, Serialize};

pub const TRAIN: &str = "train";
pub const TEST: &str = "test";
pub const RESUBSTITUTION: &str = "resubstitution";
pub const EXTERNAL: &str = "external";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Strictly ascending feature counts.
    pub feature_counts: Vec<usize>,
    pub test_fraction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            feature_counts: vec![1, 2, 4, 8, 16, 32],
            test_fraction: 0.3,
            seed: Some(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub k: usize,
    pub train: f64,
    pub test: f64,
    pub resubstitution: f64,
    pub external: Option<f64>,
    /// Names of the features the full-data fit kept, in column order.
    pub selected_features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCountSweep {
    pub points: Vec<SweepPoint>,
    pub n_train: usize,
    pub n_test: usize,
}

impl FeatureCountSweep {
    /// The point with the highest held-out AUC; the first one on ties.
    pub fn best_test_point(&self) -> Option<&SweepPoint> {
        self.points
            .iter()
            .fold(None, |best: Option<&SweepPoint>, point| match best {
                Some(b) if b.test >= point.test => Some(b),
                _ => Some(point),
            })
    }

    pub fn to_score_table(&self) -> ScoreTable {
        let mut table = ScoreTable::new();
        for point in &self.points {
            let k = Some(point.k as f64);
            table.push(ScoreRecord::auc(0, TRAIN, k, point.train));
            table.push(ScoreRecord::auc(0, TEST, k, point.test));
            table.push(ScoreRecord::auc(0, RESUBSTITUTION, k, point.resubstitution));
            if let Some(external) = point.external {
                table.push(ScoreRecord::auc(0, EXTERNAL, k, external));
            }
        }
        table
    }
}

fn validate_sweep(
    data: &Dataset,
    external: Option<&Dataset>,
    spec: &PipelineSpec,
    config: &SweepConfig,
) -> Result<(), EvaluationError> {
    if config.feature_counts.is_empty() {
        return Err(EvaluationError::InvalidSearchSpace(
            "the feature-count sequence is empty".to_string(),
        ));
    }
    if config.feature_counts.windows(2).any(|w| w[0] >= w[1]) {
        return Err(EvaluationError::InvalidSearchSpace(format!(
            "feature counts must be strictly ascending, got {:?}",
            config.feature_counts
        )));
    }
    for &k in &config.feature_counts {
        spec.with_param(Param::FeatureCount(k))
            .validate(data.n_features())?;
    }

    if let Some(external) = external {
        if external.n_features() != data.n_features() {
            return Err(EvaluationError::DimensionMismatch {
                context: "external cohort features vs. development features",
                expected: data.n_features(),
                found: external.n_features(),
            });
        }
        if let Some((dev, ext)) = data
            .feature_names()
            .iter()
            .zip(external.feature_names())
            .find(|(a, b)| a != b)
        {
            return Err(EvaluationError::InvalidConfiguration(format!(
                "external cohort column '{}' does not match development column '{}'",
                ext, dev
            )));
        }
    }
    Ok(())
}

/// Sweeps `config.feature_counts` over one train/test split of `data`.
pub fn feature_count_sweep(
    data: &Dataset,
    external: Option<&Dataset>,
    spec: &PipelineSpec,
    config: &SweepConfig,
) -> Result<FeatureCountSweep, EvaluationError> {
    validate_sweep(data, external, spec, config)?;

    let mut rng = rng_from_seed(config.seed);
    let split = train_test_split(data.labels(), config.test_fraction, &mut rng)?;
    let train = data.subset(&split.train)?;
    let test = data.subset(&split.test)?;
    log::info!(
        "Feature-count sweep over {:?}: {} training rows, {} test rows{}",
        config.feature_counts,
        train.n_samples(),
        test.n_samples(),
        if external.is_some() { ", with external cohort" } else { "" }
    );

    let mut points = Vec::with_capacity(config.feature_counts.len());
    for &k in &config.feature_counts {
        let spec_k = spec.with_param(Param::FeatureCount(k));

        let split_model = spec_k.fit(&train)?;
        let train_auc = split_model.score(&train)?;
        let test_auc = split_model.score(&test)?;

        let full_model = spec_k.fit(data)?;
        let resubstitution = full_model.score(data)?;
        let external_auc = match external {
            Some(cohort) => Some(full_model.score(cohort)?),
            None => None,
        };
        let selected_features = full_model
            .selected_features()
            .unwrap_or_default()
            .iter()
            .map(|&j| data.feature_names()[j].clone())
            .collect();

        log::debug!(
            "k={}: train {:.4}, test {:.4}, resubstitution {:.4}, external {:?}",
            k,
            train_auc,
            test_auc,
            resubstitution,
            external_auc
        );
        points.push(SweepPoint {
            k,
            train: train_auc,
            test: test_auc,
            resubstitution,
            external: external_auc,
            selected_features,
        });
    }

    Ok(FeatureCountSweep {
        points,
        n_train: train.n_samples(),
        n_test: test.n_samples(),
    })
}
