//! # Synthetic Cohort Generation
//!
//! Produces a pseudo-external validation cohort with the same first- and
//! second-moment structure as a reference cohort:
//!
//! 1. Treat the features and the continuous target as one joint vector and
//!    estimate its mean and covariance.
//! 2. Draw `N` iid vectors from the multivariate normal with those moments.
//! 3. Split each draw back into features and target by column position.
//! 4. Binarize the target with the same fixed threshold used for the reference.
//! 5. Optionally append `K` standardized standard-normal noise columns.
//!
//! The reference cohort is borrowed immutably and never modified.

use crate::cohort::data::{Cohort, DataError, Dataset, binarize_target};
use crate::cohort::moments::JointMoments;
use crate::cohort::noise::{noise_feature_names, standardized_noise};
use crate::seeding::rng_from_seed;
use ndarray::{Array1, Array2, Axis, concatenate, s};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label threshold used for the diabetes progression target.
pub const DEFAULT_LABEL_THRESHOLD: f64 = 100.0;

#[derive(Error, Debug)]
pub enum CohortError {
    #[error(
        "The joint covariance matrix is degenerate: {0}. Remove constant columns or regularize the covariance before sampling."
    )]
    DegenerateCovariance(String),

    #[error("Dimension mismatch in {context}: expected {expected}, found {found}.")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("The reference cohort has {found} rows, but at least {required} are required to estimate a covariance.")]
    TooFewSamples { found: usize, required: usize },

    #[error(transparent)]
    Data(#[from] DataError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    /// Number of synthetic samples `N`.
    pub n_samples: usize,
    /// Number of noise columns `K` appended to the synthetic features.
    pub n_noise_features: usize,
    /// Continuous targets strictly above this value become label 1.
    pub label_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            n_samples: 1000,
            n_noise_features: 0,
            label_threshold: DEFAULT_LABEL_THRESHOLD,
            seed: None,
        }
    }
}

/// A generated cohort: binary-labelled features plus the continuous target
/// each label was derived from.
#[derive(Debug, Clone)]
pub struct SyntheticCohort {
    pub dataset: Dataset,
    pub continuous_target: Array1<f64>,
}

/// A multivariate normal fitted to a reference cohort, ready to draw from.
#[derive(Debug, Clone)]
pub struct CohortSynthesizer {
    config: SynthesizerConfig,
    feature_names: Vec<String>,
    moments: JointMoments,
    factor: Array2<f64>,
}

impl CohortSynthesizer {
    pub fn fit(reference: &Cohort, config: SynthesizerConfig) -> Result<Self, CohortError> {
        log::info!(
            "Fitting joint moments over {} reference samples ({} features + target)",
            reference.n_samples(),
            reference.n_features()
        );
        let joint = reference.joint_matrix();
        let moments = JointMoments::from_samples(joint.view())?;

        let degenerate = moments.zero_variance_columns();
        if !degenerate.is_empty() {
            let names: Vec<&str> = degenerate
                .iter()
                .map(|&j| {
                    reference
                        .feature_names()
                        .get(j)
                        .map(String::as_str)
                        .unwrap_or("target")
                })
                .collect();
            return Err(CohortError::DegenerateCovariance(format!(
                "zero-variance columns [{}]",
                names.join(", ")
            )));
        }

        let factor = moments.sampling_factor()?;
        Ok(Self {
            config,
            feature_names: reference.feature_names().to_vec(),
            moments,
            factor,
        })
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    pub fn moments(&self) -> &JointMoments {
        &self.moments
    }

    /// Draws a cohort using the configured size, noise count and seed.
    pub fn sample(&self) -> Result<SyntheticCohort, CohortError> {
        let mut rng = rng_from_seed(self.config.seed);
        self.sample_with_rng(
            self.config.n_samples,
            self.config.n_noise_features,
            &mut rng,
        )
    }

    pub fn sample_with_rng<R: Rng + ?Sized>(
        &self,
        n_samples: usize,
        n_noise_features: usize,
        rng: &mut R,
    ) -> Result<SyntheticCohort, CohortError> {
        let dim = self.moments.dim();
        let n_features = self.feature_names.len();

        let z: Array2<f64> = Array2::from_shape_simple_fn((n_samples, dim), || rng.sample(StandardNormal));
        let draws = z.dot(&self.factor.t()) + &self.moments.mean;

        let features = draws.slice(s![.., ..n_features]).to_owned();
        let continuous_target = draws.column(n_features).to_owned();
        let labels = binarize_target(continuous_target.view(), self.config.label_threshold);

        let (feature_names, features) = if n_noise_features > 0 {
            let noise = standardized_noise(n_samples, n_noise_features, rng);
            let mut names = self.feature_names.clone();
            names.extend(noise_feature_names(&self.feature_names, n_noise_features));
            let stacked = concatenate(Axis(1), &[features.view(), noise.view()]).map_err(|_| {
                CohortError::DimensionMismatch {
                    context: "synthetic noise rows",
                    expected: n_samples,
                    found: noise.nrows(),
                }
            })?;
            (names, stacked)
        } else {
            (self.feature_names.clone(), features)
        };

        if features.ncols() != n_features + n_noise_features {
            return Err(CohortError::DimensionMismatch {
                context: "synthetic feature columns",
                expected: n_features + n_noise_features,
                found: features.ncols(),
            });
        }

        let positives = labels.iter().filter(|&&y| y > 0.5).count();
        log::info!(
            "Drew {} synthetic samples ({} positive at threshold {}), {} noise features",
            n_samples,
            positives,
            self.config.label_threshold,
            n_noise_features
        );

        let dataset = Dataset::new(feature_names, features, labels)?;
        Ok(SyntheticCohort {
            dataset,
            continuous_target,
        })
    }
}

/// Fits a synthesizer to `reference` and draws one cohort from it.
pub fn synthesize_cohort(
    reference: &Cohort,
    config: &SynthesizerConfig,
) -> Result<SyntheticCohort, CohortError> {
    CohortSynthesizer::fit(reference, config.clone())?.sample()
}
