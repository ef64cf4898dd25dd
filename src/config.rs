//! Experiment configuration, read from and written to TOML.
//!
//! ```toml
//! [synthesizer]
//! n_samples = 1000
//! n_noise_features = 40
//!
//! [model.logistic]
//! c = 1.0
//!
//! [comparison]
//! repeats = 10
//! inner_folds = 3
//! outer_folds = 5
//!
//! [search]
//! kind = "feature_count"
//! values = [1, 2, 4, 8, 16, 32]
//! ```
//!
//! Every section is optional and falls back to its `Default`.

use crate::cohort::synth::SynthesizerConfig;
use crate::evaluate::compare::ComparisonConfig;
use crate::evaluate::pipeline::{Param, PipelineSpec};
use crate::evaluate::sweep::SweepConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    FeatureCount,
    Regularization,
}

/// The grid searched by the comparator, as plain numbers of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpaceConfig {
    pub kind: SearchKind,
    pub values: Vec<f64>,
}

impl Default for SearchSpaceConfig {
    fn default() -> Self {
        Self {
            kind: SearchKind::FeatureCount,
            values: vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0],
        }
    }
}

impl SearchSpaceConfig {
    pub fn params(&self) -> Result<Vec<Param>, ConfigError> {
        self.values
            .iter()
            .map(|&v| match self.kind {
                SearchKind::FeatureCount => {
                    if v >= 1.0 && v.fract() == 0.0 && v.is_finite() {
                        Ok(Param::FeatureCount(v as usize))
                    } else {
                        Err(ConfigError::Invalid(format!(
                            "feature count {} is not a positive integer",
                            v
                        )))
                    }
                }
                SearchKind::Regularization => {
                    if v.is_finite() && v > 0.0 {
                        Ok(Param::Regularization(v))
                    } else {
                        Err(ConfigError::Invalid(format!(
                            "regularization strength {} is not finite and positive",
                            v
                        )))
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub synthesizer: SynthesizerConfig,
    pub model: PipelineSpec,
    pub comparison: ComparisonConfig,
    pub sweep: SweepConfig,
    pub search: SearchSpaceConfig,
}

impl ExperimentConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded experiment configuration from '{}'", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn search_space(&self) -> Result<Vec<Param>, ConfigError> {
        self.search.params()
    }

    /// Checks the values that can be checked without a dataset. Feature
    /// counts against the available columns are checked when a search runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.synthesizer;
        if s.n_samples == 0 {
            return Err(ConfigError::Invalid(
                "synthesizer.n_samples must be at least 1".to_string(),
            ));
        }
        if !s.label_threshold.is_finite() {
            return Err(ConfigError::Invalid(
                "synthesizer.label_threshold must be finite".to_string(),
            ));
        }

        let c = self.model.logistic.c;
        if !(c.is_finite() && c > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "model.logistic.c must be finite and positive, got {}",
                c
            )));
        }
        if self.model.logistic.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "model.logistic.max_iterations must be at least 1".to_string(),
            ));
        }

        let cmp = &self.comparison;
        if cmp.repeats == 0 {
            return Err(ConfigError::Invalid(
                "comparison.repeats must be at least 1".to_string(),
            ));
        }
        if cmp.inner_folds < 2 || cmp.outer_folds < 2 {
            return Err(ConfigError::Invalid(format!(
                "comparison fold counts must be at least 2, got inner {} and outer {}",
                cmp.inner_folds, cmp.outer_folds
            )));
        }

        let sweep = &self.sweep;
        if !(sweep.test_fraction > 0.0 && sweep.test_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "sweep.test_fraction must lie in (0, 1), got {}",
                sweep.test_fraction
            )));
        }
        if sweep.feature_counts.is_empty() || sweep.feature_counts.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(ConfigError::Invalid(format!(
                "sweep.feature_counts must be non-empty and strictly ascending, got {:?}",
                sweep.feature_counts
            )));
        }

        if self.search.values.is_empty() {
            return Err(ConfigError::Invalid("search.values is empty".to_string()));
        }
        self.search.params()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::folds::FoldStrategy;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_document_gives_defaults() {
        let config = ExperimentConfig::from_toml_str("").unwrap();
        assert_eq!(config, ExperimentConfig::default());
        assert_eq!(config.synthesizer.label_threshold, 100.0);
        assert_eq!(config.comparison.inner_folds, 3);
        assert_eq!(config.comparison.outer_folds, 5);
        assert_eq!(config.sweep.feature_counts, vec![1, 2, 4, 8, 16, 32]);
    }

    #[test]
    fn partial_sections_override_only_their_fields() {
        let config = ExperimentConfig::from_toml_str(
            r#"
            [synthesizer]
            n_noise_features = 40
            seed = 7

            [model.logistic]
            c = 0.5

            [comparison]
            repeats = 4
            fold_strategy = "shuffled"

            [search]
            kind = "regularization"
            values = [0.01, 0.1, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.synthesizer.n_noise_features, 40);
        assert_eq!(config.synthesizer.n_samples, 1000);
        assert_eq!(config.synthesizer.seed, Some(7));
        assert_eq!(config.model.logistic.c, 0.5);
        assert!(config.model.standardize);
        assert_eq!(config.comparison.repeats, 4);
        assert_eq!(config.comparison.fold_strategy, FoldStrategy::Shuffled);
        assert_eq!(
            config.search_space().unwrap(),
            vec![
                Param::Regularization(0.01),
                Param::Regularization(0.1),
                Param::Regularization(1.0)
            ]
        );
    }

    #[test]
    fn invalid_values_are_reported() {
        for text in [
            "[comparison]\nouter_folds = 1",
            "[sweep]\ntest_fraction = 1.0",
            "[sweep]\nfeature_counts = [4, 2]",
            "[search]\nvalues = [2.5]",
            "[search]\nvalues = []",
            "[model.logistic]\nc = -1.0",
        ] {
            let err = ExperimentConfig::from_toml_str(text).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{}: {:?}", text, err);
        }
    }

    #[test]
    fn save_and_load_preserve_the_configuration() {
        let mut config = ExperimentConfig::default();
        config.synthesizer.n_noise_features = 12;
        config.model.select_k = Some(3);
        config.comparison.seed = Some(42);
        config.search = SearchSpaceConfig {
            kind: SearchKind::Regularization,
            values: vec![0.1, 10.0],
        };

        let file = NamedTempFile::new().unwrap();
        config.save(file.path()).unwrap();
        let loaded = ExperimentConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn unparseable_toml_is_a_parse_error() {
        let err = ExperimentConfig::from_toml_str("[comparison\nrepeats = 3").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }
}
