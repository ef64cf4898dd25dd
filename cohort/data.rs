//! # Tabular Cohort Containers
//!
//! The statistical core works on two in-memory shapes:
//!
//! - `Cohort`: named numeric feature columns plus a *continuous* target, as
//!   supplied by the upstream dataset provider (e.g. disease progression one
//!   year after baseline).
//! - `Dataset`: the same named features plus a *binary* label, obtained by
//!   thresholding a cohort's target. Everything in `evaluate` consumes this.
//!
//! Both containers validate their invariants once, at construction, so the
//! rest of the crate can index rows and columns without re-checking shapes:
//! one name per column, distinct names, one target/label per row, finite values.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate, s};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// A comprehensive error type for all container construction and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read the input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),

    #[error("Dimension mismatch in {context}: expected {expected}, found {found}.")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Index {index} in {context} is out of bounds for length {len}.")]
    IndexOutOfBounds {
        context: &'static str,
        index: usize,
        len: usize,
    },

    #[error("The feature name '{0}' appears more than once. Feature names must be distinct.")]
    DuplicateFeatureName(String),

    #[error("The label at row {row} is {value}, but labels must be exactly 0 or 1.")]
    NonBinaryLabel { row: usize, value: f64 },

    #[error(
        "Non-finite values (NaN or Infinity) were found in column '{0}'. All values must be finite."
    )]
    NonFiniteValuesFound(String),

    #[error("The required column '{0}' was not found in the DataFrame.")]
    ColumnNotFound(String),

    #[error(
        "The column '{column_name}' could not be converted to f64 (numeric). (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        found_type: String,
    },

    #[error("Missing or null values were found in column '{0}'.")]
    MissingValuesFound(String),
}

/// Named numeric features with a continuous, pre-binarization target.
#[derive(Debug, Clone)]
pub struct Cohort {
    feature_names: Vec<String>,
    features: Array2<f64>,
    target: Array1<f64>,
}

impl Cohort {
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f64>,
        target: Array1<f64>,
    ) -> Result<Self, DataError> {
        validate_feature_block(&feature_names, features.view(), target.len())?;
        validate_is_finite(target.view(), "target")?;
        Ok(Self {
            feature_names,
            features,
            target,
        })
    }

    /// Builds a cohort from a polars `DataFrame`. Every column other than
    /// `target_column` becomes a feature, in frame order.
    pub fn from_dataframe(df: &DataFrame, target_column: &str) -> Result<Self, DataError> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        if !names.iter().any(|name| name == target_column) {
            return Err(DataError::ColumnNotFound(target_column.to_string()));
        }

        let target = extract_f64_column(df, target_column)?;
        let feature_names: Vec<String> = names
            .into_iter()
            .filter(|name| name != target_column)
            .collect();

        let n = df.height();
        let mut features = Array2::<f64>::zeros((n, feature_names.len()));
        for (j, name) in feature_names.iter().enumerate() {
            let column = extract_f64_column(df, name)?;
            features.column_mut(j).assign(&column);
        }

        Self::new(feature_names, features, target)
    }

    /// Loads a tab-separated file with a header row and converts it with
    /// [`Cohort::from_dataframe`].
    pub fn load_tsv(path: &Path, target_column: &str) -> Result<Self, DataError> {
        log::info!("Loading cohort from '{}'", path.display());
        let df = CsvReader::new(File::open(path)?)
            .with_options(
                CsvReadOptions::default()
                    .with_has_header(true)
                    .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
            )
            .finish()?;
        let cohort = Self::from_dataframe(&df, target_column)?;
        log::info!(
            "Loaded {} samples with {} features (target '{}')",
            cohort.n_samples(),
            cohort.n_features(),
            target_column
        );
        Ok(cohort)
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn target(&self) -> ArrayView1<'_, f64> {
        self.target.view()
    }

    /// Features with the target appended as the last column. This is the
    /// joint vector over which synthetic-cohort moments are estimated.
    pub fn joint_matrix(&self) -> Array2<f64> {
        let p = self.n_features();
        let mut joint = Array2::<f64>::zeros((self.n_samples(), p + 1));
        joint.slice_mut(s![.., ..p]).assign(&self.features);
        joint.column_mut(p).assign(&self.target);
        joint
    }

    /// Converts the continuous target into a binary label:
    /// `target > threshold` becomes 1, anything else 0.
    pub fn binarize(&self, threshold: f64) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            features: self.features.clone(),
            labels: binarize_target(self.target.view(), threshold),
        }
    }
}

/// Named numeric features with a binary label in {0, 1}.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    features: Array2<f64>,
    labels: Array1<f64>,
}

impl Dataset {
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f64>,
        labels: Array1<f64>,
    ) -> Result<Self, DataError> {
        validate_feature_block(&feature_names, features.view(), labels.len())?;
        for (row, &value) in labels.iter().enumerate() {
            if value != 0.0 && value != 1.0 {
                return Err(DataError::NonBinaryLabel { row, value });
            }
        }
        Ok(Self {
            feature_names,
            features,
            labels,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, f64> {
        self.labels.view()
    }

    /// Number of (negative, positive) samples.
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.labels.iter().filter(|&&y| y > 0.5).count();
        (self.labels.len() - positives, positives)
    }

    /// Rows at `indices`, in the given order.
    pub fn subset(&self, indices: &[usize]) -> Result<Dataset, DataError> {
        check_indices(indices, self.n_samples(), "row subset")?;
        Ok(Dataset {
            feature_names: self.feature_names.clone(),
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        })
    }

    /// Columns at `columns`, in the given order. Repeating a column is an
    /// error, since names must stay distinct.
    pub fn select_features(&self, columns: &[usize]) -> Result<Dataset, DataError> {
        check_indices(columns, self.n_features(), "feature selection")?;
        let feature_names = columns
            .iter()
            .map(|&j| self.feature_names[j].clone())
            .collect();
        Dataset::new(
            feature_names,
            self.features.select(Axis(1), columns),
            self.labels.clone(),
        )
    }

    /// Returns a new dataset with `extra` appended after the existing columns.
    pub fn with_appended_columns(
        &self,
        names: Vec<String>,
        extra: ArrayView2<f64>,
    ) -> Result<Dataset, DataError> {
        if extra.nrows() != self.n_samples() {
            return Err(DataError::DimensionMismatch {
                context: "appended column rows",
                expected: self.n_samples(),
                found: extra.nrows(),
            });
        }
        let mut feature_names = self.feature_names.clone();
        feature_names.extend(names);
        let features = concatenate(Axis(1), &[self.features.view(), extra.view()]).map_err(|_| {
            DataError::DimensionMismatch {
                context: "appended column rows",
                expected: self.n_samples(),
                found: extra.nrows(),
            }
        })?;
        Dataset::new(feature_names, features, self.labels.clone())
    }
}

pub fn binarize_target(target: ArrayView1<f64>, threshold: f64) -> Array1<f64> {
    target.mapv(|value| if value > threshold { 1.0 } else { 0.0 })
}

fn check_indices(indices: &[usize], len: usize, context: &'static str) -> Result<(), DataError> {
    match indices.iter().find(|&&i| i >= len) {
        Some(&index) => Err(DataError::IndexOutOfBounds {
            context,
            index,
            len,
        }),
        None => Ok(()),
    }
}

fn validate_feature_block(
    names: &[String],
    features: ArrayView2<f64>,
    n_targets: usize,
) -> Result<(), DataError> {
    if names.len() != features.ncols() {
        return Err(DataError::DimensionMismatch {
            context: "feature names vs. feature columns",
            expected: features.ncols(),
            found: names.len(),
        });
    }
    if n_targets != features.nrows() {
        return Err(DataError::DimensionMismatch {
            context: "label length vs. feature rows",
            expected: features.nrows(),
            found: n_targets,
        });
    }
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(DataError::DuplicateFeatureName(name.clone()));
        }
    }
    for (name, column) in names.iter().zip(features.axis_iter(Axis(1))) {
        validate_is_finite(column, name)?;
    }
    Ok(())
}

fn validate_is_finite(values: ArrayView1<f64>, column_name: &str) -> Result<(), DataError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(())
}

fn extract_f64_column(df: &DataFrame, name: &str) -> Result<Array1<f64>, DataError> {
    let series = df
        .column(name)
        .map_err(|_| DataError::ColumnNotFound(name.to_string()))?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(name.to_string()));
    }
    let dtype = series.dtype().clone();
    let series = if dtype != DataType::Float64 {
        series
            .cast(&DataType::Float64)
            .map_err(|_| DataError::ColumnWrongType {
                column_name: name.to_string(),
                found_type: dtype.to_string(),
            })?
    } else {
        series.clone()
    };
    let values = series.f64()?;
    // A lossy cast (e.g. from strings) surfaces as new nulls.
    if values.null_count() > 0 {
        return Err(DataError::ColumnWrongType {
            column_name: name.to_string(),
            found_type: dtype.to_string(),
        });
    }
    Ok(Array1::from_iter(values.into_no_null_iter()))
}
