//! Flat score records for downstream charting.
//!
//! Every protocol reports through the same row shape: which run (repetition) it
//! came from, which scenario produced it, the configuration value if the
//! scenario has one, and the metric name and value.

use ndarray::ArrayView1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Write;

pub const ROC_AUC: &str = "roc_auc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub run: usize,
    pub scenario: String,
    /// Configuration value (feature count or C) when the scenario is indexed by one.
    pub config: Option<f64>,
    pub metric: String,
    pub value: f64,
}

impl ScoreRecord {
    pub fn auc(run: usize, scenario: &str, config: Option<f64>, value: f64) -> Self {
        Self {
            run,
            scenario: scenario.to_string(),
            config,
            metric: ROC_AUC.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTable {
    records: Vec<ScoreRecord>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ScoreRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, other: ScoreTable) {
        self.records.extend(other.records);
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of every record with the given scenario, in insertion order.
    pub fn scenario_values(&self, scenario: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.scenario == scenario)
            .map(|r| r.value)
            .collect()
    }

    /// Columns `run`, `scenario`, `config` (nullable), `metric`, `value`.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let run: Vec<u64> = self.records.iter().map(|r| r.run as u64).collect();
        let scenario: Vec<&str> = self.records.iter().map(|r| r.scenario.as_str()).collect();
        let config: Vec<Option<f64>> = self.records.iter().map(|r| r.config).collect();
        let metric: Vec<&str> = self.records.iter().map(|r| r.metric.as_str()).collect();
        let value: Vec<f64> = self.records.iter().map(|r| r.value).collect();
        DataFrame::new(vec![
            Series::new("run".into(), run).into(),
            Series::new("scenario".into(), scenario).into(),
            Series::new("config".into(), config).into(),
            Series::new("metric".into(), metric).into(),
            Series::new("value".into(), value).into(),
        ])
    }

    /// Writes the table as tab-separated text with a header row. A missing
    /// configuration value is written as an empty field.
    pub fn write_tsv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_writer(writer);
        for record in &self.records {
            out.serialize(record)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Mean and population standard deviation. `None` for an empty slice.
pub fn mean_and_std(values: ArrayView1<f64>) -> Option<(f64, f64)> {
    let mean = values.mean()?;
    Some((mean, values.std(0.0)))
}
