//! Dataset representation
//!
//! An ordered, immutable collection of records. Each record is a feature map
//! plus an optional label. Views over index subsets let cross-validation folds
//! share one dataset without copying it.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use polars::prelude::*;

use crate::error::{KilnError, Result};

/// One observation: named features plus an optional label
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    features: BTreeMap<String, f64>,
    label: Option<f64>,
}

impl Record {
    /// Create a record from a feature map and an optional label
    pub fn new(features: BTreeMap<String, f64>, label: Option<f64>) -> Self {
        Self { features, label }
    }

    /// Create an empty, unlabeled record
    pub fn empty() -> Self {
        Self {
            features: BTreeMap::new(),
            label: None,
        }
    }

    /// Add a feature value
    pub fn with_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.features.insert(name.into(), value);
        self
    }

    /// Attach a label
    pub fn with_label(mut self, label: f64) -> Self {
        self.label = Some(label);
        self
    }

    /// Feature value by name, if present
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }

    pub fn label(&self) -> Option<f64> {
        self.label
    }
}

/// Ordered collection of records, immutable once built
#[derive(Debug, Clone)]
pub struct Dataset {
    feature_names: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset from records.
    ///
    /// The feature-name list is the sorted union of all record keys. A record
    /// missing a feature contributes 0.0 for it when materialized as a matrix.
    pub fn new(records: Vec<Record>) -> Self {
        let mut names: Vec<String> = records
            .iter()
            .flat_map(|r| r.features.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        Self {
            feature_names: names,
            records,
        }
    }

    /// Build a dataset from a DataFrame, taking `target` as the label column
    /// and every other column as a feature.
    pub fn from_dataframe(df: &DataFrame, target: &str) -> Result<Self> {
        let feature_cols: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target)
            .map(|s| s.to_string())
            .collect();

        let target_series = df
            .column(target)
            .map_err(|_| KilnError::DataError(format!("target column not found: {}", target)))?;
        let target_f64 = target_series.cast(&DataType::Float64)?;
        let labels: Vec<Option<f64>> = target_f64.f64()?.into_iter().collect();

        let mut columns: Vec<(String, Vec<f64>)> = Vec::with_capacity(feature_cols.len());
        for col_name in &feature_cols {
            let series = df
                .column(col_name)
                .map_err(|_| KilnError::DataError(format!("column not found: {}", col_name)))?;
            let series_f64 = series.cast(&DataType::Float64)?;
            let values: Vec<f64> = series_f64
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            columns.push((col_name.clone(), values));
        }

        let records: Vec<Record> = (0..df.height())
            .map(|row| {
                let features: BTreeMap<String, f64> = columns
                    .iter()
                    .map(|(name, values)| (name.clone(), values[row]))
                    .collect();
                Record::new(features, labels[row])
            })
            .collect();

        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Canonical feature-name order used by matrix materialization
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// View over a subset of records, by index into this dataset
    pub fn view(&self, indices: &[usize]) -> DatasetView<'_> {
        DatasetView {
            dataset: self,
            indices: indices.to_vec(),
        }
    }

    /// View over every record
    pub fn full_view(&self) -> DatasetView<'_> {
        DatasetView {
            dataset: self,
            indices: (0..self.records.len()).collect(),
        }
    }
}

/// Borrowed, index-based slice of a dataset.
///
/// Views share the underlying dataset, so concurrent folds can read it without
/// copying record data.
#[derive(Debug, Clone)]
pub struct DatasetView<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> DatasetView<'a> {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Iterate the records selected by this view, in view order
    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.indices.iter().map(move |&i| &self.dataset.records[i])
    }

    /// Materialize the view as a feature matrix plus label vector.
    ///
    /// Row order follows the view's index order and columns follow
    /// [`Dataset::feature_names`]. Any unlabeled record is a `DataError`,
    /// since supervised consumers cannot interpret it.
    pub fn to_matrix(&self) -> Result<(Array2<f64>, Array1<f64>)> {
        let names = self.dataset.feature_names();
        let n_rows = self.indices.len();
        let n_cols = names.len();

        let mut labels = Vec::with_capacity(n_rows);
        for &i in &self.indices {
            match self.dataset.records[i].label() {
                Some(y) => labels.push(y),
                None => {
                    return Err(KilnError::DataError(format!(
                        "record {} has no label; supervised view requires one",
                        i
                    )))
                }
            }
        }

        let x = Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
            self.dataset.records[self.indices[r]]
                .feature(&names[c])
                .unwrap_or(0.0)
        });

        Ok((x, Array1::from_vec(labels)))
    }
}
