use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::filter::{filtered_indices, RowFilter};
use crate::error::{EnvelopeError, Result};

/// Stable identifier of a row within its dataset.
pub type RowId = i64;

// ---------------------------------------------------------------------------
// Table – the provider interface the envelope reads from
// ---------------------------------------------------------------------------

/// Any column-oriented numeric table.
///
/// The envelope never interprets rows beyond pulling two numeric columns and
/// a row id out of them.
pub trait Table {
    fn name(&self) -> &str;
    fn column(&self, name: &str) -> Option<&[f64]>;
    fn column_names(&self) -> Vec<String>;
    fn row_id(&self, row: usize) -> RowId;
    fn num_rows(&self) -> usize;
}

// ---------------------------------------------------------------------------
// DatasetInfo – identity of a dataset, kept after its rows are released
// ---------------------------------------------------------------------------

/// Name, description and origin of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Unique lookup key inside an envelope.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_path: Option<PathBuf>,
}

impl DatasetInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            source_path: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

impl fmt::Display for DatasetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset: {}", self.name)?;
        match &self.source_path {
            Some(path) => writeln!(f, "\tSource:\t{}", path.display())?,
            None => writeln!(f, "\tSource:\t<memory>")?,
        }
        write!(f, "\tDescription:\n\t\t{}", self.description)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the loaded table
// ---------------------------------------------------------------------------

/// A numeric table: equal-length named `f64` columns plus one row id per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub info: DatasetInfo,
    /// Column names in source order.
    column_names: Vec<String>,
    columns: BTreeMap<String, Vec<f64>>,
    row_ids: Vec<RowId>,
    /// Filters applied since the last `unfilter`, oldest first.
    filters: Vec<RowFilter>,
    /// Rows as they were before the first filter.
    original: Option<Box<Dataset>>,
}

impl Dataset {
    /// Build a dataset from named columns.
    ///
    /// `row_ids` defaults to row positions. Every column, and the row ids,
    /// must have the same length.
    pub fn new(
        info: DatasetInfo,
        columns: Vec<(String, Vec<f64>)>,
        row_ids: Option<Vec<RowId>>,
    ) -> Result<Self> {
        let n_rows = columns
            .first()
            .map(|(_, values)| values.len())
            .or_else(|| row_ids.as_ref().map(Vec::len))
            .unwrap_or(0);

        for (name, values) in &columns {
            if values.len() != n_rows {
                return Err(EnvelopeError::DimensionMismatch {
                    dataset: info.name.clone(),
                    column: name.clone(),
                    expected: n_rows,
                    found: values.len(),
                });
            }
        }

        let row_ids = match row_ids {
            Some(ids) if ids.len() != n_rows => {
                return Err(EnvelopeError::DimensionMismatch {
                    dataset: info.name.clone(),
                    column: "<row ids>".into(),
                    expected: n_rows,
                    found: ids.len(),
                });
            }
            Some(ids) => ids,
            None => (0..n_rows as RowId).collect(),
        };

        let mut column_names = Vec::with_capacity(columns.len());
        let mut map = BTreeMap::new();
        for (name, values) in columns {
            if map.insert(name.clone(), values).is_none() {
                column_names.push(name);
            }
        }

        Ok(Self {
            info,
            column_names,
            columns: map,
            row_ids,
            filters: Vec::new(),
            original: None,
        })
    }

    /// Copy any [`Table`] into an owned dataset.
    pub fn from_table(table: &dyn Table, info: DatasetInfo) -> Result<Self> {
        let columns = table
            .column_names()
            .into_iter()
            .filter_map(|name| {
                let values = table.column(&name)?.to_vec();
                Some((name, values))
            })
            .collect();
        let row_ids = (0..table.num_rows()).map(|row| table.row_id(row)).collect();
        Self::new(info, columns, Some(row_ids))
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn row_ids(&self) -> &[RowId] {
        &self.row_ids
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    /// Look up a column, failing with `MissingColumn`.
    pub fn require_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name).ok_or_else(|| EnvelopeError::MissingColumn {
            dataset: self.info.name.clone(),
            column: name.to_string(),
        })
    }

    /// Position of a row id, if present.
    pub fn position_of(&self, row_id: RowId) -> Option<usize> {
        self.row_ids.iter().position(|&id| id == row_id)
    }

    /// Keep only the rows at `indices`, preserving their row ids.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), indices.iter().map(|&i| values[i]).collect()))
            .collect();
        Self {
            info: self.info.clone(),
            column_names: self.column_names.clone(),
            columns,
            row_ids: indices.iter().map(|&i| self.row_ids[i]).collect(),
            filters: self.filters.clone(),
            original: self.original.clone(),
        }
    }

    // -- Filtering ----------------------------------------------------------

    /// Drop every row that does not pass `filter`, remembering the filter.
    ///
    /// The unfiltered rows are kept aside the first time so `unfilter` can
    /// restore them.
    pub fn apply_filter(&mut self, filter: RowFilter) -> Result<()> {
        let kept = filtered_indices(self, std::slice::from_ref(&filter))?;
        log::debug!(
            "filter {filter:?} on '{}' keeps {}/{} rows",
            self.info.name,
            kept.len(),
            self.len()
        );

        let original = match self.original.take() {
            Some(original) => original,
            None => Box::new(self.clone()),
        };
        *self = self.select_rows(&kept);
        self.filters.push(filter);
        self.original = Some(original);
        Ok(())
    }

    pub fn is_filtered(&self) -> bool {
        self.original.is_some()
    }

    /// Filters applied so far, oldest first.
    pub fn filters(&self) -> &[RowFilter] {
        &self.filters
    }

    /// The rows as they were before the first filter.
    pub fn unfiltered(&self) -> Option<&Dataset> {
        self.original.as_deref()
    }

    /// Restore the rows present before the first filter.
    pub fn unfilter(&mut self) {
        if let Some(original) = self.original.take() {
            let info = self.info.clone();
            *self = *original;
            self.info = info;
        }
    }
}

impl Table for Dataset {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    fn column_names(&self) -> Vec<String> {
        self.column_names.clone()
    }

    fn row_id(&self, row: usize) -> RowId {
        self.row_ids[row]
    }

    fn num_rows(&self) -> usize {
        self.row_ids.len()
    }
}
