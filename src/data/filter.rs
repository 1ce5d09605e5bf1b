use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::model::{Dataset, RowId};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Row predicates
// ---------------------------------------------------------------------------

/// A predicate selecting which rows of a dataset are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowFilter {
    /// Keep rows whose value lies within `[min, max]`. An open bound is
    /// unconstrained; NaN never passes.
    Range {
        column: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Keep rows whose value is neither NaN nor infinite.
    Finite { column: String },
    /// Drop the listed row ids.
    Exclude { row_ids: BTreeSet<RowId> },
}

impl RowFilter {
    fn keeps(&self, dataset: &Dataset, row: usize) -> Result<bool> {
        Ok(match self {
            RowFilter::Range { column, min, max } => {
                let v = dataset.require_column(column)?[row];
                !v.is_nan()
                    && min.map_or(true, |lo| v >= lo)
                    && max.map_or(true, |hi| v <= hi)
            }
            RowFilter::Finite { column } => dataset.require_column(column)?[row].is_finite(),
            RowFilter::Exclude { row_ids } => !row_ids.contains(&dataset.row_ids()[row]),
        })
    }
}

/// Return indices of rows that pass all filters.
///
/// An empty filter list keeps everything. Fails if a filter names a column
/// the dataset does not have.
pub fn filtered_indices(dataset: &Dataset, filters: &[RowFilter]) -> Result<Vec<usize>> {
    let mut kept = Vec::with_capacity(dataset.len());
    'rows: for row in 0..dataset.len() {
        for filter in filters {
            if !filter.keeps(dataset, row)? {
                continue 'rows;
            }
        }
        kept.push(row);
    }
    Ok(kept)
}
