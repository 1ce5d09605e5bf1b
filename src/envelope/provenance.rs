use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::data::model::RowId;

/// Arena index of a dataset slot in the
/// [`DatasetRegistry`](super::registry::DatasetRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub(crate) usize);

impl DatasetId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owner of a buffered point, or the sentinel left once the owner is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetRef {
    Attached(DatasetId),
    Detached,
}

/// Which dataset row produced a buffered point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointRef {
    pub dataset: DatasetRef,
    pub row: RowId,
}

impl PointRef {
    pub fn dataset_id(&self) -> Option<DatasetId> {
        match self.dataset {
            DatasetRef::Attached(id) => Some(id),
            DatasetRef::Detached => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self.dataset, DatasetRef::Detached)
    }
}

/// One `PointRef` per buffered hull point, index-aligned with the engine's
/// point buffer. Entries are never removed, only detached.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceLedger {
    refs: Vec<PointRef>,
}

impl ProvenanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, dataset: DatasetId, row: RowId) {
        self.refs.push(PointRef {
            dataset: DatasetRef::Attached(dataset),
            row,
        });
    }

    pub fn get(&self, point_index: usize) -> Option<PointRef> {
        self.refs.get(point_index).copied()
    }

    /// Mark one entry's dataset as released. The row id is kept.
    pub fn detach(&mut self, point_index: usize) {
        if let Some(entry) = self.refs.get_mut(point_index) {
            entry.dataset = DatasetRef::Detached;
        }
    }

    pub fn detach_range(&mut self, span: Range<usize>) {
        let end = span.end.min(self.refs.len());
        let start = span.start.min(end);
        for entry in &mut self.refs[start..end] {
            entry.dataset = DatasetRef::Detached;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointRef> {
        self.refs.iter()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
