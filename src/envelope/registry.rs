use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use super::provenance::{DatasetId, ProvenanceLedger};
use crate::data::model::{Dataset, DatasetInfo};
use crate::error::{EnvelopeError, Result};

/// Whether a slot still holds its rows.
#[derive(Debug, Clone)]
enum Residency {
    Resident(Arc<Dataset>),
    Released,
}

#[derive(Debug, Clone)]
struct Slot {
    info: DatasetInfo,
    residency: Residency,
    /// Range of point-buffer indices this dataset contributed.
    span: Range<usize>,
}

/// A registry slot as seen from outside.
#[derive(Debug, Clone, Copy)]
pub enum DatasetEntry<'a> {
    Resident(&'a Arc<Dataset>),
    Released(&'a DatasetInfo),
}

impl<'a> DatasetEntry<'a> {
    pub fn info(&self) -> &'a DatasetInfo {
        match self {
            DatasetEntry::Resident(ds) => &ds.info,
            DatasetEntry::Released(info) => info,
        }
    }

    pub fn is_resident(&self) -> bool {
        matches!(self, DatasetEntry::Resident(_))
    }
}

/// Arena of ingested datasets, addressed by [`DatasetId`].
///
/// A resident slot holds a strong `Arc` to its dataset. Releasing a slot
/// drops that handle and keeps only the [`DatasetInfo`], so the caller's own
/// handle decides whether the rows survive.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    slots: Vec<Slot>,
    by_name: HashMap<String, DatasetId>,
    keep_all: bool,
    allow_overwrite: bool,
}

impl DatasetRegistry {
    pub fn new(keep_all: bool, allow_overwrite: bool) -> Self {
        Self {
            keep_all,
            allow_overwrite,
            ..Self::default()
        }
    }

    /// Fail with `DuplicateName` if `name` is taken and overwrite is off.
    pub fn check_name(&self, name: &str) -> Result<()> {
        if !self.allow_overwrite && self.by_name.contains_key(name) {
            return Err(EnvelopeError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// Register a dataset whose points occupy `span` of the point buffer.
    ///
    /// With overwrite allowed, a reused name points at the new slot while the
    /// old slot stays addressable by id.
    pub fn store(&mut self, dataset: Arc<Dataset>, span: Range<usize>) -> Result<DatasetId> {
        self.check_name(dataset.name())?;
        let info = dataset.info.clone();
        Ok(self.push(Slot {
            info,
            residency: Residency::Resident(dataset),
            span,
        }))
    }

    /// Register a dataset that contributed data but whose rows are gone.
    pub fn store_released(&mut self, info: DatasetInfo) -> Result<DatasetId> {
        self.check_name(&info.name)?;
        Ok(self.push(Slot {
            info,
            residency: Residency::Released,
            span: 0..0,
        }))
    }

    fn push(&mut self, slot: Slot) -> DatasetId {
        let id = DatasetId(self.slots.len());
        if let Some(previous) = self.by_name.insert(slot.info.name.clone(), id) {
            log::debug!("dataset '{}' shadows slot {}", slot.info.name, previous.index());
        }
        self.slots.push(slot);
        id
    }

    /// Release every resident dataset with no row among `vertices`.
    ///
    /// Released datasets have their ledger span detached. Does nothing when
    /// `keep_all` is set. Returns the released ids.
    pub fn release_if_unused(
        &mut self,
        vertices: &[usize],
        ledger: &mut ProvenanceLedger,
    ) -> Vec<DatasetId> {
        if self.keep_all {
            return Vec::new();
        }

        let on_hull: HashSet<DatasetId> = vertices
            .iter()
            .filter_map(|&v| ledger.get(v)?.dataset_id())
            .collect();

        let mut released = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let id = DatasetId(index);
            if matches!(slot.residency, Residency::Resident(_)) && !on_hull.contains(&id) {
                slot.residency = Residency::Released;
                ledger.detach_range(slot.span.clone());
                log::debug!("released dataset '{}': no rows on the hull", slot.info.name);
                released.push(id);
            }
        }
        released
    }

    /// The resident dataset behind `id`.
    pub fn get(&self, id: DatasetId) -> Result<&Arc<Dataset>> {
        match self.entry(id) {
            Some(DatasetEntry::Resident(ds)) => Ok(ds),
            Some(DatasetEntry::Released(info)) => {
                Err(EnvelopeError::DetachedDataset(info.name.clone()))
            }
            None => Err(EnvelopeError::UnknownDataset(format!("#{}", id.index()))),
        }
    }

    pub fn entry(&self, id: DatasetId) -> Option<DatasetEntry<'_>> {
        self.slots.get(id.index()).map(|slot| match &slot.residency {
            Residency::Resident(ds) => DatasetEntry::Resident(ds),
            Residency::Released => DatasetEntry::Released(&slot.info),
        })
    }

    pub fn lookup(&self, name: &str) -> Option<DatasetId> {
        self.by_name.get(name).copied()
    }

    pub fn span(&self, id: DatasetId) -> Option<Range<usize>> {
        self.slots.get(id.index()).map(|slot| slot.span.clone())
    }

    pub fn is_resident(&self, id: DatasetId) -> bool {
        self.entry(id).is_some_and(|e| e.is_resident())
    }

    /// All slots in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (DatasetId, DatasetEntry<'_>)> + '_ {
        (0..self.slots.len()).filter_map(|i| {
            let id = DatasetId(i);
            self.entry(id).map(|e| (id, e))
        })
    }

    /// Resident datasets in insertion order.
    pub fn resident(&self) -> impl Iterator<Item = (DatasetId, &Arc<Dataset>)> + '_ {
        self.entries().filter_map(|(id, entry)| match entry {
            DatasetEntry::Resident(ds) => Some((id, ds)),
            DatasetEntry::Released(_) => None,
        })
    }

    pub fn keep_all(&self) -> bool {
        self.keep_all
    }

    pub fn allow_overwrite(&self) -> bool {
        self.allow_overwrite
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(name: &str, rows: usize) -> Arc<Dataset> {
        Arc::new(
            Dataset::new(
                DatasetInfo::new(name),
                vec![("x".into(), vec![0.0; rows]), ("y".into(), vec![0.0; rows])],
                None,
            )
            .unwrap(),
        )
    }

    fn ledger_for(registry: &DatasetRegistry) -> ProvenanceLedger {
        let mut ledger = ProvenanceLedger::new();
        for (id, _) in registry.entries() {
            for row in registry.span(id).unwrap() {
                ledger.append(id, row as i64);
            }
        }
        ledger
    }

    #[test]
    fn duplicate_names_are_rejected_unless_overwrite() {
        let mut strict = DatasetRegistry::new(false, false);
        strict.store(dataset("a", 1), 0..1).unwrap();
        assert!(matches!(
            strict.store(dataset("a", 1), 1..2),
            Err(EnvelopeError::DuplicateName(name)) if name == "a"
        ));

        let mut lenient = DatasetRegistry::new(false, true);
        let first = lenient.store(dataset("a", 1), 0..1).unwrap();
        let second = lenient.store(dataset("a", 1), 1..2).unwrap();
        assert_ne!(first, second);
        assert_eq!(lenient.lookup("a"), Some(second));
        assert!(lenient.get(first).is_ok());
    }

    #[test]
    fn unused_datasets_are_released_and_detached() {
        let mut registry = DatasetRegistry::new(false, false);
        let kept = registry.store(dataset("kept", 2), 0..2).unwrap();
        let dropped = registry.store(dataset("dropped", 2), 2..4).unwrap();
        let mut ledger = ledger_for(&registry);

        let released = registry.release_if_unused(&[0, 1], &mut ledger);

        assert_eq!(released, vec![dropped]);
        assert!(registry.is_resident(kept));
        assert!(matches!(
            registry.get(dropped),
            Err(EnvelopeError::DetachedDataset(name)) if name == "dropped"
        ));
        assert_eq!(registry.entry(dropped).unwrap().info().name, "dropped");
        assert!(ledger.get(2).unwrap().is_detached());
        assert!(!ledger.get(0).unwrap().is_detached());
    }

    #[test]
    fn keep_all_disables_pruning() {
        let mut registry = DatasetRegistry::new(true, false);
        registry.store(dataset("a", 1), 0..1).unwrap();
        registry.store(dataset("b", 1), 1..2).unwrap();
        let mut ledger = ledger_for(&registry);

        assert!(registry.release_if_unused(&[0], &mut ledger).is_empty());
        assert_eq!(registry.resident().count(), 2);
    }

    #[test]
    fn released_slot_drops_its_handle() {
        let mut registry = DatasetRegistry::new(false, false);
        let handle = dataset("a", 1);
        registry.store(Arc::clone(&handle), 0..1).unwrap();
        assert_eq!(Arc::strong_count(&handle), 2);

        let mut ledger = ledger_for(&registry);
        registry.release_if_unused(&[], &mut ledger);
        assert_eq!(Arc::strong_count(&handle), 1);
    }

    #[test]
    fn unknown_id_is_reported() {
        let registry = DatasetRegistry::new(false, false);
        assert!(matches!(
            registry.get(DatasetId(3)),
            Err(EnvelopeError::UnknownDataset(_))
        ));
    }
}
