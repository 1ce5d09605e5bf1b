use std::sync::Arc;

use super::merge::{self, AbsorbReport};
use super::provenance::{DatasetId, PointRef, ProvenanceLedger};
use super::registry::DatasetRegistry;
use crate::config::EnvelopeOptions;
use crate::data::model::{Dataset, DatasetInfo};
use crate::error::{EnvelopeError, Result};
use crate::geometry::hull::ConvexHullEngine;
use crate::geometry::point::Point;

/// One dataset to replay into a fresh envelope.
#[derive(Debug, Clone)]
pub(crate) enum Seed {
    Resident(Arc<Dataset>),
    /// Placeholder for a dataset whose rows were dropped.
    Released(DatasetInfo),
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The convex hull of the `(xname, yname)` points of every ingested dataset,
/// with per-point provenance and dataset retention.
///
/// Invariant: the ledger has exactly one entry per buffered hull point, so a
/// vertex index addresses both the engine's buffer and the ledger.
#[derive(Debug, Clone)]
pub struct Envelope {
    xname: String,
    yname: String,
    name: String,
    description: String,
    options: EnvelopeOptions,
    engine: ConvexHullEngine,
    ledger: ProvenanceLedger,
    registry: DatasetRegistry,
}

impl Envelope {
    /// Build an envelope from at least one non-empty dataset.
    ///
    /// With `options.incremental` off, an envelope built from a single
    /// dataset is closed right away; several datasets force it open.
    pub fn new(
        xname: impl Into<String>,
        yname: impl Into<String>,
        datasets: impl IntoIterator<Item = Arc<Dataset>>,
        options: EnvelopeOptions,
    ) -> Result<Self> {
        let seeds: Vec<Seed> = datasets.into_iter().map(Seed::Resident).collect();
        let n_seeds = seeds.len();
        let mut envelope = Self::assemble(xname.into(), yname.into(), options, seeds)?;

        if !envelope.options.incremental {
            if n_seeds == 1 {
                envelope.close();
            } else {
                log::debug!("'{}': {n_seeds} datasets force incremental mode", envelope.name);
            }
        }
        Ok(envelope)
    }

    /// Replay `seeds` in order into an empty, open envelope.
    pub(crate) fn assemble(
        xname: String,
        yname: String,
        options: EnvelopeOptions,
        seeds: Vec<Seed>,
    ) -> Result<Self> {
        let has_points = seeds
            .iter()
            .any(|seed| matches!(seed, Seed::Resident(ds) if !ds.is_empty()));
        if !has_points {
            return Err(EnvelopeError::EmptyInput(
                "an envelope needs at least one non-empty dataset".into(),
            ));
        }

        let mut envelope = Self {
            name: format!("{yname} vs {xname}"),
            description: String::new(),
            engine: ConvexHullEngine::with_strategy(options.strategy),
            ledger: ProvenanceLedger::new(),
            registry: DatasetRegistry::new(options.keep_all, options.allow_overwrite),
            xname,
            yname,
            options,
        };

        for seed in seeds {
            match seed {
                Seed::Resident(ds) => {
                    envelope.add_dataset(ds)?;
                }
                Seed::Released(info) => {
                    envelope.registry.store_released(info)?;
                }
            }
        }
        Ok(envelope)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    // -- Ingestion ----------------------------------------------------------

    /// Append a dataset's points, recompute the hull and prune datasets that
    /// no longer touch it.
    ///
    /// All checks happen before anything is mutated, so a failed call leaves
    /// the envelope unchanged.
    pub fn add_dataset(&mut self, dataset: Arc<Dataset>) -> Result<DatasetId> {
        if self.engine.is_closed() {
            return Err(EnvelopeError::ClosedEngine);
        }
        self.registry.check_name(dataset.name())?;

        let xs = dataset.require_column(&self.xname)?;
        let ys = dataset.require_column(&self.yname)?;
        if xs.len() != ys.len() || xs.len() != dataset.row_ids().len() {
            return Err(EnvelopeError::DimensionMismatch {
                dataset: dataset.name().to_string(),
                column: self.yname.clone(),
                expected: xs.len(),
                found: ys.len(),
            });
        }
        let points: Vec<Point> = xs.iter().zip(ys).map(|(&x, &y)| Point::new(x, y)).collect();

        let start = self.engine.len();
        let id = self
            .registry
            .store(Arc::clone(&dataset), start..start + points.len())?;
        self.engine.add_points(&points)?;
        for &row in dataset.row_ids() {
            self.ledger.append(id, row);
        }
        debug_assert_eq!(self.ledger.len(), self.engine.len());

        let released = self
            .registry
            .release_if_unused(self.engine.vertices(), &mut self.ledger);
        log::debug!(
            "'{}': added '{}' ({} rows), {} vertices, {} dataset(s) released",
            self.name,
            dataset.name(),
            points.len(),
            self.engine.vertices().len(),
            released.len()
        );
        Ok(id)
    }

    /// Alias of [`add_dataset`](Self::add_dataset).
    pub fn add_run(&mut self, dataset: Arc<Dataset>) -> Result<DatasetId> {
        self.add_dataset(dataset)
    }

    /// Fold every resident dataset of `source` into this envelope.
    pub fn absorb(&mut self, source: &Envelope) -> Result<AbsorbReport> {
        merge::absorb(self, source)
    }

    /// Finalize the hull; later additions fail with `ClosedEngine`.
    pub fn close(&mut self) {
        self.engine.close();
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    // -- Display interface --------------------------------------------------

    /// Hull vertex indices; `closed` repeats the first vertex at the end.
    pub fn vertex_indices(&self, closed: bool) -> Vec<usize> {
        if closed {
            self.engine.closed_vertices()
        } else {
            self.engine.vertices().to_vec()
        }
    }

    pub fn get_envelope_points(&self, closed: bool) -> Vec<Point> {
        self.vertex_indices(closed)
            .into_iter()
            .filter_map(|v| self.engine.point(v))
            .collect()
    }

    pub fn get_envelope_refs(&self, closed: bool) -> Vec<PointRef> {
        self.vertex_indices(closed)
            .into_iter()
            .filter_map(|v| self.ledger.get(v))
            .collect()
    }

    /// The dataset behind every hull vertex.
    ///
    /// Fails with `DetachedDataset` if a vertex's dataset was released.
    pub fn get_envelope_runs(&self, closed: bool) -> Result<Vec<Arc<Dataset>>> {
        self.get_envelope_refs(closed)
            .into_iter()
            .map(|r| self.dataset_of(&r).map(Arc::clone))
            .collect()
    }

    pub fn envelope_x(&self, closed: bool) -> Vec<f64> {
        self.get_envelope_points(closed).iter().map(|p| p.x).collect()
    }

    pub fn envelope_y(&self, closed: bool) -> Vec<f64> {
        self.get_envelope_points(closed).iter().map(|p| p.y).collect()
    }

    /// Values of `columns` at the row behind each hull vertex, one inner
    /// vector per vertex.
    pub fn get_run_data(&self, columns: &[&str], closed: bool) -> Result<Vec<Vec<f64>>> {
        self.vertex_indices(closed)
            .into_iter()
            .map(|v| -> Result<Vec<f64>> {
                let r = self
                    .ledger
                    .get(v)
                    .ok_or_else(|| EnvelopeError::UnknownDataset(format!("point {v}")))?;
                let dataset = self.dataset_of(&r)?;
                let id = r.dataset_id().ok_or_else(|| detached(&r))?;
                let offset = v - self.registry.span(id).map_or(v, |span| span.start);
                columns
                    .iter()
                    .map(|c| -> Result<f64> { Ok(dataset.require_column(c)?[offset]) })
                    .collect()
            })
            .collect()
    }

    fn dataset_of(&self, r: &PointRef) -> Result<&Arc<Dataset>> {
        let id = r.dataset_id().ok_or_else(|| detached(r))?;
        self.registry.get(id)
    }

    /// Every dataset that was ever ingested, resident or not, in order.
    pub fn contributors(&self) -> Vec<&DatasetInfo> {
        self.registry.entries().map(|(_, e)| e.info()).collect()
    }

    // -- Accessors ----------------------------------------------------------

    pub fn xname(&self) -> &str {
        &self.xname
    }

    pub fn yname(&self) -> &str {
        &self.yname
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn options(&self) -> &EnvelopeOptions {
        &self.options
    }

    /// Whether later absorbs fail on datasets a source already released.
    pub fn set_strict_absorb(&mut self, strict: bool) {
        self.options.strict_absorb = strict;
    }

    pub fn engine(&self) -> &ConvexHullEngine {
        &self.engine
    }

    pub fn ledger(&self) -> &ProvenanceLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut DatasetRegistry {
        &mut self.registry
    }

    /// Number of buffered points.
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }
}

fn detached(r: &PointRef) -> EnvelopeError {
    EnvelopeError::DetachedDataset(format!("<detached> (row {})", r.row))
}
