/// Envelope layer: hull + provenance + dataset retention.
///
/// ```text
///   Dataset ──add_dataset──► ConvexHullEngine ──vertices──┐
///      │                        (points)                  │
///      │                                                  ▼
///      └──────────────► ProvenanceLedger ──► DatasetRegistry
///                       point → (id, row)    release datasets off the hull
///
///   merge:    absorb(target, source)   replay source's resident datasets
///   persist:  Envelope ⇄ EnvelopeRecord (replay on decode)
///   parallel: per-file partial envelopes, folded with absorb
/// ```

pub mod merge;
pub mod model;
pub mod parallel;
pub mod persist;
pub mod provenance;
pub mod registry;
pub mod set;

pub use merge::{absorb, absorb_all, AbsorbReport};
pub use model::Envelope;
pub use parallel::{build_from_files, build_partial_envelope, merge_all};
pub use persist::{decode, encode, DatasetRecord, EnvelopeRecord};
pub use provenance::{DatasetId, DatasetRef, PointRef, ProvenanceLedger};
pub use registry::{DatasetEntry, DatasetRegistry};
pub use set::EnvelopeSet;
