//! Incrementally maintained 2D convex hull envelopes over named tabular
//! datasets, with per-point provenance and dataset retention.

pub mod config;
pub mod data;
pub mod envelope;
pub mod error;
pub mod geometry;

pub use config::{EnvelopeOptions, LoadOptions};
pub use data::model::{Dataset, DatasetInfo, RowId, Table};
pub use envelope::{Envelope, EnvelopeSet};
pub use error::{EnvelopeError, Result};
pub use geometry::hull::{ConvexHullEngine, HullStrategy};
pub use geometry::point::Point;
