use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use super::merge;
use super::model::Envelope;
use crate::config::{EnvelopeOptions, LoadOptions};
use crate::data::loader::load_file;
use crate::data::model::Dataset;
use crate::error::{EnvelopeError, Result};

/// Envelope of a single dataset. Shares nothing, so it can run on any thread.
///
/// Partial envelopes are always built open so they can take part in a merge.
pub fn build_partial_envelope(
    xname: &str,
    yname: &str,
    dataset: Arc<Dataset>,
    options: &EnvelopeOptions,
) -> Result<Envelope> {
    let options = options.clone().incremental(true);
    Envelope::new(xname, yname, [dataset], options)
}

/// Fold envelopes left to right into the first one.
///
/// Absorbs straight into the first envelope; on error it is dropped along
/// with whatever it had taken in.
pub fn merge_all(envelopes: Vec<Envelope>) -> Result<Envelope> {
    let mut iter = envelopes.into_iter();
    let mut merged = iter
        .next()
        .ok_or_else(|| EnvelopeError::EmptyInput("nothing to merge".into()))?;
    for envelope in iter {
        merge::absorb_into(&mut merged, &envelope)?;
    }
    Ok(merged)
}

/// Load every file and build its partial envelope in parallel, then merge
/// the partials in file order.
///
/// `threads = None` lets rayon pick one worker per core. `load.name` is only
/// honoured for a single file, since dataset names must be unique.
pub fn build_from_files(
    xname: &str,
    yname: &str,
    paths: &[PathBuf],
    load: &LoadOptions,
    options: &EnvelopeOptions,
    threads: Option<usize>,
) -> Result<Envelope> {
    if paths.is_empty() {
        return Err(EnvelopeError::EmptyInput("no input files".into()));
    }

    let mut load = load.clone();
    if paths.len() > 1 && load.name.take().is_some() {
        log::warn!("ignoring dataset name for {} files; using file paths", paths.len());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or(0))
        .build()?;
    log::info!(
        "building {} partial envelope(s) on {} thread(s)",
        paths.len(),
        pool.current_num_threads()
    );

    let partials: Vec<Envelope> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let dataset = load_file(path, &load)?;
                build_partial_envelope(xname, yname, Arc::new(dataset), options)
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let mut merged = merge_all(partials)?;
    if !options.incremental {
        merged.close();
    }
    Ok(merged)
}
