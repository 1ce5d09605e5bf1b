use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::hull::HullStrategy;

// ---------------------------------------------------------------------------
// Envelope options
// ---------------------------------------------------------------------------

/// Behavioural switches of an [`Envelope`](crate::envelope::Envelope).
///
/// Every field has a default, so a config file only needs to name the
/// switches it changes:
///
/// ```json
/// { "keep_all": true, "strategy": "full_rebuild" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeOptions {
    /// Never prune datasets, even when none of their rows lie on the hull.
    pub keep_all: bool,
    /// When false, an envelope built from a single dataset is closed for
    /// further additions right after construction.
    pub incremental: bool,
    /// Fail an absorb instead of skipping datasets the source already released.
    pub strict_absorb: bool,
    /// Allow a dataset name to be registered twice; the newer one wins lookups.
    pub allow_overwrite: bool,
    /// How the hull is recomputed after new points arrive.
    pub strategy: HullStrategy,
}

impl Default for EnvelopeOptions {
    fn default() -> Self {
        Self {
            keep_all: false,
            incremental: true,
            strict_absorb: false,
            allow_overwrite: false,
            strategy: HullStrategy::default(),
        }
    }
}

impl EnvelopeOptions {
    /// Read options from a JSON file. Missing fields fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let options = serde_json::from_str(&text)?;
        log::debug!("loaded envelope options from {}: {options:?}", path.display());
        Ok(options)
    }

    pub fn keep_all(mut self, keep_all: bool) -> Self {
        self.keep_all = keep_all;
        self
    }

    pub fn incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    pub fn strict_absorb(mut self, strict: bool) -> Self {
        self.strict_absorb = strict;
        self
    }

    pub fn allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    pub fn strategy(mut self, strategy: HullStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

// ---------------------------------------------------------------------------
// Load options
// ---------------------------------------------------------------------------

/// How a file is turned into a [`Dataset`](crate::data::model::Dataset).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Dataset name. Defaults to the absolute path of the file.
    pub name: Option<String>,
    pub description: String,
    /// Integer-valued column used as the row id. Row positions are used
    /// when absent.
    pub index_column: Option<String>,
}
