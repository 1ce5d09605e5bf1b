use thiserror::Error;

pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// Errors raised by the envelope engine and its data layer.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// No non-empty dataset (or no point at all) was supplied to a constructor.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Dataset name already registered: {0}")]
    DuplicateName(String),

    #[error("Dataset '{dataset}': column '{column}' has {found} rows, expected {expected}")]
    DimensionMismatch {
        dataset: String,
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Hull engine is closed; no more points can be added")]
    ClosedEngine,

    /// The dataset was pruned from the registry and only its metadata remains.
    #[error("Dataset '{0}' was released and its rows are no longer resident")]
    DetachedDataset(String),

    #[error("Cannot reconstruct envelope: {0}")]
    Reconstruction(String),

    #[error("Dataset '{dataset}' has no column '{column}'")]
    MissingColumn { dataset: String, column: String },

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Failed to load dataset: {0:#}")]
    Load(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
