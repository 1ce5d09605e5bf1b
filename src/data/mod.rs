/// Data layer: tables, loading, and row filtering.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset   │  named f64 columns, row ids, DatasetInfo
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  row predicates → kept rows (undoable)
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
