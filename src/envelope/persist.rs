//! Envelope save/restore.
//!
//! The hull engine itself is never serialized. An envelope is stored as its
//! identity, its options and the ordered list of datasets it ingested;
//! loading replays that list through `add_dataset`, which rebuilds the hull,
//! the ledger and the registry exactly as they were.
//!
//! ```json
//! {
//!   "xname": "A", "yname": "B", "name": "B vs A", "description": "",
//!   "keep_all": false, "incremental": true, "closed": false,
//!   "datasets": [
//!     { "name": "run1", "description": "", "source_path": "/data/run1.csv",
//!       "resident": true,
//!       "rows": { "row_ids": [0, 1], "columns": [ { "name": "A", "values": [1.0, null] } ] } },
//!     { "name": "run2", "description": "", "source_path": null, "resident": false }
//!   ]
//! }
//! ```
//!
//! Non-finite cells are written as `null` (NaN), `"inf"` or `"-inf"`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::model::{Envelope, Seed};
use super::registry::DatasetEntry;
use crate::config::EnvelopeOptions;
use crate::data::filter::RowFilter;
use crate::data::model::{Dataset, DatasetInfo, RowId, Table};
use crate::error::{EnvelopeError, Result};
use crate::geometry::hull::HullStrategy;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Serializable snapshot of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeRecord {
    pub xname: String,
    pub yname: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub keep_all: bool,
    pub incremental: bool,
    #[serde(default)]
    pub strict_absorb: bool,
    #[serde(default)]
    pub allow_overwrite: bool,
    #[serde(default)]
    pub strategy: HullStrategy,
    #[serde(default)]
    pub closed: bool,
    pub datasets: Vec<DatasetRecord>,
}

/// One ingested dataset, in ingestion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_path: Option<PathBuf>,
    pub resident: bool,
    /// Present for resident datasets; may be absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<ColumnarRows>,
    /// Filters applied to a resident dataset, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<RowFilter>,
    /// Rows before the first filter. `rows` is recomputed from these on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unfiltered: Option<ColumnarRows>,
}

impl DatasetRecord {
    fn info(&self) -> DatasetInfo {
        DatasetInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            source_path: self.source_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnarRows {
    pub row_ids: Vec<RowId>,
    pub columns: Vec<ColumnRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub name: String,
    #[serde(with = "float_cells")]
    pub values: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

pub fn encode(envelope: &Envelope) -> EnvelopeRecord {
    let options = envelope.options();
    let datasets = envelope
        .registry()
        .entries()
        .map(|(_, entry)| match entry {
            DatasetEntry::Resident(ds) => dataset_record(ds),
            DatasetEntry::Released(info) => DatasetRecord {
                name: info.name.clone(),
                description: info.description.clone(),
                source_path: info.source_path.clone(),
                resident: false,
                rows: None,
                filters: Vec::new(),
                unfiltered: None,
            },
        })
        .collect();

    EnvelopeRecord {
        xname: envelope.xname().to_string(),
        yname: envelope.yname().to_string(),
        name: envelope.name().to_string(),
        description: envelope.description().to_string(),
        keep_all: options.keep_all,
        incremental: options.incremental,
        strict_absorb: options.strict_absorb,
        allow_overwrite: options.allow_overwrite,
        strategy: options.strategy,
        closed: envelope.is_closed(),
        datasets,
    }
}

fn dataset_record(ds: &Dataset) -> DatasetRecord {
    DatasetRecord {
        name: ds.info.name.clone(),
        description: ds.info.description.clone(),
        source_path: ds.info.source_path.clone(),
        resident: true,
        rows: Some(columnar_rows(ds)),
        filters: ds.filters().to_vec(),
        unfiltered: ds.unfiltered().map(columnar_rows),
    }
}

fn columnar_rows(ds: &Dataset) -> ColumnarRows {
    let columns = ds
        .column_names()
        .into_iter()
        .filter_map(|name| {
            let values = ds.column(&name)?.to_vec();
            Some(ColumnRecord { name, values })
        })
        .collect();
    ColumnarRows {
        row_ids: ds.row_ids().to_vec(),
        columns,
    }
}

fn dataset_from_rows(info: DatasetInfo, rows: ColumnarRows) -> Result<Dataset> {
    let columns = rows
        .columns
        .into_iter()
        .map(|c| (c.name, c.values))
        .collect();
    Dataset::new(info, columns, Some(rows.row_ids))
}

/// Rebuild a resident dataset, replaying its filters over the unfiltered
/// rows when a filter history was stored.
fn restore_dataset(record: DatasetRecord) -> Result<Dataset> {
    let info = record.info();
    let name = info.name.clone();
    let reconstruction =
        |e: EnvelopeError| EnvelopeError::Reconstruction(format!("dataset '{name}': {e}"));

    let rows = record.rows.ok_or_else(|| {
        EnvelopeError::Reconstruction(format!(
            "dataset '{name}' is marked resident but has no rows"
        ))
    })?;
    let Some(unfiltered) = record.unfiltered else {
        if !record.filters.is_empty() {
            log::warn!("dataset '{name}': filters stored without unfiltered rows; history dropped");
        }
        return dataset_from_rows(info, rows).map_err(reconstruction);
    };

    let mut dataset = dataset_from_rows(info, unfiltered).map_err(&reconstruction)?;
    for filter in record.filters {
        dataset.apply_filter(filter).map_err(&reconstruction)?;
    }
    if dataset.row_ids() != rows.row_ids.as_slice() {
        return Err(EnvelopeError::Reconstruction(format!(
            "dataset '{name}': stored filters do not reproduce the stored rows"
        )));
    }
    Ok(dataset)
}

/// Rebuild a live envelope by replaying the recorded datasets in order.
pub fn decode(record: EnvelopeRecord) -> Result<Envelope> {
    let mut seeds = Vec::with_capacity(record.datasets.len());
    for ds in record.datasets {
        if !ds.resident {
            if ds.rows.is_some() {
                log::debug!("ignoring stored rows of released dataset '{}'", ds.name);
            }
            seeds.push(Seed::Released(ds.info()));
            continue;
        }

        let name = ds.name.clone();
        let dataset = restore_dataset(ds)?;
        for axis in [&record.xname, &record.yname] {
            if dataset.column(axis).is_none() {
                return Err(EnvelopeError::Reconstruction(format!(
                    "dataset '{name}' lacks axis column '{axis}'"
                )));
            }
        }
        seeds.push(Seed::Resident(Arc::new(dataset)));
    }

    let options = EnvelopeOptions {
        keep_all: record.keep_all,
        incremental: record.incremental,
        strict_absorb: record.strict_absorb,
        allow_overwrite: record.allow_overwrite,
        strategy: record.strategy,
    };
    let mut envelope = Envelope::assemble(record.xname, record.yname, options, seeds)
        .map_err(|e| match e {
            EnvelopeError::EmptyInput(msg) => EnvelopeError::Reconstruction(msg),
            other => other,
        })?
        .with_name(record.name)
        .with_description(record.description);
    if record.closed {
        envelope.close();
    }
    Ok(envelope)
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Write an envelope as pretty-printed JSON.
pub fn save(envelope: &Envelope, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &encode(envelope))?;
    writer.flush()?;
    log::info!("saved envelope '{}' to {}", envelope.name(), path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<Envelope> {
    let reader = BufReader::new(File::open(path)?);
    let record: EnvelopeRecord = serde_json::from_reader(reader)?;
    let envelope = decode(record)?;
    log::info!("loaded envelope '{}' from {}", envelope.name(), path.display());
    Ok(envelope)
}

/// Write the closed hull outline with each vertex's provenance.
///
/// Columns: `x, y, dataset, row`. `dataset` is empty for detached vertices.
pub fn write_perimeter_csv(envelope: &Envelope, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([envelope.xname(), envelope.yname(), "dataset", "row"])?;
    for (point, r) in envelope
        .get_envelope_points(true)
        .into_iter()
        .zip(envelope.get_envelope_refs(true))
    {
        let dataset = r
            .dataset_id()
            .and_then(|id| envelope.registry().entry(id))
            .map(|e| e.info().name.clone())
            .unwrap_or_default();
        writer.write_record([
            point.x.to_string(),
            point.y.to_string(),
            dataset,
            r.row.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Non-finite floats in JSON
// ---------------------------------------------------------------------------

mod float_cells {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Number(f64),
        Text(String),
        Null,
    }

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|&v| {
            if v.is_nan() {
                Cell::Null
            } else if v == f64::INFINITY {
                Cell::Text("inf".into())
            } else if v == f64::NEG_INFINITY {
                Cell::Text("-inf".into())
            } else {
                Cell::Number(v)
            }
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<Cell>::deserialize(deserializer)?
            .into_iter()
            .map(|cell| match cell {
                Cell::Number(v) => Ok(v),
                Cell::Null => Ok(f64::NAN),
                Cell::Text(t) => match t.as_str() {
                    "inf" => Ok(f64::INFINITY),
                    "-inf" => Ok(f64::NEG_INFINITY),
                    "nan" => Ok(f64::NAN),
                    other => Err(D::Error::custom(format!("not a number: '{other}'"))),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn dataset(name: &str, points: &[(f64, f64)]) -> Arc<Dataset> {
        Arc::new(
            Dataset::new(
                DatasetInfo::new(name).with_source_path(format!("/data/{name}.csv")),
                vec![
                    ("x".into(), points.iter().map(|p| p.0).collect()),
                    ("y".into(), points.iter().map(|p| p.1).collect()),
                ],
                None,
            )
            .unwrap(),
        )
    }

    fn pruned_envelope() -> Envelope {
        Envelope::new(
            "x",
            "y",
            vec![
                dataset("inner", &[(0.2, 0.2)]),
                dataset("outer", &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]),
            ],
            EnvelopeOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn released_datasets_are_written_without_rows() {
        let record = encode(&pruned_envelope());
        assert_eq!(record.datasets.len(), 2);
        assert!(!record.datasets[0].resident);
        assert!(record.datasets[0].rows.is_none());
        assert!(record.datasets[1].resident);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json["datasets"][0].get("rows").is_none());
    }

    #[test]
    fn decode_keeps_placeholder_order() {
        let env = decode(encode(&pruned_envelope())).unwrap();
        let names: Vec<String> = env.contributors().iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec!["inner".to_string(), "outer".to_string()]);
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn resident_without_rows_is_a_reconstruction_error() {
        let mut record = encode(&pruned_envelope());
        record.datasets[1].rows = None;
        assert!(matches!(decode(record), Err(EnvelopeError::Reconstruction(_))));
    }

    #[test]
    fn only_released_datasets_cannot_seed_a_hull() {
        let mut record = encode(&pruned_envelope());
        record.datasets.remove(1);
        assert!(matches!(decode(record), Err(EnvelopeError::Reconstruction(_))));
    }

    #[test]
    fn missing_axis_column_is_a_reconstruction_error() {
        let mut record = encode(&pruned_envelope());
        record.xname = "q".into();
        assert!(matches!(decode(record), Err(EnvelopeError::Reconstruction(_))));
    }

    #[test]
    fn legacy_record_without_optional_fields_loads() {
        let json = r#"{
            "xname": "x", "yname": "y", "name": "old",
            "keep_all": false, "incremental": true,
            "datasets": [
                { "name": "gone", "resident": false },
                { "name": "kept", "resident": true,
                  "rows": { "row_ids": [4, 5], "columns": [
                      { "name": "x", "values": [0.0, 1.0] },
                      { "name": "y", "values": [0.0, null] } ] } }
            ]
        }"#;
        let record: EnvelopeRecord = serde_json::from_str(json).unwrap();
        let env = decode(record).unwrap();
        assert_eq!(env.name(), "old");
        assert_eq!(env.engine().vertices(), &[0]);
        assert_eq!(env.get_envelope_refs(false)[0].row, 4);
    }

    #[test]
    fn filter_history_is_written_only_for_filtered_datasets() {
        let mut filtered = Dataset::new(
            DatasetInfo::new("filtered"),
            vec![
                ("x".into(), vec![0.0, 1.0, 0.0, 40.0]),
                ("y".into(), vec![0.0, 0.0, 1.0, 40.0]),
            ],
            None,
        )
        .unwrap();
        filtered
            .apply_filter(RowFilter::Exclude { row_ids: [3].into() })
            .unwrap();
        let env = Envelope::new(
            "x",
            "y",
            vec![dataset("plain", &[(5.0, 5.0)]), Arc::new(filtered)],
            EnvelopeOptions::default().keep_all(true),
        )
        .unwrap();

        let record = encode(&env);
        assert!(record.datasets[0].filters.is_empty());
        assert!(record.datasets[0].unfiltered.is_none());
        assert_eq!(record.datasets[1].filters.len(), 1);
        assert_eq!(record.datasets[1].unfiltered.as_ref().unwrap().row_ids, vec![0, 1, 2, 3]);
        assert_eq!(record.datasets[1].rows.as_ref().unwrap().row_ids, vec![0, 1, 2]);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json["datasets"][0].get("filters").is_none());
        assert_eq!(json["datasets"][1]["filters"][0]["kind"], "exclude");
    }

    #[test]
    fn inconsistent_filter_history_is_a_reconstruction_error() {
        let mut filtered = Dataset::new(
            DatasetInfo::new("filtered"),
            vec![("x".into(), vec![0.0, 1.0, 2.0]), ("y".into(), vec![0.0, 1.0, 0.0])],
            None,
        )
        .unwrap();
        filtered
            .apply_filter(RowFilter::Range { column: "x".into(), min: None, max: Some(1.5) })
            .unwrap();
        let env = Envelope::new("x", "y", vec![Arc::new(filtered)], EnvelopeOptions::default())
            .unwrap();

        let mut record = encode(&env);
        record.datasets[0].filters.clear();
        let err = decode(record).unwrap_err();
        assert!(matches!(err, EnvelopeError::Reconstruction(msg) if msg.contains("filtered")));
    }

    #[test]
    fn non_finite_cells_survive_json() {
        let column = ColumnRecord {
            name: "v".into(),
            values: vec![1.5, f64::INFINITY, f64::NEG_INFINITY, f64::NAN],
        };
        let json = serde_json::to_string(&column).unwrap();
        assert_eq!(json, r#"{"name":"v","values":[1.5,"inf","-inf",null]}"#);

        let back: ColumnRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(&back.values[..3], &[1.5, f64::INFINITY, f64::NEG_INFINITY]);
        assert!(back.values[3].is_nan());
    }

    #[test]
    fn closed_flag_is_restored() {
        let mut env = pruned_envelope();
        env.close();
        let restored = decode(encode(&env)).unwrap();
        assert!(restored.is_closed());
    }

    #[test]
    fn perimeter_csv_lists_closed_outline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perimeter.csv");
        write_perimeter_csv(&pruned_envelope(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "x,y,dataset,row");
        assert_eq!(lines[1], "0,0,outer,0");
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], lines[4]);
    }
}
