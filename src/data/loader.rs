use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Dataset, DatasetInfo, RowId, Table};
use crate::config::LoadOptions;
use crate::error::Result;

/// Columns as read from a file, before the index column is split off.
type RawColumns = Vec<(String, Vec<f64>)>;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one numeric column per field
/// * `.json`    – `[{ "A": 1.0, "B": 2.0 }, ...]` or `{ "A": [...], "B": [...] }`
/// * `.parquet` – flat numeric columns (Float64/Float32/Int64/Int32)
///
/// Columns that are not numeric are skipped.
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut columns = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => return Err(anyhow::anyhow!("Unsupported file extension: .{other}").into()),
    };

    let row_ids = match &options.index_column {
        Some(index) => Some(split_index_column(&mut columns, index)?),
        None => None,
    };

    let source = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let name = options
        .name
        .clone()
        .unwrap_or_else(|| source.display().to_string());
    let info = DatasetInfo::new(name)
        .with_description(options.description.clone())
        .with_source_path(source);

    let dataset = Dataset::new(info, columns, row_ids)?;
    log::info!(
        "loaded '{}': {} rows, columns {:?}",
        dataset.name(),
        dataset.len(),
        dataset.column_names()
    );
    Ok(dataset)
}

fn split_index_column(columns: &mut RawColumns, index: &str) -> anyhow::Result<Vec<RowId>> {
    let pos = columns
        .iter()
        .position(|(name, _)| name == index)
        .with_context(|| format!("index column '{index}' not found"))?;
    let (_, values) = columns.remove(pos);
    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            if !v.is_finite() || v.fract() != 0.0 {
                bail!("Row {row}: index value {v} is not an integer")
            }
            // `RowId::MAX as f64` rounds up to 2^63, which is itself out of range.
            if v < RowId::MIN as f64 || v >= RowId::MAX as f64 {
                bail!("Row {row}: index value {v} does not fit a 64-bit row id")
            }
            Ok(v as RowId)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one number per cell.
/// Empty cells read as NaN. A column with any non-numeric cell is skipped.
fn load_csv(path: &Path) -> anyhow::Result<RawColumns> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut values: Vec<Option<Vec<f64>>> = vec![Some(Vec::new()); headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, slot) in values.iter_mut().enumerate() {
            let Some(column) = slot else { continue };
            let cell = record.get(col_idx).unwrap_or("").trim();
            match parse_cell(cell) {
                Some(v) => column.push(v),
                None => {
                    log::debug!(
                        "CSV column '{}' is not numeric (row {row_no}: '{cell}'), skipping",
                        headers[col_idx]
                    );
                    *slot = None;
                }
            }
        }
    }

    Ok(headers
        .into_iter()
        .zip(values)
        .filter_map(|(name, column)| column.map(|c| (name, c)))
        .collect())
}

fn parse_cell(s: &str) -> Option<f64> {
    if s.is_empty() {
        return Some(f64::NAN);
    }
    s.parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Two layouts are accepted:
///
/// ```json
/// [ { "A": 1.0, "B": 2.0 }, { "A": 3.0, "B": 4.0 } ]
/// ```
///
/// ```json
/// { "A": [1.0, 3.0], "B": [2.0, 4.0] }
/// ```
///
/// `null` reads as NaN.
fn load_json(path: &Path) -> anyhow::Result<RawColumns> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    match root {
        JsonValue::Array(records) => json_records(&records),
        JsonValue::Object(columns) => columns
            .into_iter()
            .filter_map(|(name, value)| {
                let JsonValue::Array(cells) = value else {
                    log::debug!("JSON field '{name}' is not an array, skipping");
                    return None;
                };
                let parsed: Option<Vec<f64>> = cells.iter().map(json_number).collect();
                match parsed {
                    Some(values) => Some(Ok((name, values))),
                    None => {
                        log::debug!("JSON column '{name}' is not numeric, skipping");
                        None
                    }
                }
            })
            .collect(),
        _ => bail!("Expected a JSON array of records or an object of columns"),
    }
}

fn json_records(records: &[JsonValue]) -> anyhow::Result<RawColumns> {
    let first = match records.first() {
        Some(rec) => rec.as_object().context("Row 0 is not a JSON object")?,
        None => return Ok(Vec::new()),
    };

    let mut columns: Vec<(String, Option<Vec<f64>>)> = first
        .keys()
        .map(|k| (k.clone(), Some(Vec::with_capacity(records.len()))))
        .collect();

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for (name, slot) in columns.iter_mut() {
            let Some(values) = slot else { continue };
            match obj.get(name.as_str()).and_then(json_number) {
                Some(v) => values.push(v),
                None => {
                    log::debug!("JSON column '{name}' is not numeric at row {i}, skipping");
                    *slot = None;
                }
            }
        }
    }

    Ok(columns
        .into_iter()
        .filter_map(|(name, values)| values.map(|v| (name, v)))
        .collect())
}

fn json_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Null => Some(f64::NAN),
        other => other.as_f64(),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat numeric columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Nulls read as NaN.
fn load_parquet(path: &Path) -> anyhow::Result<RawColumns> {
    let file = File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;

    // Decide the numeric columns from the schema once, so every batch agrees.
    let mut columns: RawColumns = builder
        .schema()
        .fields()
        .iter()
        .filter(|f| is_numeric(f.data_type()))
        .map(|f| (f.name().clone(), Vec::new()))
        .collect();

    let reader = builder.build().context("building parquet reader")?;
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        for (name, values) in columns.iter_mut() {
            let idx = schema
                .index_of(name)
                .with_context(|| format!("Parquet batch missing '{name}' column"))?;
            extend_f64(values, batch.column(idx))
                .with_context(|| format!("reading column '{name}'"))?;
        }
    }

    Ok(columns)
}

fn is_numeric(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32
    )
}

/// Append a numeric Arrow column to `out` as `f64`.
fn extend_f64(out: &mut Vec<f64>, col: &Arc<dyn Array>) -> anyhow::Result<()> {
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        out.extend(arr.iter().map(|v| v.unwrap_or(f64::NAN)));
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        out.extend(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)));
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        out.extend(arr.iter().map(|v| v.map_or(f64::NAN, |i| i as f64)));
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        out.extend(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)));
    } else {
        bail!("Expected a numeric column, got {:?}", col.data_type());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnvelopeError;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn csv_skips_text_columns_and_reads_blanks_as_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "run.csv", "A,B,label\n1,2,x\n3,,y\n");

        let ds = load_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!(ds.column_names(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(ds.column("A"), Some(&[1.0, 3.0][..]));
        assert!(ds.column("B").unwrap()[1].is_nan());
        assert_eq!(ds.info.source_path.as_deref(), Some(std::fs::canonicalize(&path).unwrap().as_path()));
    }

    #[test]
    fn index_column_becomes_row_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "run.csv", "id,A,B\n7,1,2\n9,3,4\n");
        let options = LoadOptions {
            name: Some("run".into()),
            index_column: Some("id".into()),
            ..LoadOptions::default()
        };

        let ds = load_file(&path, &options).unwrap();
        assert_eq!(ds.name(), "run");
        assert_eq!(ds.row_ids(), &[7, 9]);
        assert!(ds.column("id").is_none());
    }

    #[test]
    fn fractional_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "run.csv", "id,A\n0.5,1\n");
        let options = LoadOptions {
            index_column: Some("id".into()),
            ..LoadOptions::default()
        };
        assert!(matches!(load_file(&path, &options), Err(EnvelopeError::Load(_))));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let options = LoadOptions {
            index_column: Some("id".into()),
            ..LoadOptions::default()
        };

        let path = write(&dir, "huge.csv", "id,A\n1e19,1\n");
        assert!(matches!(load_file(&path, &options), Err(EnvelopeError::Load(_))));

        let path = write(&dir, "edge.csv", "id,A\n9223372036854775808,1\n");
        assert!(matches!(load_file(&path, &options), Err(EnvelopeError::Load(_))));

        let path = write(&dir, "low.csv", "id,A\n-9223372036854775808,1\n");
        assert_eq!(load_file(&path, &options).unwrap().row_ids(), &[RowId::MIN]);
    }

    #[test]
    fn json_records_and_columns_agree() {
        let dir = tempfile::tempdir().unwrap();
        let records = write(&dir, "records.json", r#"[{"A": 1, "B": 2.5}, {"A": 3, "B": null}]"#);
        let columns = write(&dir, "columns.json", r#"{"A": [1, 3], "B": [2.5, null], "tag": "x"}"#);

        let a = load_file(&records, &LoadOptions::default()).unwrap();
        let b = load_file(&columns, &LoadOptions::default()).unwrap();
        assert_eq!(a.column("A"), b.column("A"));
        assert_eq!(a.len(), 2);
        assert!(b.column("B").unwrap()[1].is_nan());
        assert!(b.column("tag").is_none());
    }

    #[test]
    fn unknown_extension_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "run.txt", "A\n1\n");
        assert!(matches!(
            load_file(&path, &LoadOptions::default()),
            Err(EnvelopeError::Load(_))
        ));
    }
}
