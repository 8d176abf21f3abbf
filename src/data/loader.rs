use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use log::{info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{MeasurementRecord, RecordType, RunData, Value};

/// Column names of the long-format export, as the instrument software
/// writes them.
pub const COL_LABEL: &str = "Solution Label";
pub const COL_ELEMENT: &str = "Element";
pub const COL_TYPE: &str = "Type";
pub const COL_VALUE: &str = "Corr Con";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a long-format instrument export.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with `Solution Label`, `Element`, `Type`,
///                `Corr Con` columns; other columns are ignored
/// * `.json`    – `[{ "Solution Label": ..., "Element": ..., ... }, ...]`
/// * `.parquet` – scalar columns with the same names
///
/// The `Type` column is optional; rows without it are treated as samples.
/// Malformed or empty concentration cells become [`Value::Missing`] and
/// never abort the load.
pub fn load_file(path: &Path) -> Result<RunData> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let run = match ext.as_str() {
        "csv" => {
            let file = std::fs::File::open(path).context("opening CSV")?;
            load_csv(file)?
        }
        "json" => {
            let text = std::fs::read_to_string(path).context("reading JSON file")?;
            load_json(&text)?
        }
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    info!(
        "loaded {} records ({} labels, {} elements) from {}",
        run.len(),
        run.labels.len(),
        run.elements.len(),
        path.display()
    );
    Ok(run)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: one reading per row, header row with column names.
/// Reads from any `Read` so tests can feed in-memory data.
pub fn load_csv<R: Read>(input: R) -> Result<RunData> {
    let mut reader = csv::Reader::from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let label_idx = headers
        .iter()
        .position(|h| h == COL_LABEL)
        .with_context(|| format!("CSV missing '{COL_LABEL}' column"))?;
    let element_idx = headers
        .iter()
        .position(|h| h == COL_ELEMENT)
        .with_context(|| format!("CSV missing '{COL_ELEMENT}' column"))?;
    let value_idx = headers
        .iter()
        .position(|h| h == COL_VALUE)
        .with_context(|| format!("CSV missing '{COL_VALUE}' column"))?;
    let type_idx = headers.iter().position(|h| h == COL_TYPE);

    let mut records = Vec::new();
    let mut missing_count = 0usize;

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let value = Value::parse(record.get(value_idx).unwrap_or(""));
        if value.is_missing() {
            missing_count += 1;
        }
        let record_type = match type_idx {
            Some(i) => RecordType::parse(record.get(i).unwrap_or("")),
            None => RecordType::Sample,
        };

        records.push(MeasurementRecord {
            sample_label: record.get(label_idx).unwrap_or("").trim().to_string(),
            element: record.get(element_idx).unwrap_or("").trim().to_string(),
            value,
            record_type,
            sequence_index: row_no,
        });
    }

    if missing_count > 0 {
        warn!("{missing_count} empty or non-numeric concentration cells kept as missing");
    }
    Ok(RunData::from_records(records))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, one object per reading):
///
/// ```json
/// [
///   {
///     "Solution Label": "S-001",
///     "Element": "Fe",
///     "Type": "Samp",
///     "Corr Con": 1.52
///   },
///   ...
/// ]
/// ```
pub fn load_json(text: &str) -> Result<RunData> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array")?;

    let mut records = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let sample_label = obj
            .get(COL_LABEL)
            .and_then(|v| v.as_str())
            .with_context(|| format!("Row {i}: missing or non-string '{COL_LABEL}'"))?
            .trim()
            .to_string();
        let element = obj
            .get(COL_ELEMENT)
            .and_then(|v| v.as_str())
            .with_context(|| format!("Row {i}: missing or non-string '{COL_ELEMENT}'"))?
            .trim()
            .to_string();

        let record_type = match obj.get(COL_TYPE).and_then(|v| v.as_str()) {
            Some(s) => RecordType::parse(s),
            None => RecordType::Sample,
        };

        records.push(MeasurementRecord {
            sample_label,
            element,
            value: json_to_value(obj.get(COL_VALUE)),
            record_type,
            sequence_index: i,
        });
    }

    Ok(RunData::from_records(records))
}

fn json_to_value(val: Option<&JsonValue>) -> Value {
    match val {
        Some(JsonValue::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() => Value::Number(f),
            _ => Value::Missing,
        },
        Some(JsonValue::String(s)) => Value::parse(s),
        Some(JsonValue::Null) | None => Value::Missing,
        Some(other) => Value::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet long export.
///
/// Expected schema: scalar columns named as in the CSV layout — Utf8
/// label/element/type, numeric (or Utf8) concentration. Works with files
/// written by both **Pandas** (`df.to_parquet()`) and **Polars**
/// (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<RunData> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();
    let mut seq = 0usize;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let label_idx = schema
            .index_of(COL_LABEL)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{COL_LABEL}' column"))?;
        let element_idx = schema
            .index_of(COL_ELEMENT)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{COL_ELEMENT}' column"))?;
        let value_idx = schema
            .index_of(COL_VALUE)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{COL_VALUE}' column"))?;
        let type_idx = schema.index_of(COL_TYPE).ok();

        let label_col = batch.column(label_idx);
        let element_col = batch.column(element_idx);
        let value_col = batch.column(value_idx);

        for row in 0..batch.num_rows() {
            let sample_label = extract_string(label_col, row)
                .with_context(|| format!("Row {seq}: failed to read '{COL_LABEL}'"))?;
            let element = extract_string(element_col, row)
                .with_context(|| format!("Row {seq}: failed to read '{COL_ELEMENT}'"))?;
            let record_type = match type_idx {
                Some(i) => match extract_string(batch.column(i), row) {
                    Ok(s) => RecordType::parse(&s),
                    Err(_) => RecordType::Sample,
                },
                None => RecordType::Sample,
            };

            records.push(MeasurementRecord {
                sample_label: sample_label.trim().to_string(),
                element: element.trim().to_string(),
                value: extract_value(value_col, row),
                record_type,
                sequence_index: seq,
            });
            seq += 1;
        }
    }

    Ok(RunData::from_records(records))
}

// -- Parquet / Arrow helpers --

/// Extract a string cell from a Utf8 column at the given row.
fn extract_string(col: &Arc<dyn Array>, row: usize) -> Result<String> {
    if col.is_null(row) {
        bail!("null value in string column");
    }
    match col.data_type() {
        DataType::Utf8 => {
            let arr = col
                .as_any()
                .downcast_ref::<StringArray>()
                .context("expected StringArray")?;
            Ok(arr.value(row).to_string())
        }
        // Polars writes large_string by default
        DataType::LargeUtf8 => Ok(col.as_string::<i64>().value(row).to_string()),
        other => bail!("Expected Utf8 column, got {other:?}"),
    }
}

/// Extract a concentration cell, tolerating the numeric types Pandas and
/// Polars emit plus string columns from instruments that mix text flags
/// into the value column.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Missing;
    }
    match col.data_type() {
        DataType::Float64 => {
            let arr = col.as_any().downcast_ref::<Float64Array>().unwrap();
            let v = arr.value(row);
            if v.is_finite() {
                Value::Number(v)
            } else {
                Value::Missing
            }
        }
        DataType::Float32 => {
            let arr = col.as_any().downcast_ref::<Float32Array>().unwrap();
            let v = arr.value(row) as f64;
            if v.is_finite() {
                Value::Number(v)
            } else {
                Value::Missing
            }
        }
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>().unwrap();
            Value::Number(arr.value(row) as f64)
        }
        DataType::Int32 => {
            let arr = col.as_any().downcast_ref::<Int32Array>().unwrap();
            Value::Number(arr.value(row) as f64)
        }
        DataType::Utf8 => {
            let arr = col.as_any().downcast_ref::<StringArray>().unwrap();
            Value::parse(arr.value(row))
        }
        DataType::LargeUtf8 => Value::parse(col.as_string::<i64>().value(row)),
        other => {
            warn!("unsupported value column type {other:?}, treating as missing");
            Value::Missing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_long_export() {
        let data = "\
Solution Label,Type,Element,Corr Con
Cal Blank,Blk,Fe,0.001
S-001,Samp,Fe,1.25
S-001,Samp,Cu,0.44
S-001,Samp,Zn,
";
        let run = load_csv(data.as_bytes()).unwrap();
        assert_eq!(run.len(), 4);
        assert_eq!(run.records[0].record_type, RecordType::Blank);
        assert_eq!(run.records[1].value, Value::Number(1.25));
        // empty cell survives as an explicit missing value
        assert_eq!(run.records[3].value, Value::Missing);
        assert_eq!(run.labels, vec!["Cal Blank".to_string(), "S-001".to_string()]);
    }

    #[test]
    fn csv_missing_required_header() {
        let data = "Solution Label,Type,Corr Con\nS-001,Samp,1.0\n";
        let err = load_csv(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains(COL_ELEMENT));
    }

    #[test]
    fn csv_without_type_column_defaults_to_sample() {
        let data = "Solution Label,Element,Corr Con\nS-001,Fe,1.0\n";
        let run = load_csv(data.as_bytes()).unwrap();
        assert_eq!(run.records[0].record_type, RecordType::Sample);
    }

    #[test]
    fn csv_non_numeric_value_kept_as_text() {
        let data = "Solution Label,Element,Corr Con\nS-001,Fe,OVERRANGE\n";
        let run = load_csv(data.as_bytes()).unwrap();
        assert_eq!(run.records[0].value, Value::Text("OVERRANGE".into()));
    }

    #[test]
    fn json_records_orientation() {
        let text = r#"[
            {"Solution Label": "S-001", "Element": "Fe", "Type": "Samp", "Corr Con": 1.5},
            {"Solution Label": "S-001", "Element": "Cu", "Type": "Samp", "Corr Con": null},
            {"Solution Label": "QC CRM", "Element": "Fe", "Type": "Samp", "Corr Con": "0.9"}
        ]"#;
        let run = load_json(text).unwrap();
        assert_eq!(run.len(), 3);
        assert_eq!(run.records[0].value, Value::Number(1.5));
        assert_eq!(run.records[1].value, Value::Missing);
        assert_eq!(run.records[2].value, Value::Number(0.9));
    }

    #[test]
    fn json_rejects_non_array_root() {
        assert!(load_json(r#"{"Solution Label": "S-001"}"#).is_err());
    }

    #[test]
    fn json_missing_label_fails_fast() {
        let text = r#"[{"Element": "Fe", "Corr Con": 1.0}]"#;
        let err = load_json(text).unwrap_err();
        assert!(err.to_string().contains(COL_LABEL));
    }
}
