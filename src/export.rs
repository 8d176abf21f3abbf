use std::io::Write;

use anyhow::{Context, Result};
use serde_json::{json, Map, Value as JsonValue};

use crate::data::model::{Value, LABEL_COLUMN};
use crate::pivot::engine::{PivotRow, WideTable};

// ---------------------------------------------------------------------------
// Wide-table writers
// ---------------------------------------------------------------------------

/// Label shown for a row: bare for the first occurrence, `"S1 (2)"` for
/// later repeat sets when suffixing is requested.
pub fn display_label(row: &PivotRow, suffix_replicates: bool) -> String {
    if suffix_replicates && row.replicate > 0 {
        format!("{} ({})", row.sample_label, row.replicate + 1)
    } else {
        row.sample_label.clone()
    }
}

/// Write the wide table as CSV. Column order is the table's authoritative
/// order; `Missing` cells become empty fields.
pub fn write_csv<W: Write>(table: &WideTable, out: W, suffix_replicates: bool) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    writer
        .write_record(&table.columns)
        .context("writing CSV header")?;

    for row in &table.rows {
        let mut fields = Vec::with_capacity(table.columns.len());
        fields.push(display_label(row, suffix_replicates));
        for col in table.columns.iter().skip(1) {
            let cell = row.cells.get(col).unwrap_or(&Value::Missing);
            fields.push(cell.to_string());
        }
        writer.write_record(&fields).context("writing CSV row")?;
    }

    writer.flush().context("flushing CSV output")?;
    Ok(())
}

/// Write the wide table as a records-oriented JSON array, symmetric with
/// the JSON loader. `Missing` cells become `null`.
pub fn write_json<W: Write>(table: &WideTable, out: W) -> Result<()> {
    let rows: Vec<JsonValue> = table
        .rows
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            obj.insert(LABEL_COLUMN.to_string(), json!(row.sample_label));
            for col in table.columns.iter().skip(1) {
                let cell = match row.cells.get(col) {
                    Some(Value::Number(v)) => json!(v),
                    Some(Value::Text(s)) => json!(s),
                    Some(Value::Missing) | None => JsonValue::Null,
                };
                obj.insert(col.clone(), cell);
            }
            JsonValue::Object(obj)
        })
        .collect();

    serde_json::to_writer_pretty(out, &rows).context("writing JSON output")?;
    Ok(())
}
