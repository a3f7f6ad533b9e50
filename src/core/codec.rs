//! Serialization of extracted tables for the raw zone.
//!
//! Tabular artifacts are Snappy-compressed Parquet. Column types are inferred
//! from the JSON values: integers become `Int64`, mixed integer/float columns
//! become `Float64`, booleans stay `Boolean`, everything else (including nested
//! values, rendered as JSON text) becomes nullable `Utf8`.

use crate::domain::model::Table;
use crate::utils::error::{EtlError, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

fn kind_of(value: &Value) -> ColumnKind {
    match value {
        Value::Number(n) if n.is_i64() => ColumnKind::Int,
        Value::Number(_) => ColumnKind::Float,
        Value::Bool(_) => ColumnKind::Bool,
        _ => ColumnKind::Text,
    }
}

fn infer_column_kind(table: &Table, column: &str) -> ColumnKind {
    let mut inferred: Option<ColumnKind> = None;

    for value in table.records.iter().filter_map(|r| r.get(column)) {
        if value.is_null() {
            continue;
        }
        let kind = kind_of(value);
        inferred = Some(match (inferred, kind) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Int) => ColumnKind::Float,
            _ => ColumnKind::Text,
        });
        if inferred == Some(ColumnKind::Text) {
            break;
        }
    }

    inferred.unwrap_or(ColumnKind::Text)
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn build_column(table: &Table, column: &str) -> (Field, ArrayRef) {
    let values = table.records.iter().map(|r| r.get(column));

    match infer_column_kind(table, column) {
        ColumnKind::Int => {
            let array: Int64Array = values.map(|v| v.and_then(Value::as_i64)).collect();
            (Field::new(column, DataType::Int64, true), Arc::new(array))
        }
        ColumnKind::Float => {
            let array: Float64Array = values.map(|v| v.and_then(Value::as_f64)).collect();
            (Field::new(column, DataType::Float64, true), Arc::new(array))
        }
        ColumnKind::Bool => {
            let array: BooleanArray = values.map(|v| v.and_then(Value::as_bool)).collect();
            (Field::new(column, DataType::Boolean, true), Arc::new(array))
        }
        ColumnKind::Text => {
            let array: StringArray = values.map(|v| v.and_then(text_of)).collect();
            (Field::new(column, DataType::Utf8, true), Arc::new(array))
        }
    }
}

/// Encodes a table as Parquet; `row_group_size` caps rows per row group.
///
/// A table needs at least one column: Parquet readers reject an empty schema.
pub fn encode_parquet(table: &Table, row_group_size: usize) -> Result<Vec<u8>> {
    if table.columns.is_empty() {
        return Err(EtlError::processing(
            "a table without columns cannot be encoded as Parquet",
        ));
    }

    let (fields, columns): (Vec<Field>, Vec<ArrayRef>) = table
        .columns
        .iter()
        .map(|c| build_column(table, c))
        .unzip();
    let schema = Arc::new(Schema::new(fields));

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(row_group_size.max(1))
        .build();

    let mut writer = ArrowWriter::try_new(Vec::new(), schema.clone(), Some(props))?;

    let options = RecordBatchOptions::new().with_row_count(Some(table.row_count()));
    let batch = RecordBatch::try_new_with_options(schema, columns, &options)?;
    writer.write(&batch)?;

    Ok(writer.into_inner()?)
}

/// Number of rows recorded in a Parquet footer.
pub fn parquet_row_count(data: Vec<u8>) -> Result<u64> {
    let reader = SerializedFileReader::new(Bytes::from(data))?;
    let rows = reader.metadata().file_metadata().num_rows();
    Ok(rows.max(0) as u64)
}

/// One JSON object per line, keys limited to the table's columns.
pub fn encode_ndjson(table: &Table) -> Result<Vec<u8>> {
    let mut lines = Vec::with_capacity(table.row_count());

    for record in &table.records {
        let mut object = serde_json::Map::new();
        for column in &table.columns {
            if let Some(value) = record.get(column) {
                object.insert(column.clone(), value.clone());
            }
        }
        lines.push(serde_json::to_string(&Value::Object(object))?);
    }

    Ok(lines.join("\n").into_bytes())
}

/// Counts NDJSON rows; blank lines are skipped, anything but a JSON object is an error.
pub fn ndjson_row_count(data: &[u8]) -> Result<u64> {
    let text = std::str::from_utf8(data).map_err(|e| EtlError::processing(e.to_string()))?;
    let mut rows = 0;

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line)? {
            Value::Object(_) => rows += 1,
            _ => {
                return Err(EtlError::processing(format!(
                    "line {} is not a JSON object",
                    line_no + 1
                )))
            }
        }
    }

    Ok(rows)
}
