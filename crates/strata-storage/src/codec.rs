//! Parquet encoding and decoding of row tables.
//!
//! Partitions are exchanged as [`Table`]s: an ordered column list plus rows of
//! JSON values. Fixed layouts (bronze, silver, dead-letter) declare their
//! columns up front; gold datasets infer them from the rows with
//! [`Table::infer`].
//!
//! Type mapping on write:
//!
//! | Column type | JSON accepted                     | Arrow type |
//! |-------------|-----------------------------------|------------|
//! | `Utf8`      | any; non-strings as JSON text     | `Utf8`     |
//! | `Int64`     | integers                          | `Int64`    |
//! | `Float64`   | numbers                           | `Float64`  |
//! | `Boolean`   | booleans                          | `Boolean`  |
//!
//! Nulls and missing keys are written as Arrow nulls in every column type.

use std::fmt::{self, Display};
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::ZstdLevel;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::{Map, Number, Value};

use crate::error::StorageError;

/// One table row keyed by column name.
pub type Row = Map<String, Value>;

// ============================================================================
// Columns
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Utf8,
    Int64,
    Float64,
    Boolean,
}

impl ColumnType {
    fn arrow_type(self) -> DataType {
        match self {
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ColumnType::Utf8 => "utf8",
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Boolean => "boolean",
        }
    }

    /// Maps a stored Arrow type onto the closest column type.
    fn from_arrow(data_type: &DataType) -> Self {
        match data_type {
            DataType::Boolean => ColumnType::Boolean,
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => ColumnType::Int64,
            DataType::Float16 | DataType::Float32 | DataType::Float64 => ColumnType::Float64,
            _ => ColumnType::Utf8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable,
        }
    }
}

// ============================================================================
// Table
// ============================================================================

/// Rows plus the column layout they are stored under.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Builds a table whose columns are the sorted union of the row keys.
    ///
    /// A column is `Boolean` if every non-null value is a bool, `Int64` if every
    /// non-null value is an integer, `Float64` if every non-null value is a
    /// number, and `Utf8` otherwise. Objects and arrays are kept as JSON text.
    pub fn infer(rows: Vec<Row>) -> Self {
        let mut names: Vec<&String> = rows.iter().flat_map(Map::keys).collect();
        names.sort();
        names.dedup();

        let columns = names
            .into_iter()
            .map(|name| {
                let values = rows.iter().filter_map(|r| r.get(name)).filter(|v| !v.is_null());
                Column::new(name.clone(), infer_type(values), true)
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn infer_type<'a>(mut values: impl Iterator<Item = &'a Value> + Clone) -> ColumnType {
    if values.clone().next().is_none() {
        return ColumnType::Utf8;
    }
    if values.clone().all(Value::is_boolean) {
        ColumnType::Boolean
    } else if values.clone().all(Value::is_i64) {
        ColumnType::Int64
    } else if values.all(Value::is_number) {
        ColumnType::Float64
    } else {
        ColumnType::Utf8
    }
}

// ============================================================================
// Compression
// ============================================================================

/// Page compression codec for written partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Snappy,
    Zstd,
    None,
}

impl Compression {
    fn parquet(self) -> parquet::basic::Compression {
        match self {
            Compression::Snappy => parquet::basic::Compression::SNAPPY,
            Compression::Zstd => parquet::basic::Compression::ZSTD(ZstdLevel::default()),
            Compression::None => parquet::basic::Compression::UNCOMPRESSED,
        }
    }
}

impl Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compression::Snappy => "snappy",
            Compression::Zstd => "zstd",
            Compression::None => "none",
        })
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snappy" => Ok(Compression::Snappy),
            "zstd" => Ok(Compression::Zstd),
            "none" | "uncompressed" => Ok(Compression::None),
            other => Err(format!("unknown compression '{other}' (expected snappy, zstd or none)")),
        }
    }
}

// ============================================================================
// Writer
// ============================================================================

fn writer_properties(compression: Compression) -> WriterProperties {
    let created_by = KeyValue::new("created_by".to_string(), "strata".to_string());
    WriterProperties::builder()
        .set_compression(compression.parquet())
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

fn write_single_batch(schema: SchemaRef, batch: &RecordBatch, compression: Compression) -> Result<Bytes, StorageError> {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let props = writer_properties(compression);
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(props))
        .map_err(|e| StorageError::parquet(format!("parquet writer init failed: {e}")))?;
    writer
        .write(batch)
        .map_err(|e| StorageError::parquet(format!("parquet write failed: {e}")))?;
    writer
        .close()
        .map_err(|e| StorageError::parquet(format!("parquet close failed: {e}")))?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Encodes a table as a single-row-group Parquet file.
pub fn encode(table: &Table, compression: Compression) -> Result<Bytes, StorageError> {
    let schema: SchemaRef = Arc::new(Schema::new(
        table
            .columns
            .iter()
            .map(|c| Field::new(c.name.as_str(), c.ty.arrow_type(), c.nullable))
            .collect::<Vec<_>>(),
    ));

    let arrays = table
        .columns
        .iter()
        .map(|c| build_array(c, &table.rows))
        .collect::<Result<Vec<_>, _>>()?;

    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| StorageError::parquet(format!("record batch assembly failed: {e}")))?;
    write_single_batch(schema, &batch, compression)
}

fn build_array(column: &Column, rows: &[Row]) -> Result<ArrayRef, StorageError> {
    let mismatch = |row: usize, found: &Value| StorageError::ColumnType {
        column: column.name.clone(),
        expected: column.ty.name(),
        row,
        found: found.to_string(),
    };
    let cells = rows.iter().map(|r| r.get(&column.name).filter(|v| !v.is_null()));

    let array: ArrayRef = match column.ty {
        ColumnType::Utf8 => Arc::new(StringArray::from(
            cells
                .map(|v| {
                    v.map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                })
                .collect::<Vec<_>>(),
        )),
        ColumnType::Int64 => Arc::new(Int64Array::from(
            cells
                .enumerate()
                .map(|(i, v)| v.map(|v| v.as_i64().ok_or_else(|| mismatch(i, v))).transpose())
                .collect::<Result<Vec<_>, _>>()?,
        )),
        ColumnType::Float64 => Arc::new(Float64Array::from(
            cells
                .enumerate()
                .map(|(i, v)| v.map(|v| v.as_f64().ok_or_else(|| mismatch(i, v))).transpose())
                .collect::<Result<Vec<_>, _>>()?,
        )),
        ColumnType::Boolean => Arc::new(BooleanArray::from(
            cells
                .enumerate()
                .map(|(i, v)| v.map(|v| v.as_bool().ok_or_else(|| mismatch(i, v))).transpose())
                .collect::<Result<Vec<_>, _>>()?,
        )),
    };
    Ok(array)
}

// ============================================================================
// Reader
// ============================================================================

/// Decodes a Parquet file into a table.
///
/// Integer columns of any width read back as `Int64`, float columns as
/// `Float64`, and any other non-boolean type as text.
pub fn decode(bytes: &Bytes) -> Result<Table, StorageError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
        .map_err(|e| StorageError::parquet(format!("parquet reader init failed: {e}")))?;

    let columns: Vec<Column> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| Column::new(f.name().clone(), ColumnType::from_arrow(f.data_type()), f.is_nullable()))
        .collect();

    let reader = builder
        .build()
        .map_err(|e| StorageError::parquet(format!("parquet reader build failed: {e}")))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| StorageError::parquet(format!("parquet read batch failed: {e}")))?;
        let mut batch_rows = vec![Row::new(); batch.num_rows()];
        for (column, array) in columns.iter().zip(batch.columns()) {
            let array = normalize(array, column.ty)?;
            for (i, row) in batch_rows.iter_mut().enumerate() {
                row.insert(column.name.clone(), cell(&array, column.ty, i));
            }
        }
        rows.extend(batch_rows);
    }

    Ok(Table { columns, rows })
}

/// Casts a stored array to the Arrow type backing `ty`.
fn normalize(array: &ArrayRef, ty: ColumnType) -> Result<ArrayRef, StorageError> {
    let target = ty.arrow_type();
    if array.data_type() == &target {
        return Ok(array.clone());
    }
    arrow::compute::cast(array.as_ref(), &target)
        .map_err(|e| StorageError::parquet(format!("cast to {target} failed: {e}")))
}

fn cell(array: &ArrayRef, ty: ColumnType, i: usize) -> Value {
    if array.is_null(i) {
        return Value::Null;
    }
    let any = array.as_any();
    match ty {
        ColumnType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map_or(Value::Null, |a| Value::String(a.value(i).to_string())),
        ColumnType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(Value::Null, |a| Value::from(a.value(i))),
        ColumnType::Float64 => any
            .downcast_ref::<Float64Array>()
            .and_then(|a| Number::from_f64(a.value(i)))
            .map_or(Value::Null, Value::Number),
        ColumnType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(Value::Null, |a| Value::Bool(a.value(i))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn row(v: Value) -> Row {
        match v {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn infer_picks_narrowest_type_per_column() {
        let table = Table::infer(vec![
            row(json!({"date": "2026-03-01", "count": 3, "avg": 1.5, "flag": true, "tags": ["a"]})),
            row(json!({"date": "2026-03-02", "count": 4, "avg": 2, "flag": null, "extra": "x"})),
        ]);
        let types: Vec<(&str, ColumnType)> = table.columns().iter().map(|c| (c.name.as_str(), c.ty)).collect();
        assert_eq!(
            types,
            vec![
                ("avg", ColumnType::Float64),
                ("count", ColumnType::Int64),
                ("date", ColumnType::Utf8),
                ("extra", ColumnType::Utf8),
                ("flag", ColumnType::Boolean),
                ("tags", ColumnType::Utf8),
            ]
        );
    }

    #[test]
    fn mixed_numbers_and_strings_fall_back_to_text() {
        let table = Table::infer(vec![row(json!({"v": 1})), row(json!({"v": "one"}))]);
        assert_eq!(table.columns()[0].ty, ColumnType::Utf8);
    }

    #[test_case(Compression::Snappy)]
    #[test_case(Compression::Zstd)]
    #[test_case(Compression::None)]
    fn encoded_table_reads_back(compression: Compression) {
        let table = Table::infer(vec![
            row(json!({"name": "a", "n": 1, "score": 0.5, "ok": true, "nested": {"k": 1}})),
            row(json!({"name": null, "n": 2, "score": 1.25, "ok": false})),
        ]);
        let bytes = encode(&table, compression).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.num_rows(), 2);
        assert_eq!(decoded.columns(), table.columns());
        let first = &decoded.rows()[0];
        assert_eq!(first["name"], json!("a"));
        assert_eq!(first["n"], json!(1));
        assert_eq!(first["score"], json!(0.5));
        assert_eq!(first["ok"], json!(true));
        assert_eq!(first["nested"], json!("{\"k\":1}"));
        let second = &decoded.rows()[1];
        assert_eq!(second["name"], Value::Null);
        assert_eq!(second["nested"], Value::Null);
    }

    #[test]
    fn empty_table_keeps_its_columns() {
        let table = Table::new(vec![Column::new("event_id", ColumnType::Utf8, false)], vec![]);
        let decoded = decode(&encode(&table, Compression::Snappy).unwrap()).unwrap();
        assert!(decoded.is_empty());
        assert!(decoded.has_column("event_id"));
    }

    #[test]
    fn wrong_value_type_is_reported() {
        let table = Table::new(
            vec![Column::new("_offset", ColumnType::Int64, false)],
            vec![row(json!({"_offset": "ten"}))],
        );
        let err = encode(&table, Compression::Snappy).unwrap_err();
        assert!(matches!(err, StorageError::ColumnType { row: 0, .. }));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode(&Bytes::from_static(b"not parquet")).unwrap_err();
        assert!(matches!(err, StorageError::Parquet(_)));
    }

    #[test]
    fn compression_parses_names() {
        assert_eq!("ZSTD".parse::<Compression>().unwrap(), Compression::Zstd);
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert!("lz4".parse::<Compression>().is_err());
    }
}
