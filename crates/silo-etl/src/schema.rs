//! Declared schema, type coercion, and Parquet encoding for sales batches.
//!
//! The schema contract is fixed: integer columns `store_id`,
//! `transaction_id`, `product_id`, `quantity` (64-bit, nullable) and the
//! timestamp column `datetime`. A batch whose observed column set differs
//! from this contract in either direction is discarded wholesale.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array as _, Int64Array, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::error::{EtlError, Result};
use crate::payload::Literal;

/// Columns coerced to nullable 64-bit integers.
pub const INTEGER_COLUMNS: [&str; 4] = ["store_id", "transaction_id", "product_id", "quantity"];

/// Columns coerced to timestamps.
pub const DATE_COLUMNS: [&str; 1] = ["datetime"];

/// Returns the full declared column set.
#[must_use]
pub fn expected_columns() -> BTreeSet<&'static str> {
    INTEGER_COLUMNS.iter().chain(DATE_COLUMNS.iter()).copied().collect()
}

/// One schema-coerced sales record.
///
/// Every field is nullable: a key missing from the embedded payload becomes
/// a null, which the downstream validation pass reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    /// Store identifier.
    pub store_id: Option<i64>,
    /// Transaction identifier.
    pub transaction_id: Option<i64>,
    /// Product identifier.
    pub product_id: Option<i64>,
    /// Quantity sold.
    pub quantity: Option<i64>,
    /// Transaction timestamp (UTC, microsecond precision).
    pub datetime: Option<NaiveDateTime>,
}

/// The validated rows extracted from one raw object.
#[derive(Debug, Clone)]
pub struct TabularBatch {
    /// Key of the raw object this batch came from.
    pub source_key: String,
    /// Schema-coerced rows, in line order.
    pub rows: Vec<SaleRecord>,
}

/// Row-wise union of all valid batches for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct ConsolidatedDataset {
    /// All rows, batch-internal order preserved.
    pub rows: Vec<SaleRecord>,
}

impl ConsolidatedDataset {
    /// Concatenates batches, preserving each batch's internal row order.
    ///
    /// Batch-to-batch order is fetch-completion order and carries no
    /// semantic meaning.
    #[must_use]
    pub fn from_batches(batches: Vec<TabularBatch>) -> Self {
        let mut rows = Vec::with_capacity(batches.iter().map(|b| b.rows.len()).sum());
        for batch in batches {
            rows.extend(batch.rows);
        }
        Self { rows }
    }

    /// Number of rows in the dataset.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

/// Coerces one parsed payload mapping into a [`SaleRecord`].
///
/// Missing keys and explicit `None` become nulls. A value of the wrong type
/// is a coercion failure, which invalidates the whole batch.
///
/// # Errors
///
/// Returns `EtlError::Parse` when a present value cannot be coerced to the
/// column's declared type.
pub fn coerce_record(fields: &BTreeMap<String, Literal>) -> Result<SaleRecord> {
    Ok(SaleRecord {
        store_id: coerce_int(fields, "store_id")?,
        transaction_id: coerce_int(fields, "transaction_id")?,
        product_id: coerce_int(fields, "product_id")?,
        quantity: coerce_int(fields, "quantity")?,
        datetime: coerce_datetime(fields, "datetime")?,
    })
}

fn coerce_int(fields: &BTreeMap<String, Literal>, column: &str) -> Result<Option<i64>> {
    match fields.get(column) {
        None | Some(Literal::None) => Ok(None),
        Some(Literal::Int(v)) => Ok(Some(*v)),
        // Integral floats survive integer coercion, fractional ones do not.
        #[allow(clippy::cast_possible_truncation)]
        Some(Literal::Float(f)) if f.fract() == 0.0 && f.abs() < 9.3e18 => Ok(Some(*f as i64)),
        Some(other) => Err(EtlError::Parse {
            message: format!("cannot coerce {other:?} to Int64 for column '{column}'"),
        }),
    }
}

fn coerce_datetime(fields: &BTreeMap<String, Literal>, column: &str) -> Result<Option<NaiveDateTime>> {
    match fields.get(column) {
        None | Some(Literal::None) => Ok(None),
        Some(Literal::Str(s)) => parse_datetime(s).map(Some).ok_or_else(|| EtlError::Parse {
            message: format!("cannot parse '{s}' as timestamp for column '{column}'"),
        }),
        Some(other) => Err(EtlError::Parse {
            message: format!("cannot coerce {other:?} to timestamp for column '{column}'"),
        }),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)
}

fn sales_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("store_id", DataType::Int64, true),
        Field::new("transaction_id", DataType::Int64, true),
        Field::new("product_id", DataType::Int64, true),
        Field::new("quantity", DataType::Int64, true),
        Field::new(
            "datetime",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            true,
        ),
    ]))
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("silo-etl".to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Serializes the consolidated dataset as a single Parquet file.
///
/// # Errors
///
/// Returns an error if the record batch cannot be built or the Parquet
/// write fails.
pub fn write_dataset(dataset: &ConsolidatedDataset) -> Result<Bytes> {
    let schema = sales_schema();
    let rows = &dataset.rows;

    let store_id = Int64Array::from(rows.iter().map(|r| r.store_id).collect::<Vec<_>>());
    let transaction_id =
        Int64Array::from(rows.iter().map(|r| r.transaction_id).collect::<Vec<_>>());
    let product_id = Int64Array::from(rows.iter().map(|r| r.product_id).collect::<Vec<_>>());
    let quantity = Int64Array::from(rows.iter().map(|r| r.quantity).collect::<Vec<_>>());
    let datetime = TimestampMicrosecondArray::from(
        rows.iter()
            .map(|r| r.datetime.map(|dt| dt.and_utc().timestamp_micros()))
            .collect::<Vec<_>>(),
    );

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(store_id),
            Arc::new(transaction_id),
            Arc::new(product_id),
            Arc::new(quantity),
            Arc::new(datetime),
        ],
    )
    .map_err(|e| EtlError::Parquet {
        message: format!("record batch build failed: {e}"),
    })?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer =
        ArrowWriter::try_new(&mut cursor, schema, Some(writer_properties())).map_err(|e| {
            EtlError::Parquet {
                message: format!("parquet writer init failed: {e}"),
            }
        })?;
    writer.write(&batch).map_err(|e| EtlError::Parquet {
        message: format!("parquet write failed: {e}"),
    })?;
    writer.close().map_err(|e| EtlError::Parquet {
        message: format!("parquet close failed: {e}"),
    })?;

    Ok(Bytes::from(cursor.into_inner()))
}

/// Deserializes a published artifact back into rows.
///
/// No schema coercion is applied beyond what the file itself declares;
/// nulls are surfaced as-is for the validation checks.
///
/// # Errors
///
/// Returns an error if the Parquet payload is invalid or required columns
/// are missing.
pub fn read_artifact(bytes: &Bytes) -> Result<Vec<SaleRecord>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
        .map_err(|e| EtlError::Parquet {
            message: format!("parquet reader init failed: {e}"),
        })?
        .build()
        .map_err(|e| EtlError::Parquet {
            message: format!("parquet reader build failed: {e}"),
        })?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| EtlError::Parquet {
            message: format!("parquet read batch failed: {e}"),
        })?;

        let store_id = col_i64(&batch, "store_id")?;
        let transaction_id = col_i64(&batch, "transaction_id")?;
        let product_id = col_i64(&batch, "product_id")?;
        let quantity = col_i64(&batch, "quantity")?;
        let datetime = col_timestamp(&batch, "datetime")?;

        for row in 0..batch.num_rows() {
            out.push(SaleRecord {
                store_id: opt_value(store_id, row),
                transaction_id: opt_value(transaction_id, row),
                product_id: opt_value(product_id, row),
                quantity: opt_value(quantity, row),
                datetime: if datetime.is_null(row) {
                    None
                } else {
                    DateTime::from_timestamp_micros(datetime.value(row)).map(|dt| dt.naive_utc())
                },
            });
        }
    }
    Ok(out)
}

fn opt_value(array: &Int64Array, row: usize) -> Option<i64> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row))
    }
}

fn col_i64<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    let idx = batch.schema().index_of(name).map_err(|e| EtlError::Parquet {
        message: format!("missing column '{name}': {e}"),
    })?;

    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| EtlError::Parquet {
            message: format!("column '{name}' is not Int64Array"),
        })
}

fn col_timestamp<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a TimestampMicrosecondArray> {
    let idx = batch.schema().index_of(name).map_err(|e| EtlError::Parquet {
        message: format!("missing column '{name}': {e}"),
    })?;

    batch
        .column(idx)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| EtlError::Parquet {
            message: format!("column '{name}' is not TimestampMicrosecondArray"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Literal)]) -> BTreeMap<String, Literal> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn coerce_full_record() {
        let record = coerce_record(&fields(&[
            ("store_id", Literal::Int(1)),
            ("transaction_id", Literal::Int(2)),
            ("product_id", Literal::Int(3)),
            ("quantity", Literal::Int(5)),
            ("datetime", Literal::Str("2025-01-01".into())),
        ]))
        .expect("should coerce");

        assert_eq!(record.store_id, Some(1));
        assert_eq!(record.quantity, Some(5));
        assert_eq!(
            record.datetime,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn missing_and_none_become_nulls() {
        let record = coerce_record(&fields(&[
            ("store_id", Literal::None),
            ("quantity", Literal::Int(5)),
        ]))
        .expect("should coerce");

        assert_eq!(record.store_id, None);
        assert_eq!(record.transaction_id, None);
        assert_eq!(record.quantity, Some(5));
        assert_eq!(record.datetime, None);
    }

    #[test]
    fn wrong_typed_value_fails_coercion() {
        let err = coerce_record(&fields(&[("quantity", Literal::Str("five".into()))]));
        assert!(err.is_err());

        let err = coerce_record(&fields(&[("datetime", Literal::Int(20250101))]));
        assert!(err.is_err());
    }

    #[test]
    fn fractional_float_fails_integer_coercion() {
        assert!(coerce_record(&fields(&[("quantity", Literal::Float(1.5))])).is_err());
        let record = coerce_record(&fields(&[("quantity", Literal::Float(4.0))])).unwrap();
        assert_eq!(record.quantity, Some(4));
    }

    #[test]
    fn datetime_formats_accepted() {
        for s in [
            "2025-01-01",
            "2025-01-01 13:45:00",
            "2025-01-01T13:45:00",
            "2025-01-01T13:45:00+00:00",
        ] {
            assert!(parse_datetime(s).is_some(), "should parse {s}");
        }
        assert!(parse_datetime("01/02/2025 or so").is_none());
    }

    #[test]
    fn expected_columns_is_schema_union() {
        let cols = expected_columns();
        assert_eq!(cols.len(), 5);
        assert!(cols.contains("quantity"));
        assert!(cols.contains("datetime"));
    }

    #[test]
    fn parquet_roundtrip_preserves_rows_and_nulls() {
        let dataset = ConsolidatedDataset {
            rows: vec![
                SaleRecord {
                    store_id: Some(1),
                    transaction_id: Some(2),
                    product_id: Some(3),
                    quantity: Some(5),
                    datetime: NaiveDate::from_ymd_opt(2025, 1, 1)
                        .unwrap()
                        .and_hms_opt(12, 0, 0),
                },
                SaleRecord {
                    store_id: None,
                    transaction_id: Some(4),
                    product_id: Some(6),
                    quantity: Some(-2),
                    datetime: None,
                },
            ],
        };

        let bytes = write_dataset(&dataset).expect("write parquet");
        let rows = read_artifact(&bytes).expect("read parquet");

        assert_eq!(rows, dataset.rows);
    }

    #[test]
    fn empty_dataset_writes_valid_parquet() {
        let bytes = write_dataset(&ConsolidatedDataset::default()).expect("write parquet");
        let rows = read_artifact(&bytes).expect("read parquet");
        assert!(rows.is_empty());
    }
}
