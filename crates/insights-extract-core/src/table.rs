//! In-memory columnar table and row-mapping conversion.
//!
//! A [`Table`] wraps a single Arrow [`RecordBatch`] decoded from one Parquet
//! payload. It exposes just what the pipeline needs: column lookup, row
//! count, and conversion of each row into a [`RowMap`] ready for JSON.

use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, AsArray, Float64Array, RecordBatch, StringArray, timezone::Tz},
    compute::{cast, concat_batches},
    datatypes::{DataType, Date32Type, Date64Type, Field, Float64Type, Int64Type, Schema, SchemaRef},
    error::ArrowError,
    temporal_conversions::{date32_to_datetime, date64_to_datetime},
};
use arrow_json::{WriterBuilder, writer::JsonArray};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Map, Value};
use snafu::prelude::*;

use crate::{
    error::{
        ArrowReadSnafu, FilterError, ParquetReadSnafu, RowConversionSnafu, RowDecodeSnafu,
        RowEncodeSnafu,
    },
    temporal::{DATE_FORMAT, iso_timestamp, naive_from_raw},
};

/// A single row as column name → JSON scalar, in schema column order.
pub type RowMap = Map<String, Value>;

/// A decoded payload: one record batch with a named, typed schema.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    /// Wrap an existing record batch.
    pub fn new(batch: RecordBatch) -> Self {
        Table { batch }
    }

    /// Decode a Parquet payload into a single batch.
    ///
    /// All row groups are read and concatenated; the file's own schema is kept.
    pub fn from_parquet(payload: Bytes) -> Result<Self, FilterError> {
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(payload).context(ParquetReadSnafu)?;
        let schema = builder.schema().clone();
        let reader = builder.build().context(ParquetReadSnafu)?;

        let batches = reader
            .collect::<Result<Vec<_>, ArrowError>>()
            .context(ArrowReadSnafu)?;
        let batch = concat_batches(&schema, &batches).context(ArrowReadSnafu)?;

        Ok(Table { batch })
    }

    /// A table with this table's schema and no rows.
    pub fn empty_like(&self) -> Self {
        Table {
            batch: RecordBatch::new_empty(self.batch.schema()),
        }
    }

    /// Shared schema of the table.
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Whether a column named `name` exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().column_with_name(name).is_some()
    }

    /// Position and array of the column named `name`.
    pub fn column(&self, name: &str) -> Option<(usize, &ArrayRef)> {
        let idx = self.batch.schema().index_of(name).ok()?;
        Some((idx, self.batch.column(idx)))
    }

    /// Borrow the underlying batch.
    pub fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Return a copy of the table with column `idx` replaced by `array`.
    ///
    /// The field keeps its name and becomes nullable; its type becomes `array`'s type.
    pub fn replace_column(&self, idx: usize, array: ArrayRef) -> Result<Self, ArrowError> {
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut columns = self.batch.columns().to_vec();

        let name = fields
            .get(idx)
            .map(|f| f.name().clone())
            .ok_or_else(|| ArrowError::SchemaError(format!("column index {idx} out of bounds")))?;
        fields[idx] = Field::new(name, array.data_type().clone(), true);
        columns[idx] = array;

        let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
        RecordBatch::try_new(schema, columns).map(Table::new)
    }

    /// Convert every row to a [`RowMap`].
    ///
    /// Timestamps render as ISO-8601 text and dates as `YYYY-MM-DD`.
    /// Non-finite floats become `null`. Everything else, nested lists and
    /// structs included, is encoded by `arrow_json`.
    pub fn to_row_maps(&self) -> Result<Vec<RowMap>, FilterError> {
        if self.batch.num_rows() == 0 {
            return Ok(Vec::new());
        }

        let schema = self.batch.schema();
        let mut fields = Vec::with_capacity(schema.fields().len());
        let mut columns = Vec::with_capacity(schema.fields().len());
        for (field, array) in schema.fields().iter().zip(self.batch.columns()) {
            let prepared = json_column(array).context(RowConversionSnafu {
                column: field.name(),
            })?;
            match prepared {
                Some(array) => {
                    fields.push(Field::new(field.name(), array.data_type().clone(), true));
                    columns.push(array);
                }
                None => {
                    fields.push(field.as_ref().clone());
                    columns.push(Arc::clone(array));
                }
            }
        }
        let batch =
            RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context(RowEncodeSnafu)?;

        let mut writer = WriterBuilder::new()
            .with_explicit_nulls(true)
            .build::<_, JsonArray>(Vec::new());
        writer.write(&batch).context(RowEncodeSnafu)?;
        writer.finish().context(RowEncodeSnafu)?;

        serde_json::from_slice(&writer.into_inner()).context(RowDecodeSnafu)
    }
}

/// Replacement for columns whose JSON form differs from `arrow_json`'s
/// default; `None` leaves the column as stored.
fn json_column(array: &ArrayRef) -> Result<Option<ArrayRef>, ArrowError> {
    let a = array.as_ref();
    let replaced: ArrayRef = match array.data_type() {
        DataType::Timestamp(unit, tz) => {
            let tz = tz.as_deref().map(str::parse::<Tz>).transpose()?;
            let raw = cast(a, &DataType::Int64)?;
            let text: StringArray = raw
                .as_primitive::<Int64Type>()
                .iter()
                .map(|v| {
                    v.and_then(|v| naive_from_raw(*unit, v))
                        .map(|dt| iso_timestamp(dt, tz.as_ref()))
                })
                .collect();
            Arc::new(text)
        }
        DataType::Date32 => {
            let text: StringArray = a
                .as_primitive::<Date32Type>()
                .iter()
                .map(|v| v.and_then(date32_to_datetime).map(|dt| dt.format(DATE_FORMAT).to_string()))
                .collect();
            Arc::new(text)
        }
        DataType::Date64 => {
            let text: StringArray = a
                .as_primitive::<Date64Type>()
                .iter()
                .map(|v| v.and_then(date64_to_datetime).map(|dt| dt.format(DATE_FORMAT).to_string()))
                .collect();
            Arc::new(text)
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let wide = cast(a, &DataType::Float64)?;
            let finite: Float64Array = wide
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.filter(|f| f.is_finite()))
                .collect();
            Arc::new(finite)
        }
        _ => return Ok(None),
    };
    Ok(Some(replaced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{
        TestResult, parquet_bytes, string_batch, timestamp_ms, timestamp_ms_batch,
    };
    use arrow::{
        array::{BooleanArray, Int64Array, ListArray, StructArray},
        datatypes::Int32Type,
    };
    use serde_json::json;

    #[test]
    fn decodes_parquet_payload() -> TestResult {
        let batch = string_batch("edited_date", &[Some("2024-03-10 08:00:00"), None]);
        let table = Table::from_parquet(parquet_bytes(&batch)?)?;

        assert_eq!(table.num_rows(), 2);
        assert!(table.has_column("edited_date"));
        assert!(table.has_column("name"));
        assert!(!table.has_column("event_time"));
        Ok(())
    }

    #[test]
    fn rejects_non_parquet_payload() {
        let err = Table::from_parquet(Bytes::from_static(b"PK\x03\x04 not parquet")).unwrap_err();
        assert!(matches!(err, FilterError::ParquetRead { .. }));
    }

    #[test]
    fn row_maps_keep_column_order_and_scalars() -> TestResult {
        let schema = Arc::new(Schema::new(vec![
            Field::new("zeta", DataType::Int64, true),
            Field::new("alpha", DataType::Utf8, true),
            Field::new("ok", DataType::Boolean, true),
            Field::new("score", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![Some(7), None])),
                Arc::new(StringArray::from(vec![Some("x"), Some("y")])),
                Arc::new(BooleanArray::from(vec![Some(true), Some(false)])),
                Arc::new(Float64Array::from(vec![Some(1.5), Some(f64::NAN)])),
            ],
        )?;

        let rows = Table::new(batch).to_row_maps()?;
        assert_eq!(rows.len(), 2);

        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "ok", "score"]);

        assert_eq!(
            Value::Object(rows[0].clone()),
            json!({"zeta": 7, "alpha": "x", "ok": true, "score": 1.5})
        );
        assert_eq!(
            Value::Object(rows[1].clone()),
            json!({"zeta": null, "alpha": "y", "ok": false, "score": null})
        );
        Ok(())
    }

    #[test]
    fn row_maps_render_timestamps_as_iso() -> TestResult {
        let batch = timestamp_ms_batch(
            "edited_date",
            &[Some(timestamp_ms("2024-03-10 08:15:00")), None],
            None,
        );
        let rows = Table::new(batch).to_row_maps()?;
        assert_eq!(rows[0]["edited_date"], json!("2024-03-10T08:15:00"));
        assert_eq!(rows[1]["edited_date"], Value::Null);

        let batch = timestamp_ms_batch(
            "edited_date",
            &[Some(timestamp_ms("2024-03-10 08:15:00"))],
            Some("+00:00"),
        );
        let rows = Table::new(batch).to_row_maps()?;
        assert_eq!(rows[0]["edited_date"], json!("2024-03-10T08:15:00+00:00"));
        Ok(())
    }

    #[test]
    fn nested_columns_become_json_values() -> TestResult {
        let tags = ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
            Some(vec![Some(1), Some(2)]),
            None,
        ]);
        let owner = StructArray::from(vec![
            (
                Arc::new(Field::new("id", DataType::Int64, true)),
                Arc::new(Int64Array::from(vec![Some(10), Some(11)])) as ArrayRef,
            ),
            (
                Arc::new(Field::new("login", DataType::Utf8, true)),
                Arc::new(StringArray::from(vec![Some("ann"), None])) as ArrayRef,
            ),
        ]);
        let schema = Arc::new(Schema::new(vec![
            Field::new("tags", tags.data_type().clone(), true),
            Field::new("owner", owner.data_type().clone(), true),
        ]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(tags), Arc::new(owner)])?;

        let rows = Table::new(batch).to_row_maps()?;
        assert_eq!(rows[0]["tags"], json!([1, 2]));
        assert_eq!(rows[0]["owner"], json!({"id": 10, "login": "ann"}));
        assert_eq!(rows[1]["tags"], Value::Null);
        assert_eq!(rows[1]["owner"], json!({"id": 11, "login": null}));
        Ok(())
    }

    #[test]
    fn empty_table_has_no_rows() -> TestResult {
        let table = Table::new(string_batch("edited_date", &[Some("a")])).empty_like();
        assert!(table.to_row_maps()?.is_empty());
        Ok(())
    }

    #[test]
    fn replace_column_keeps_name_and_position() -> TestResult {
        let batch = string_batch("edited_date", &[Some("a")]);
        let table = Table::new(batch);
        let replaced = table.replace_column(0, Arc::new(Int64Array::from(vec![1])))?;

        let schema = replaced.schema();
        assert_eq!(schema.field(0).name(), "edited_date");
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).name(), "name");
        assert!(table.replace_column(9, Arc::new(Int64Array::from(vec![1]))).is_err());
        Ok(())
    }

    #[test]
    fn empty_like_keeps_schema() {
        let table = Table::new(string_batch("edited_date", &[Some("a"), Some("b")]));
        let empty = table.empty_like();
        assert_eq!(empty.num_rows(), 0);
        assert_eq!(empty.schema(), table.schema());
    }
}
