use std::{
    io::{Cursor, Write},
    sync::Arc,
};

use arrow::{
    array::{RecordBatch, StringArray, TimestampMillisecondArray},
    datatypes::{DataType, Field, Schema, TimeUnit},
};
use bytes::Bytes;
use chrono::NaiveDateTime;
use parquet::arrow::ArrowWriter;
use serde_json::Value;
use zip::{ZipWriter, write::SimpleFileOptions};

use crate::{table::Table, temporal::TargetDate};

pub(crate) type TestResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) fn target(s: &str) -> TargetDate {
    s.parse().expect("valid target date")
}

/// Epoch milliseconds of a naive `YYYY-MM-DD HH:MM:SS[.fff]` timestamp.
pub(crate) fn timestamp_ms(s: &str) -> i64 {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .expect("valid timestamp")
        .and_utc()
        .timestamp_millis()
}

/// Batch with a millisecond timestamp column `column` followed by a `name` column.
pub(crate) fn timestamp_ms_batch(
    column: &str,
    values: &[Option<i64>],
    tz: Option<&str>,
) -> RecordBatch {
    let ts = TimestampMillisecondArray::from(values.to_vec()).with_timezone_opt(tz);
    let names: StringArray = (0..values.len()).map(|i| Some(format!("row{i}"))).collect();
    let schema = Arc::new(Schema::new(vec![
        Field::new(
            column,
            DataType::Timestamp(TimeUnit::Millisecond, tz.map(Into::into)),
            true,
        ),
        Field::new("name", DataType::Utf8, true),
    ]));
    RecordBatch::try_new(schema, vec![Arc::new(ts), Arc::new(names)]).expect("valid batch")
}

/// Batch with a text column `column` followed by a `name` column.
pub(crate) fn string_batch(column: &str, values: &[Option<&str>]) -> RecordBatch {
    let text = StringArray::from(values.to_vec());
    let names: StringArray = (0..values.len()).map(|i| Some(format!("row{i}"))).collect();
    let schema = Arc::new(Schema::new(vec![
        Field::new(column, DataType::Utf8, true),
        Field::new("name", DataType::Utf8, true),
    ]));
    RecordBatch::try_new(schema, vec![Arc::new(text), Arc::new(names)]).expect("valid batch")
}

pub(crate) fn parquet_bytes(batch: &RecordBatch) -> Result<Bytes, Box<dyn std::error::Error>> {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(Bytes::from(buf))
}

pub(crate) fn zip_archive(entries: &[(&str, Vec<u8>)]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        zip.start_file(*name, SimpleFileOptions::default())?;
        zip.write_all(contents)?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Rendered values of `column` for every row of `table`.
pub(crate) fn date_of_rows(table: &Table, column: &str) -> Vec<String> {
    table
        .to_row_maps()
        .expect("rows convert")
        .iter()
        .map(|row| match &row[column] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}
