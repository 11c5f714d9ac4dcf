#![allow(dead_code)]

use std::{
    io::{Cursor, Write},
    sync::Arc,
};

use arrow::{
    array::{Float64Array, Int64Array, RecordBatch, StringArray, TimestampMicrosecondArray},
    datatypes::{DataType, Field, Schema, TimeUnit},
};
use chrono::NaiveDateTime;
use parquet::arrow::ArrowWriter;
use zip::{ZipWriter, write::SimpleFileOptions};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn micros(s: &str) -> i64 {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .expect("valid timestamp")
        .and_utc()
        .timestamp_micros()
}

/// Parquet payload with `id`, `<ts_column>` (microsecond timestamps), `score` and `label`.
pub fn asset_parquet(ts_column: &str, stamps: &[&str]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let n = stamps.len();
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new(ts_column, DataType::Timestamp(TimeUnit::Microsecond, None), true),
        Field::new("score", DataType::Float64, true),
        Field::new("label", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from_iter_values(0..n as i64)),
            Arc::new(TimestampMicrosecondArray::from_iter_values(
                stamps.iter().map(|s| micros(s)),
            )),
            Arc::new(Float64Array::from_iter_values((0..n).map(|i| i as f64 + 0.25))),
            Arc::new(StringArray::from_iter_values((0..n).map(|i| format!("asset-{i}")))),
        ],
    )?;

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(buf)
}

/// Parquet payload with a text timestamp column.
pub fn text_parquet(ts_column: &str, stamps: &[&str]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let schema = Arc::new(Schema::new(vec![Field::new(ts_column, DataType::Utf8, true)]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(StringArray::from(stamps.to_vec()))],
    )?;

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(buf)
}

pub fn zip_archive(entries: &[(&str, Vec<u8>)]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        zip.start_file(*name, SimpleFileOptions::default())?;
        zip.write_all(contents)?;
    }
    Ok(zip.finish()?.into_inner())
}
