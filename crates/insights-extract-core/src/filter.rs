//! Date filtering of a single table.
//!
//! [`filter_table`] is category-agnostic: the caller passes the
//! [`FilterPolicy`] resolved for the file's category. The timestamp column is
//! normalized to a per-row calendar date, rows whose date equals the target
//! date are kept, and everything else is dropped.
//!
//! Supported timestamp column types:
//! - `Timestamp(unit, tz)`: used as stored; the date is observed in `tz` when set.
//! - `Date32` / `Date64`: used as stored.
//! - `Int64`: epoch milliseconds.
//! - `Utf8`, `LargeUtf8`, `Utf8View` and dictionary-encoded strings: parsed leniently as `YYYY-MM-DD HH:MM:SS[.fff]`.
//!   Unparseable values never match. The text column is replaced by the parsed
//!   `Timestamp(Microsecond)` column in the result.

use std::sync::Arc;

use arrow::{
    array::{
        Array, ArrayRef, AsArray, BooleanArray, GenericStringArray, OffsetSizeTrait,
        TimestampMicrosecondArray, timezone::Tz,
    },
    compute::{cast, filter_record_batch},
    datatypes::{DataType, Date32Type, Date64Type, Int64Type, TimeUnit},
    temporal_conversions::{date32_to_datetime, date64_to_datetime},
};
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use snafu::prelude::*;

use crate::{
    error::{
        FilterError, FilterSnafu, InvalidTimezoneSnafu, MissingColumnSnafu,
        UnsupportedColumnTypeSnafu,
    },
    policy::{FilterPolicy, MissingColumn},
    table::Table,
    temporal::{TargetDate, calendar_date, naive_from_raw, parse_text_timestamp},
};

/// Result of filtering one table: the retained rows, or a file-level failure.
pub type FilterOutcome = Result<Table, FilterError>;

/// A timestamp column reduced to one optional calendar date per row.
struct NormalizedColumn {
    dates: Vec<Option<NaiveDate>>,
    /// Parsed replacement for text columns; `None` when the stored column is kept.
    replacement: Option<ArrayRef>,
}

/// Keep the rows of `table` whose timestamp falls on `target`.
///
/// A table without the policy's column fails with
/// [`FilterError::MissingColumn`], unless the policy treats the column as
/// optional, in which case an empty table is returned. A result with zero
/// rows is a success.
pub fn filter_table(table: &Table, target: TargetDate, policy: &FilterPolicy) -> FilterOutcome {
    let column = policy.timestamp_column.as_str();

    let Some((idx, array)) = table.column(column) else {
        return match policy.missing_column {
            MissingColumn::Fail => MissingColumnSnafu { column }.fail(),
            MissingColumn::TreatAsEmpty => {
                debug!("column '{column}' absent; treating payload as empty");
                Ok(table.empty_like())
            }
        };
    };

    let normalized = normalize(column, array)?;

    let wanted = target.date();
    let mask: BooleanArray = normalized
        .dates
        .iter()
        .map(|d| Some(*d == Some(wanted)))
        .collect();

    let source = match normalized.replacement {
        Some(parsed) => table
            .replace_column(idx, parsed)
            .context(FilterSnafu { column })?,
        None => table.clone(),
    };

    let filtered = filter_record_batch(source.record_batch(), &mask).context(FilterSnafu { column })?;
    Ok(Table::new(filtered))
}

fn normalize(column: &str, array: &ArrayRef) -> Result<NormalizedColumn, FilterError> {
    let dates = match array.data_type() {
        DataType::Timestamp(unit, tz) => {
            let tz = match tz.as_deref() {
                Some(name) => Some(name.parse::<Tz>().context(InvalidTimezoneSnafu {
                    column,
                    timezone: name,
                })?),
                None => None,
            };
            raw_dates(column, array, *unit, tz.as_ref())?
        }
        DataType::Int64 => raw_dates(column, array, TimeUnit::Millisecond, None)?,
        DataType::Date32 => array
            .as_primitive::<Date32Type>()
            .iter()
            .map(|v| v.and_then(date32_to_datetime).map(|dt| dt.date()))
            .collect(),
        DataType::Date64 => array
            .as_primitive::<Date64Type>()
            .iter()
            .map(|v| v.and_then(date64_to_datetime).map(|dt| dt.date()))
            .collect(),
        DataType::Utf8 => return Ok(parse_text(array.as_string::<i32>())),
        DataType::LargeUtf8 => return Ok(parse_text(array.as_string::<i64>())),
        other if is_text(other) => {
            let text = cast(array.as_ref(), &DataType::Utf8).context(FilterSnafu { column })?;
            return Ok(parse_text(text.as_string::<i32>()));
        }
        other => {
            return UnsupportedColumnTypeSnafu {
                column,
                datatype: other.clone(),
            }
            .fail();
        }
    };

    Ok(NormalizedColumn {
        dates,
        replacement: None,
    })
}

/// String views and dictionary-encoded strings, which are read as `Utf8`.
fn is_text(datatype: &DataType) -> bool {
    match datatype {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => true,
        DataType::Dictionary(_, values) => is_text(values),
        _ => false,
    }
}

/// Dates for a column whose values are integer offsets from the epoch in `unit`.
fn raw_dates(
    column: &str,
    array: &ArrayRef,
    unit: TimeUnit,
    tz: Option<&Tz>,
) -> Result<Vec<Option<NaiveDate>>, FilterError> {
    let raw = cast(array.as_ref(), &DataType::Int64).context(FilterSnafu { column })?;
    Ok(raw
        .as_primitive::<Int64Type>()
        .iter()
        .map(|v| {
            v.and_then(|v| naive_from_raw(unit, v))
                .map(|utc| calendar_date(utc, tz))
        })
        .collect())
}

fn parse_text<O: OffsetSizeTrait>(array: &GenericStringArray<O>) -> NormalizedColumn {
    let parsed: Vec<Option<NaiveDateTime>> = array
        .iter()
        .map(|v| v.and_then(parse_text_timestamp))
        .collect();

    let unparseable = parsed
        .iter()
        .zip(array.iter())
        .filter(|(p, raw)| p.is_none() && raw.is_some())
        .count();
    if unparseable > 0 {
        debug!("{unparseable} text timestamps could not be parsed and will not match");
    }

    let dates = parsed.iter().map(|p| p.map(|dt| dt.date())).collect();
    let micros: TimestampMicrosecondArray = parsed
        .iter()
        .map(|p| p.map(|dt| dt.and_utc().timestamp_micros()))
        .collect();

    NormalizedColumn {
        dates,
        replacement: Some(Arc::new(micros)),
    }
}
