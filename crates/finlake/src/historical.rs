//!
//! Conversion of the gzip compressed historical forex dumps into Parquet.
//!
//! The dumps are nested JSON documents of the form:
//!
//! ```json
//! {"BTC": {"USD": {"2022-10-03": {"open": 19044.1, "high": 19121.3, ...}}}}
//! ```
//!
//! and every leaf turns into a single row of [FOREX_HISTORICAL_COLUMNS].
//!
use arrow::array::{ArrayRef, Date32Array, Float64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Date32Type, Field, Schema, SchemaRef};
use chrono::NaiveDate;
use flate2::read::GzDecoder;
use serde::{Deserialize, Deserializer};
use tracing::log::*;

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use crate::error::{LakeError, LakeResult};
use crate::location::{join_key, parse_date, ObjectLocation};
use crate::storage::{read_object, StoreProvider};
use crate::write::write_parquet;

/// Default key prefix the converted files are written under
pub const DEFAULT_DEST_PREFIX: &str = "datalake/forex_historical";
/// Suffix of the raw dumps which trigger a conversion
pub const SOURCE_SUFFIX: &str = ".json.gz";

/// Column names of the converted files, in order
pub const FOREX_HISTORICAL_COLUMNS: [&str; 9] = [
    "from_currency",
    "to_currency",
    "date",
    "open",
    "high",
    "low",
    "close",
    "adj_close",
    "volume",
];

/// The fixed schema for `forex_daily_historical`
pub fn schema() -> SchemaRef {
    let mut fields = vec![
        Field::new(FOREX_HISTORICAL_COLUMNS[0], DataType::Utf8, false),
        Field::new(FOREX_HISTORICAL_COLUMNS[1], DataType::Utf8, false),
        Field::new(FOREX_HISTORICAL_COLUMNS[2], DataType::Date32, false),
    ];
    for name in &FOREX_HISTORICAL_COLUMNS[3..] {
        fields.push(Field::new(*name, DataType::Float64, true));
    }
    Arc::new(Schema::new(fields))
}

/// The daily bar found at the leaves of the source document
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DailyBar {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub open: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub low: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub adj_close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
}

/// from currency -> to currency -> date -> bar
type Document = BTreeMap<String, BTreeMap<String, BTreeMap<String, DailyBar>>>;

/// One row of the `forex_daily_historical` table
#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalRow {
    pub from_currency: String,
    pub to_currency: String,
    pub date: NaiveDate,
    pub bar: DailyBar,
}

/// Numbers may arrive as JSON numbers or as numeric strings; anything else is treated as null
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Inflate a gzip buffer
pub fn gunzip(compressed: &[u8]) -> LakeResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut buf = vec![];
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Flatten the nested source document into rows
pub fn parse_rows(json: &[u8]) -> LakeResult<Vec<HistoricalRow>> {
    let document: Document = serde_json::from_slice(json)
        .map_err(|e| LakeError::MalformedData(format!("unexpected document shape: {e}")))?;

    let mut rows = vec![];
    for (from_currency, targets) in document {
        for (to_currency, days) in targets {
            for (date, bar) in days {
                rows.push(HistoricalRow {
                    from_currency: from_currency.clone(),
                    to_currency: to_currency.clone(),
                    date: parse_date(&date)?,
                    bar,
                });
            }
        }
    }
    Ok(rows)
}

/// Build a [RecordBatch] with the fixed `forex_daily_historical` schema
pub fn to_record_batch(rows: &[HistoricalRow]) -> LakeResult<RecordBatch> {
    let floats = |f: fn(&DailyBar) -> Option<f64>| -> ArrayRef {
        Arc::new(Float64Array::from(
            rows.iter().map(|r| f(&r.bar)).collect::<Vec<_>>(),
        ))
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.from_currency.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.to_currency.as_str()),
        )),
        Arc::new(Date32Array::from_iter_values(
            rows.iter().map(|r| Date32Type::from_naive_date(r.date)),
        )),
        floats(|b| b.open),
        floats(|b| b.high),
        floats(|b| b.low),
        floats(|b| b.close),
        floats(|b| b.adj_close),
        floats(|b| b.volume),
    ];
    Ok(RecordBatch::try_new(schema(), columns)?)
}

/// Compute where the Parquet conversion of a freshly uploaded dump should land.
///
/// `data/forex_historical/202210_forex.json.gz` becomes
/// `<dest_prefix>/202210_forex.parquet` in the same bucket. Objects which are not gzip JSON
/// dumps return `None`
pub fn destination_for(source: &ObjectLocation, dest_prefix: &str) -> Option<ObjectLocation> {
    let stem = source.file_name().strip_suffix(SOURCE_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    let file = format!("{stem}.parquet");
    Some(ObjectLocation::new(
        source.bucket.clone(),
        join_key([dest_prefix, file.as_str()]),
    ))
}

///
/// Read the gzip JSON dump at `source`, reshape it and write it as snappy Parquet to
/// `destination`.
///
/// Returns the number of rows written
pub async fn convert(
    provider: &dyn StoreProvider,
    source: &ObjectLocation,
    destination: &ObjectLocation,
) -> LakeResult<usize> {
    info!("Converting {source} into {destination}");
    let compressed = read_object(provider, source).await?;
    let json = gunzip(&compressed)?;
    let rows = parse_rows(&json)?;
    debug!("Parsed {} rows out of {source}", rows.len());

    let batch = to_record_batch(&rows)?;
    write_parquet(provider, destination, &batch).await?;
    Ok(rows.len())
}
