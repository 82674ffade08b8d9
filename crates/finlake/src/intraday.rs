//!
//! Intraday stock bars, fetched from Alpha Vantage and written as one Parquet file per ticker and
//! trading day:
//!
//! ```text
//! <prefix>/date=2024-01-02/MSFT.parquet
//! ```
//!
use arrow::array::{ArrayRef, Float64Array, RecordBatch, StringArray, TimestampSecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::log::*;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::alphavantage::MarketData;
use crate::error::{LakeError, LakeResult};
use crate::location::{parse_date, partition_key, ObjectLocation};
use crate::storage::StoreProvider;
use crate::write::write_parquet;

pub const DEFAULT_PREFIX: &str = "datalake/stock_data_intraday";

/// Format of the timestamps keying the Alpha Vantage time series
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Mapping of the Alpha Vantage bar fields onto column names
const COLUMN_MAPPER: [(&str, &str); 5] = [
    ("1. open", "open"),
    ("2. high", "high"),
    ("3. low", "low"),
    ("4. close", "close"),
    ("5. volume", "volume"),
];

/// The fixed schema for `stock_data_intraday`
pub fn schema() -> SchemaRef {
    let mut fields = vec![
        Field::new(
            "datetime",
            DataType::Timestamp(TimeUnit::Second, None),
            false,
        ),
        Field::new("ticker", DataType::Utf8, false),
    ];
    for (_, name) in COLUMN_MAPPER {
        fields.push(Field::new(name, DataType::Float64, true));
    }
    Arc::new(Schema::new(fields))
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntradayBar {
    pub datetime: NaiveDateTime,
    pub ticker: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// A validated request to land intraday data
#[derive(Clone, Debug, PartialEq)]
pub struct IntradayRequest {
    pub ticker: String,
    pub dates: Vec<NaiveDate>,
    pub backfill: bool,
}

impl IntradayRequest {
    /// Validate the raw request values. Dates are checked before the ticker so that a request
    /// which is wrong in both ways reports the date problem
    pub fn parse(ticker: Option<&str>, dates: &[String], backfill: bool) -> LakeResult<Self> {
        let dates = dates
            .iter()
            .map(|d| parse_date(d))
            .collect::<LakeResult<Vec<_>>>()?;

        let ticker = match ticker.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(LakeError::MissingField("ticker")),
        };

        Ok(Self {
            ticker,
            dates,
            backfill,
        })
    }

    ///
    /// Decide which trading days to write.
    ///
    /// Explicit dates always win. Without them a scheduled run writes yesterday relative to
    /// `today`, while a backfill writes every day present in `bars`
    pub fn dates_to_write(&self, bars: &[IntradayBar], today: NaiveDate) -> Vec<NaiveDate> {
        if !self.dates.is_empty() {
            let unique: BTreeSet<NaiveDate> = self.dates.iter().cloned().collect();
            return unique.into_iter().collect();
        }
        if self.backfill {
            let unique: BTreeSet<NaiveDate> = bars.iter().map(|b| b.datetime.date()).collect();
            return unique.into_iter().collect();
        }
        today
            .checked_sub_days(Days::new(1))
            .into_iter()
            .collect()
    }
}

fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Flatten a `TIME_SERIES_INTRADAY` document into bars sorted by time
pub fn parse_bars(ticker: &str, body: &Value) -> LakeResult<Vec<IntradayBar>> {
    let series = body
        .as_object()
        .and_then(|o| {
            o.iter()
                .find(|(key, _)| key.starts_with("Time Series"))
                .map(|(_, v)| v)
        })
        .and_then(Value::as_object)
        .ok_or_else(|| LakeError::MalformedData("no `Time Series` in response".into()))?;

    let mut bars = vec![];
    for (stamp, fields) in series {
        let datetime = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .map_err(|_| LakeError::MalformedData(format!("unparseable timestamp `{stamp}`")))?;
        let field = |source: &str| lenient_f64(fields.get(source));
        bars.push(IntradayBar {
            datetime,
            ticker: ticker.to_string(),
            open: field(COLUMN_MAPPER[0].0),
            high: field(COLUMN_MAPPER[1].0),
            low: field(COLUMN_MAPPER[2].0),
            close: field(COLUMN_MAPPER[3].0),
            volume: field(COLUMN_MAPPER[4].0),
        });
    }
    bars.sort_by_key(|b| b.datetime);
    Ok(bars)
}

/// Build a [RecordBatch] with the fixed `stock_data_intraday` schema
pub fn to_record_batch(bars: &[IntradayBar]) -> LakeResult<RecordBatch> {
    let floats = |f: fn(&IntradayBar) -> Option<f64>| -> ArrayRef {
        Arc::new(Float64Array::from(bars.iter().map(f).collect::<Vec<_>>()))
    };
    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampSecondArray::from_iter_values(
            bars.iter().map(|b| b.datetime.and_utc().timestamp()),
        )),
        Arc::new(StringArray::from_iter_values(
            bars.iter().map(|b| b.ticker.as_str()),
        )),
        floats(|b| b.open),
        floats(|b| b.high),
        floats(|b| b.low),
        floats(|b| b.close),
        floats(|b| b.volume),
    ];
    Ok(RecordBatch::try_new(schema(), columns)?)
}

///
/// Fetch the intraday series for the request's ticker and write one Parquet file per selected
/// trading day into `bucket` under `prefix`.
///
/// Days without any bars are skipped. Returns the locations which were written
pub async fn ingest(
    provider: &dyn StoreProvider,
    market: &dyn MarketData,
    bucket: &str,
    prefix: &str,
    request: &IntradayRequest,
    today: NaiveDate,
) -> LakeResult<Vec<ObjectLocation>> {
    let body = market.intraday(&request.ticker).await?;
    let bars = parse_bars(&request.ticker, &body)?;
    debug!("Received {} bars for {}", bars.len(), request.ticker);

    let file = format!("{}.parquet", request.ticker);
    let mut written = vec![];

    for date in request.dates_to_write(&bars, today) {
        let day: Vec<IntradayBar> = bars
            .iter()
            .filter(|b| b.datetime.date() == date)
            .cloned()
            .collect();
        if day.is_empty() {
            warn!("No bars for {} on {date}, skipping", request.ticker);
            continue;
        }

        let location = ObjectLocation::new(bucket, partition_key(prefix, &date, &file));
        write_parquet(provider, &location, &to_record_batch(&day)?).await?;
        written.push(location);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStores;
    use crate::write::read_parquet;
    use arrow::array::Array;
    use async_trait::async_trait;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "Meta Data": {
                "1. Information": "Intraday (15min) open, high, low, close prices and volume",
                "2. Symbol": "IBM",
                "4. Interval": "15min"
            },
            "Time Series (15min)": {
                "2024-01-03 10:00:00": {"1. open": "161.0", "2. high": "161.5", "3. low": "160.8", "4. close": "161.2", "5. volume": "10432"},
                "2024-01-02 19:45:00": {"1. open": "158.1", "2. high": "158.3", "3. low": "158.0", "4. close": "158.2", "5. volume": "2010"},
                "2024-01-02 19:30:00": {"1. open": "158.0", "2. high": "158.2", "3. low": "157.9", "4. close": "158.1", "5. volume": "1512"}
            }
        })
    }

    struct Canned(Value);

    #[async_trait]
    impl MarketData for Canned {
        async fn intraday(&self, _symbol: &str) -> LakeResult<Value> {
            Ok(self.0.clone())
        }

        async fn exchange_rate(&self, _from: &str, _to: &str) -> LakeResult<Value> {
            Err(LakeError::Api("not canned".into()))
        }
    }

    fn date(s: &str) -> NaiveDate {
        parse_date(s).expect("Failed to parse test date")
    }

    #[test]
    fn test_parse_request() {
        let request = IntradayRequest::parse(Some("MSFT"), &["2024-01-02".into()], false)
            .expect("Should be valid");
        assert_eq!(request.ticker, "MSFT");
        assert_eq!(request.dates, vec![date("2024-01-02")]);

        let result = IntradayRequest::parse(None, &[], false);
        assert!(matches!(result, Err(LakeError::MissingField("ticker"))));

        let result = IntradayRequest::parse(Some("  "), &[], true);
        assert!(matches!(result, Err(LakeError::MissingField("ticker"))));

        // Dates are validated before the ticker
        let result = IntradayRequest::parse(None, &["01/02/2024".into()], false);
        assert!(matches!(result, Err(LakeError::InvalidDate(_))));
    }

    #[test]
    fn test_parse_bars() -> LakeResult<()> {
        let bars = parse_bars("IBM", &sample())?;
        assert_eq!(bars.len(), 3);
        assert!(bars.windows(2).all(|w| w[0].datetime < w[1].datetime));
        assert_eq!(bars[0].open, Some(158.0));
        assert_eq!(bars[2].volume, Some(10432.0));
        assert_eq!(bars[2].ticker, "IBM");
        Ok(())
    }

    #[test]
    fn test_parse_bars_without_series() {
        let result = parse_bars("IBM", &json!({"Meta Data": {}}));
        assert!(matches!(result, Err(LakeError::MalformedData(_))));
    }

    #[test]
    fn test_dates_to_write() -> LakeResult<()> {
        let bars = parse_bars("IBM", &sample())?;
        let today = date("2024-01-04");

        let scheduled = IntradayRequest::parse(Some("IBM"), &[], false)?;
        assert_eq!(scheduled.dates_to_write(&bars, today), vec![date("2024-01-03")]);

        let backfill = IntradayRequest::parse(Some("IBM"), &[], true)?;
        assert_eq!(
            backfill.dates_to_write(&bars, today),
            vec![date("2024-01-02"), date("2024-01-03")]
        );

        let explicit = IntradayRequest::parse(
            Some("IBM"),
            &["2024-01-02".into(), "2024-01-02".into()],
            true,
        )?;
        assert_eq!(explicit.dates_to_write(&bars, today), vec![date("2024-01-02")]);
        Ok(())
    }

    #[test]
    fn test_record_batch() -> LakeResult<()> {
        let bars = parse_bars("IBM", &sample())?;
        let batch = to_record_batch(&bars)?;
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.schema(), schema());

        let stamps = batch
            .column(0)
            .as_any()
            .downcast_ref::<TimestampSecondArray>()
            .expect("datetime should be seconds");
        assert_eq!(stamps.value(0), 1704223800);
        Ok(())
    }

    #[tokio::test]
    async fn test_ingest_backfill_writes_each_day() -> LakeResult<()> {
        let stores = MemoryStores::default();
        let request = IntradayRequest::parse(Some("IBM"), &[], true)?;

        let written = ingest(
            &stores,
            &Canned(sample()),
            "lake",
            DEFAULT_PREFIX,
            &request,
            date("2024-01-10"),
        )
        .await?;

        let keys: Vec<&str> = written.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "datalake/stock_data_intraday/date=2024-01-02/IBM.parquet",
                "datalake/stock_data_intraday/date=2024-01-03/IBM.parquet",
            ]
        );

        let batches = read_parquet(&stores, &written[0]).await?;
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
        let tickers = batches[0]
            .column_by_name("ticker")
            .expect("no ticker column");
        assert_eq!(tickers.null_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_ingest_skips_empty_days() -> LakeResult<()> {
        let stores = MemoryStores::default();
        let request = IntradayRequest::parse(Some("IBM"), &[], false)?;

        // Yesterday relative to 2024-01-10 has no bars in the sample
        let written = ingest(
            &stores,
            &Canned(sample()),
            "lake",
            DEFAULT_PREFIX,
            &request,
            date("2024-01-10"),
        )
        .await?;
        assert!(written.is_empty());
        Ok(())
    }
}
