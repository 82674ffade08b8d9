//!
//! Hourly forex quotes. Each invocation lands a single JSON record per currency pair and hour:
//!
//! ```text
//! <prefix>/date=2024-01-02/BTC_USD_19.json
//! ```
//!
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::log::*;

use crate::alphavantage::MarketData;
use crate::error::{LakeError, LakeResult};
use crate::location::{parse_date, partition_key, ObjectLocation};
use crate::storage::StoreProvider;
use crate::write::write_json;

pub const DEFAULT_PREFIX: &str = "datalake/forex_hourly";

/// Key of the quote object inside the `CURRENCY_EXCHANGE_RATE` response
const RESPONSE_KEY: &str = "Realtime Currency Exchange Rate";

/// A currency pair to quote, both sides are required
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CurrencyPair {
    pub from_currency: String,
    pub to_currency: String,
}

impl CurrencyPair {
    pub fn parse(from_currency: Option<&str>, to_currency: Option<&str>) -> LakeResult<Self> {
        let required = |value: Option<&str>, name: &'static str| match value.map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(LakeError::MissingField(name)),
        };
        Ok(Self {
            from_currency: required(from_currency, "from_currency")?,
            to_currency: required(to_currency, "to_currency")?,
        })
    }
}

/// The renamed exchange rate record as it is written to the lake
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ExchangeRate {
    #[serde(rename(deserialize = "1. From_Currency Code"))]
    pub from_currency_code: Option<String>,
    #[serde(rename(deserialize = "2. From_Currency Name"))]
    pub from_currency_name: Option<String>,
    #[serde(rename(deserialize = "3. To_Currency Code"))]
    pub to_currency_code: Option<String>,
    #[serde(rename(deserialize = "4. To_Currency Name"))]
    pub to_currency_name: Option<String>,
    #[serde(
        rename(deserialize = "5. Exchange Rate"),
        default,
        deserialize_with = "zero_on_failure"
    )]
    pub exchange_rate: f64,
    #[serde(rename(deserialize = "6. Last Refreshed"))]
    pub last_refreshed: Option<String>,
    #[serde(rename(deserialize = "7. Time Zone"))]
    pub time_zone: Option<String>,
    #[serde(
        rename(deserialize = "8. Bid Price"),
        default,
        deserialize_with = "zero_on_failure"
    )]
    pub bid_price: f64,
    #[serde(
        rename(deserialize = "9. Ask Price"),
        default,
        deserialize_with = "zero_on_failure"
    )]
    pub ask_price: f64,
}

/// Prices which are absent or cannot be read as numbers are recorded as `0.0`
fn zero_on_failure<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

impl ExchangeRate {
    /// Pull the quote out of a `CURRENCY_EXCHANGE_RATE` response
    pub fn from_response(body: &Value) -> LakeResult<Self> {
        let quote = body
            .get(RESPONSE_KEY)
            .ok_or_else(|| LakeError::MalformedData(format!("no `{RESPONSE_KEY}` in response")))?;
        Ok(ExchangeRate::deserialize(quote)?)
    }

    ///
    /// The object key for this quote, `<prefix>/date=<YYYY-MM-DD>/<FROM>_<TO>_<HH>.json`, with
    /// the date and hour taken from `last_refreshed`
    pub fn object_key(&self, prefix: &str) -> LakeResult<String> {
        let refreshed = self
            .last_refreshed
            .as_deref()
            .ok_or_else(|| LakeError::MalformedData("quote has no `last_refreshed`".into()))?;
        let (day, hour) = match (refreshed.get(..10), refreshed.get(11..13)) {
            (Some(day), Some(hour)) if hour.chars().all(|c| c.is_ascii_digit()) => (day, hour),
            _ => {
                return Err(LakeError::MalformedData(format!(
                    "cannot take a date and hour from `{refreshed}`"
                )))
            }
        };
        let date = parse_date(day)
            .map_err(|_| LakeError::MalformedData(format!("bad `last_refreshed` `{refreshed}`")))?;

        let (from, to) = match (
            self.from_currency_code.as_deref().filter(|c| !c.is_empty()),
            self.to_currency_code.as_deref().filter(|c| !c.is_empty()),
        ) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                return Err(LakeError::MalformedData(
                    "quote has no currency codes".into(),
                ))
            }
        };
        let file = format!("{from}_{to}_{hour}.json");
        Ok(partition_key(prefix, &date, &file))
    }

    /// Take any currency code the quote left out from the pair which was requested
    pub fn fill_codes(&mut self, pair: &CurrencyPair) {
        for (code, requested) in [
            (&mut self.from_currency_code, &pair.from_currency),
            (&mut self.to_currency_code, &pair.to_currency),
        ] {
            if code.as_deref().map_or(true, str::is_empty) {
                *code = Some(requested.clone());
            }
        }
    }
}

///
/// Fetch the latest quote for `pair` and write it into `bucket` under `prefix`.
///
/// Returns the location which was written
pub async fn ingest(
    provider: &dyn StoreProvider,
    market: &dyn MarketData,
    bucket: &str,
    prefix: &str,
    pair: &CurrencyPair,
) -> LakeResult<ObjectLocation> {
    let body = market
        .exchange_rate(&pair.from_currency, &pair.to_currency)
        .await?;
    let mut quote = ExchangeRate::from_response(&body)?;
    quote.fill_codes(pair);
    debug!("Received quote {quote:?}");

    let location = ObjectLocation::new(bucket, quote.object_key(prefix)?);
    write_json(provider, &location, &quote).await?;
    Ok(location)
}
