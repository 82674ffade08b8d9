//!
//! A thin client for the [Alpha Vantage](https://www.alphavantage.co/documentation/) market data
//! API.
//!
//! The client only retrieves the raw JSON documents, reshaping them into rows is the job of the
//! [crate::intraday] and [crate::forex] modules.
//!
use async_trait::async_trait;
use serde_json::Value;
use tracing::log::*;
use url::Url;

use std::time::Duration;

use crate::error::{LakeError, LakeResult};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
/// Bar interval requested for the intraday series
pub const INTRADAY_INTERVAL: &str = "15min";

/// Source of raw market data documents
#[async_trait]
pub trait MarketData: Send + Sync {
    /// `TIME_SERIES_INTRADAY` for `symbol` with the full output size
    async fn intraday(&self, symbol: &str) -> LakeResult<Value>;

    /// `CURRENCY_EXCHANGE_RATE` between the two currencies
    async fn exchange_rate(&self, from_currency: &str, to_currency: &str) -> LakeResult<Value>;
}

#[derive(Clone, Debug)]
pub struct AlphaVantage {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl AlphaVantage {
    pub fn new(api_key: impl Into<String>, base_url: Url) -> LakeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    async fn query(&self, params: &[(&str, &str)]) -> LakeResult<Value> {
        debug!("Querying Alpha Vantage with {params:?}");
        let response = self
            .client
            .get(self.base_url.clone())
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        check_api_error(body)
    }
}

#[async_trait]
impl MarketData for AlphaVantage {
    async fn intraday(&self, symbol: &str) -> LakeResult<Value> {
        info!("Fetching intraday series for {symbol}");
        self.query(&[
            ("function", "TIME_SERIES_INTRADAY"),
            ("symbol", symbol),
            ("interval", INTRADAY_INTERVAL),
            ("outputsize", "full"),
            ("datatype", "json"),
        ])
        .await
    }

    async fn exchange_rate(&self, from_currency: &str, to_currency: &str) -> LakeResult<Value> {
        info!("Fetching exchange rate {from_currency} -> {to_currency}");
        self.query(&[
            ("function", "CURRENCY_EXCHANGE_RATE"),
            ("from_currency", from_currency),
            ("to_currency", to_currency),
        ])
        .await
    }
}

/// Alpha Vantage answers errors and throttling with HTTP 200 and one of these keys
const ERROR_KEYS: [&str; 3] = ["Error Message", "Note", "Information"];

/// Turn Alpha Vantage's in-band error documents into [LakeError::Api]
pub fn check_api_error(body: Value) -> LakeResult<Value> {
    if let Some(object) = body.as_object() {
        for key in ERROR_KEYS {
            if let Some(message) = object.get(key) {
                let message = message.as_str().unwrap_or_default();
                error!("Alpha Vantage returned `{key}`: {message}");
                return Err(LakeError::Api(message.to_string()));
            }
        }
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_api_error() {
        let ok = json!({"Meta Data": {}, "Time Series (15min)": {}});
        assert!(check_api_error(ok).is_ok());

        for key in ERROR_KEYS {
            let mut body = serde_json::Map::new();
            body.insert(key.to_string(), json!("Thank you for using Alpha Vantage!"));
            let result = check_api_error(Value::Object(body));
            assert!(
                matches!(result, Err(LakeError::Api(ref m)) if m.starts_with("Thank you")),
                "{key} should be an API error: {result:?}"
            );
        }
    }

    #[test]
    fn test_new_client() {
        let url = Url::parse(DEFAULT_BASE_URL).expect("Failed to parse");
        let client = AlphaVantage::new("demo", url).expect("Failed to build client");
        assert_eq!(client.base_url.as_str(), DEFAULT_BASE_URL);
    }
}
