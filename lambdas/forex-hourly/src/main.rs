///
/// The forex-hourly function records the current exchange rate of a currency pair as a single
/// JSON object, partitioned by the day and hour Alpha Vantage last refreshed the quote
///
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::log::*;

use finlake::alphavantage::MarketData;
use finlake::config::{market_data_from_env, LakeConfig};
use finlake::forex::{ingest, CurrencyPair};
use finlake::storage::{S3Stores, StoreProvider};
use finlake::{LakeError, LakeResult};
use finlake_lambda_shared::payload::{field, fields};
use finlake_lambda_shared::Response;

const COMPLETED: &str = "Request Completed";
const MISSING_PAIR: &str = "Request must include from_currency and to_currency";
const WRITE_FAILED: &str = "Unable to write to S3";

/// `{"from_currency": "BTC", "to_currency": "USD"}`
#[derive(Clone, Debug, Default, PartialEq)]
struct ForexEvent {
    from_currency: Option<String>,
    to_currency: Option<String>,
}

impl ForexEvent {
    /// A currency which is not a string is treated as missing
    fn from_payload(payload: &Value) -> LakeResult<Self> {
        let fields = fields(payload)?;
        Ok(Self {
            from_currency: field(fields, "from_currency")
                .map_err(|_| LakeError::MissingField("from_currency"))?,
            to_currency: field(fields, "to_currency")
                .map_err(|_| LakeError::MissingField("to_currency"))?,
        })
    }

    fn pair(&self) -> LakeResult<CurrencyPair> {
        CurrencyPair::parse(self.from_currency.as_deref(), self.to_currency.as_deref())
    }
}

async fn handle(
    provider: &dyn StoreProvider,
    market: &dyn MarketData,
    config: &LakeConfig,
    payload: &Value,
) -> Response {
    let pair = match ForexEvent::from_payload(payload).and_then(|event| event.pair()) {
        Ok(pair) => pair,
        Err(err) => return Response::from_error(&err, MISSING_PAIR, WRITE_FAILED),
    };

    match ingest(provider, market, &config.bucket, &config.forex_prefix, &pair).await {
        Ok(location) => {
            info!(
                "Recorded {}/{} at {location}",
                pair.from_currency, pair.to_currency
            );
            Response::ok(COMPLETED)
        }
        Err(err) => Response::from_error(&err, MISSING_PAIR, WRITE_FAILED),
    }
}

/// This is the primary invocation point for the lambda and should do the heavy lifting
async fn function_handler(
    market: &dyn MarketData,
    config: &LakeConfig,
    event: LambdaEvent<Value>,
) -> Result<Response, Error> {
    debug!("Receiving event: {:?}", event);
    Ok(handle(&S3Stores, market, config, &event.payload).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        // disable printing the name of the module in every log line.
        .with_target(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();

    let config = LakeConfig::from_env().expect("The `BUCKET_NAME` must be set in the environment");
    let market = market_data_from_env().expect("The `API_KEY` must be set in the environment");
    info!(
        "Starting forex-hourly, writing to s3://{}/{}",
        config.bucket, config.forex_prefix
    );

    let config = &config;
    let market = &market;
    run(service_fn(move |event| async move {
        function_handler(market, config, event).await
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use finlake::alphavantage::check_api_error;
    use finlake::storage::{read_object, MemoryStores};
    use finlake::ObjectLocation;
    use serde_json::json;

    /// Answers every exchange rate request with the named fixture
    struct Fixture(&'static str);

    #[async_trait]
    impl MarketData for Fixture {
        async fn intraday(&self, _symbol: &str) -> LakeResult<Value> {
            Err(LakeError::Api("exchange rates only".into()))
        }

        async fn exchange_rate(&self, _from: &str, _to: &str) -> LakeResult<Value> {
            let buf = std::fs::read_to_string(format!("../../tests/data/{}", self.0))?;
            check_api_error(serde_json::from_str(&buf)?)
        }
    }

    #[tokio::test]
    async fn test_records_quote() -> LakeResult<()> {
        let stores = MemoryStores::default();
        let response = handle(
            &stores,
            &Fixture("alphavantage-exchange-rate.json"),
            &LakeConfig::new("big-data-pipeline"),
            &json!({"from_currency": "BTC", "to_currency": "USD"}),
        )
        .await;
        assert_eq!(response, Response::ok(COMPLETED));

        let location = ObjectLocation::new(
            "big-data-pipeline",
            "datalake/forex_hourly/date=2024-01-02/BTC_USD_19.json",
        );
        let stored: Value = serde_json::from_slice(&read_object(&stores, &location).await?)?;
        assert_eq!(stored["from_currency_name"], "Bitcoin");
        assert_eq!(stored["bid_price"], 42814.59);
        Ok(())
    }

    #[tokio::test]
    async fn test_requires_both_currencies() {
        let stores = MemoryStores::default();
        for payload in [
            json!({}),
            json!({"from_currency": "BTC"}),
            json!({"to_currency": "USD"}),
            json!({"from_currency": ["BTC"], "to_currency": "USD"}),
            json!({"from_currency": "BTC", "to_currency": 840}),
            json!("BTC/USD"),
        ] {
            let response = handle(
                &stores,
                &Fixture("alphavantage-exchange-rate.json"),
                &LakeConfig::new("big-data-pipeline"),
                &payload,
            )
            .await;
            assert_eq!(response, Response::client_error(MISSING_PAIR));
        }
    }

    #[test]
    fn test_event_from_payload() -> LakeResult<()> {
        let event = ForexEvent::from_payload(&json!({
            "from_currency": "USD",
            "to_currency": "JPY",
            "source": "aws.events"
        }))?;
        assert_eq!(event.pair()?, CurrencyPair::parse(Some("USD"), Some("JPY"))?);
        Ok(())
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let stores = MemoryStores::default();
        let response = handle(
            &stores,
            &Fixture("alphavantage-rate-limited.json"),
            &LakeConfig::new("big-data-pipeline"),
            &json!({"from_currency": "BTC", "to_currency": "USD"}),
        )
        .await;
        assert_eq!(response, Response::server_error(WRITE_FAILED));
    }
}
