///
/// The intraday-stock function fetches the 15 minute bars of a ticker from Alpha Vantage and
/// lands one Parquet file per trading day under the intraday prefix.
///
/// The scheduled rules invoke it every night for yesterday, the backfill driver invokes it with
/// `"backfill": true` to write everything Alpha Vantage still has
///
use chrono::{NaiveDate, Utc};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::log::*;

use finlake::alphavantage::MarketData;
use finlake::config::{market_data_from_env, LakeConfig};
use finlake::intraday::{ingest, IntradayRequest};
use finlake::storage::{S3Stores, StoreProvider};
use finlake::{LakeError, LakeResult};
use finlake_lambda_shared::payload::{field, fields, raw_field};
use finlake_lambda_shared::Response;

const COMPLETED: &str = "Request Completed";
const INVALID_DATES: &str = "Invalid Dates! Dates must be in format 'YYYY-MM-DD'";
const NO_TICKER: &str = "Request Failed! No ticker included in request";
const FETCH_FAILED: &str = "Unable to load intraday data";
const MALFORMED: &str = "Request Failed! Malformed request";

/// `{"ticker": "MSFT", "dates": ["2024-01-02"], "backfill": false}`
#[derive(Clone, Debug, Default, PartialEq)]
struct IntradayEvent {
    ticker: Option<String>,
    dates: Vec<String>,
    backfill: bool,
}

impl IntradayEvent {
    /// Read the event out of a raw payload. The dates are read first, a malformed date is
    /// reported ahead of a missing ticker
    fn from_payload(payload: &Value) -> LakeResult<Self> {
        let fields = fields(payload)?;
        let dates = field::<Vec<String>>(fields, "dates")
            .map_err(|_| LakeError::InvalidDate(raw_field(fields, "dates")))?
            .unwrap_or_default();
        let ticker =
            field::<String>(fields, "ticker").map_err(|_| LakeError::MissingField("ticker"))?;
        let backfill = field::<bool>(fields, "backfill")
            .map_err(|e| LakeError::InvalidEvent(format!("`backfill` {e}")))?
            .unwrap_or_default();
        Ok(Self {
            ticker,
            dates,
            backfill,
        })
    }

    fn request(&self) -> LakeResult<IntradayRequest> {
        IntradayRequest::parse(self.ticker.as_deref(), &self.dates, self.backfill)
    }
}

async fn handle(
    provider: &dyn StoreProvider,
    market: &dyn MarketData,
    config: &LakeConfig,
    payload: &Value,
    today: NaiveDate,
) -> Response {
    let request = match IntradayEvent::from_payload(payload).and_then(|event| event.request()) {
        Ok(request) => request,
        Err(LakeError::InvalidDate(date)) => {
            warn!("Rejecting request with invalid date `{date}`");
            return Response::client_error(INVALID_DATES);
        }
        Err(LakeError::InvalidEvent(reason)) => {
            warn!("Rejecting malformed request: {reason}");
            return Response::client_error(MALFORMED);
        }
        Err(err) => return Response::from_error(&err, NO_TICKER, FETCH_FAILED),
    };

    match ingest(
        provider,
        market,
        &config.bucket,
        &config.intraday_prefix,
        &request,
        today,
    )
    .await
    {
        Ok(written) => {
            info!(
                "Wrote {} daily files for {}: {written:?}",
                written.len(),
                request.ticker
            );
            Response::ok(COMPLETED)
        }
        Err(err) => Response::from_error(&err, INVALID_DATES, FETCH_FAILED),
    }
}

/// This is the primary invocation point for the lambda and should do the heavy lifting
async fn function_handler(
    market: &dyn MarketData,
    config: &LakeConfig,
    event: LambdaEvent<Value>,
) -> Result<Response, Error> {
    debug!("Receiving event: {:?}", event);
    let today = Utc::now().date_naive();
    Ok(handle(&S3Stores, market, config, &event.payload, today).await)
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
        "Starting intraday-stock, writing to s3://{}/{}",
        config.bucket, config.intraday_prefix
    );

    let config = &config;
    let market = &market;
    run(service_fn(move |event| async move {
        function_handler(market, config, event).await
    }))
    .await
}
