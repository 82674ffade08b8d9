///
/// The convert-historical function turns the gzip compressed historical forex dumps into snappy
/// Parquet files the `forex_daily_historical` table can read.
///
/// It is either triggered by S3 Event Notifications for newly uploaded dumps, or invoked directly
/// with an explicit `FileSource` and `FileDest`
///
use aws_lambda_events::s3::S3EventRecord;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::log::*;

use finlake::config::LakeConfig;
use finlake::historical::{convert, destination_for};
use finlake::storage::{S3Stores, StoreProvider};
use finlake::{LakeError, LakeResult, ObjectLocation};
use finlake_lambda_shared::payload::{field, fields};
use finlake_lambda_shared::*;

const SUBMITTED: &str = "Request Submitted";
const BAD_REQUEST: &str = "Event must include FileSource and FileDest";
const INVALID_DATES: &str = "Invalid Dates! Dates must be in format 'YYYY-MM-DD'";
const CONVERSION_FAILED: &str = "Unable to convert historical data";

/// Either a bucket notification or a direct invocation, whichever fields are present
#[derive(Clone, Debug, Default)]
struct HistoricalEvent {
    records: Vec<S3EventRecord>,
    file_source: Option<String>,
    file_dest: Option<String>,
}

/// A single source dump and where its Parquet rendition goes
#[derive(Clone, Debug, PartialEq)]
struct Conversion {
    source: ObjectLocation,
    destination: ObjectLocation,
}

impl HistoricalEvent {
    fn from_payload(payload: &Value) -> LakeResult<Self> {
        let fields = fields(payload)?;
        Ok(Self {
            records: field(fields, "Records")
                .map_err(|e| LakeError::InvalidEvent(format!("`Records` {e}")))?
                .unwrap_or_default(),
            file_source: field(fields, "FileSource")
                .map_err(|_| LakeError::MissingField("FileSource"))?,
            file_dest: field(fields, "FileDest").map_err(|_| LakeError::MissingField("FileDest"))?,
        })
    }

    /// Work out which conversions the event asks for. `Ok(None)` means the event has neither
    /// records nor a source and destination pair
    fn conversions(&self, dest_prefix: &str) -> LakeResult<Option<Vec<Conversion>>> {
        if !self.records.is_empty() {
            let conversions = created_locations(&self.records)
                .into_iter()
                .filter_map(|source| {
                    if suffix_from_key(&source.key) != RecordType::GzipJson {
                        warn!("convert-historical was invoked for {source} which is not a gzip JSON dump, ignoring");
                        return None;
                    }
                    let destination = destination_for(&source, dest_prefix)?;
                    Some(Conversion {
                        source,
                        destination,
                    })
                })
                .collect();
            return Ok(Some(conversions));
        }

        match (self.file_source.as_deref(), self.file_dest.as_deref()) {
            (Some(source), Some(destination)) => Ok(Some(vec![Conversion {
                source: ObjectLocation::parse(source)?,
                destination: ObjectLocation::parse(destination)?,
            }])),
            _ => Ok(None),
        }
    }
}

/// Run every conversion the payload asks for against `provider`
async fn handle(provider: &dyn StoreProvider, dest_prefix: &str, payload: &Value) -> Response {
    let conversions = match HistoricalEvent::from_payload(payload)
        .and_then(|event| event.conversions(dest_prefix))
    {
        Ok(Some(conversions)) => conversions,
        Ok(None) => return Response::client_error(BAD_REQUEST),
        Err(err) => return Response::from_error(&err, BAD_REQUEST, CONVERSION_FAILED),
    };

    for conversion in conversions.iter() {
        match convert(provider, &conversion.source, &conversion.destination).await {
            Ok(rows) => info!(
                "Wrote {rows} rows from {} to {}",
                conversion.source, conversion.destination
            ),
            Err(err) => return Response::from_error(&err, INVALID_DATES, CONVERSION_FAILED),
        }
    }
    Response::ok(SUBMITTED)
}

/// This is the primary invocation point for the lambda and should do the heavy lifting
async fn function_handler(
    config: &LakeConfig,
    event: LambdaEvent<Value>,
) -> Result<Response, Error> {
    debug!("Receiving event: {:?}", event);
    Ok(handle(&S3Stores, &config.historical_prefix, &event.payload).await)
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
    info!(
        "Starting convert-historical, writing to s3://{}/{}",
        config.bucket, config.historical_prefix
    );

    let config = &config;
    run(service_fn(move |event| async move {
        function_handler(config, event).await
    }))
    .await
}
