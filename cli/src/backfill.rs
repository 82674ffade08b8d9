//!
//! The backfill copies the relational history out of Postgres, asks the intraday Lambda for
//! everything Alpha Vantage still has for each ticker and then crawls the fresh partitions.
//!
//! Every step is attempted even when an earlier one fails, the failures are reported together
//! at the end.
//!
use aws_config::SdkConfig;
use aws_sdk_glue::types::WorkerType;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use finlake::catalog::{EXTRACT_JOB_WORKERS, EXTRACT_JOB_WORKER_TYPE};
use serde_json::{json, Value};
use tracing::log::*;

/// The steps a backfill will run, an empty step is skipped
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub job: Option<String>,
    pub function: String,
    pub tickers: Vec<String>,
    pub crawlers: Vec<String>,
}

pub async fn run(plan: &Plan, config: &SdkConfig) -> Result<(), anyhow::Error> {
    let glue = aws_sdk_glue::Client::new(config);
    let lambda = aws_sdk_lambda::Client::new(config);
    let mut failures: Vec<String> = vec![];

    if let Some(job) = &plan.job {
        if let Err(err) = start_job(&glue, job).await {
            error!("Failed to start {job}: {err:?}");
            failures.push(format!("job {job}"));
        }
    }

    for ticker in plan.tickers.iter() {
        if let Err(err) = invoke_intraday(&lambda, &plan.function, ticker).await {
            error!("Failed to backfill {ticker}: {err:?}");
            failures.push(format!("ticker {ticker}"));
        }
    }

    for crawler in plan.crawlers.iter() {
        match glue.start_crawler().name(crawler).send().await {
            Ok(response) => info!("Started crawler {crawler}: {response:?}"),
            Err(err) => {
                error!("Failed to start crawler {crawler}: {err:?}");
                failures.push(format!("crawler {crawler}"));
            }
        }
    }

    if failures.is_empty() {
        info!("Backfill completed");
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Backfill failed for: {}",
            failures.join(", ")
        ))
    }
}

async fn start_job(glue: &aws_sdk_glue::Client, job: &str) -> Result<(), anyhow::Error> {
    let response = glue
        .start_job_run()
        .job_name(job)
        .worker_type(WorkerType::from(EXTRACT_JOB_WORKER_TYPE))
        .number_of_workers(EXTRACT_JOB_WORKERS)
        .send()
        .await?;
    info!("Started {job}: {response:?}");
    Ok(())
}

async fn invoke_intraday(
    lambda: &aws_sdk_lambda::Client,
    function: &str,
    ticker: &str,
) -> Result<(), anyhow::Error> {
    info!("Invoking {function} to backfill {ticker}");
    let response = lambda
        .invoke()
        .function_name(function)
        .invocation_type(InvocationType::RequestResponse)
        .payload(Blob::new(intraday_payload(ticker)))
        .send()
        .await?;
    debug!("Invocation response: {response:?}");

    let payload = response.payload().map(|blob| blob.as_ref());
    check_invocation(function, response.function_error(), payload)
}

/// The event asking the intraday Lambda for every day Alpha Vantage has for `ticker`
pub fn intraday_payload(ticker: &str) -> String {
    json!({ "ticker": ticker, "backfill": true }).to_string()
}

/*
 * A synchronous invocation can fail twice over: the function itself can error, or it can
 * answer with a non 200 `statusCode` in its response envelope
 */
fn check_invocation(
    function: &str,
    function_error: Option<&str>,
    payload: Option<&[u8]>,
) -> Result<(), anyhow::Error> {
    let body = String::from_utf8_lossy(payload.unwrap_or_default());
    if let Some(kind) = function_error {
        return Err(anyhow::anyhow!("{function} failed ({kind}): {body}"));
    }

    let envelope: Value = serde_json::from_str(&body)?;
    match envelope.get("statusCode").and_then(Value::as_u64) {
        Some(200) => {
            info!("{function} answered: {}", envelope["body"]);
            Ok(())
        }
        status => Err(anyhow::anyhow!(
            "{function} answered with status {status:?}: {}",
            envelope["body"]
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intraday_payload() {
        let payload: Value =
            serde_json::from_str(&intraday_payload("MSFT")).expect("Failed to parse payload");
        assert_eq!(payload, json!({"ticker": "MSFT", "backfill": true}));
    }

    #[test]
    fn test_check_invocation() {
        let ok: &[u8] = br#"{"statusCode": 200, "headers": {"Content-Type": "text/plain"}, "body": "Request Completed"}"#;
        assert!(check_invocation("intraday_data_handler", None, Some(ok)).is_ok());

        let rejected: &[u8] = br#"{"statusCode": 400, "headers": {}, "body": "Request Failed! No ticker included in request"}"#;
        assert!(check_invocation("intraday_data_handler", None, Some(rejected)).is_err());

        let crashed: &[u8] = br#"{"errorMessage": "boom", "errorType": "Runtime.ExitError"}"#;
        let result = check_invocation("intraday_data_handler", Some("Unhandled"), Some(crashed));
        assert!(result.is_err());

        assert!(check_invocation("intraday_data_handler", None, None).is_err());
    }
}
