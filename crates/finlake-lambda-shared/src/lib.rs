/**
 * finlake-lambda-shared contains common helper functions and utilities for all finlake lambdas
 */
use aws_lambda_events::s3::S3EventRecord;
use finlake::ObjectLocation;
use tracing::log::*;

pub mod payload;
pub mod response;
pub mod trigger;

pub use response::Response;
pub use trigger::Modification;

/**
 * Return wholly new [`S3EventRecord`] objects with the [`S3Object`] `url_decoded_key`
 * properly filled in
 *
 * Keys in bucket notifications are form encoded, so `+` stands for a space and has to be
 * replaced before percent decoding.
 *
 * [`S3Object`]: aws_lambda_events::s3::S3Object
 */
pub fn records_with_url_decoded_keys(records: &[S3EventRecord]) -> Vec<S3EventRecord> {
    use urlencoding::decode;

    records
        .iter()
        .map(|record| {
            let mut replacement = record.clone();
            if let Some(key) = &replacement.s3.object.key {
                if let Ok(decoded_key) = decode(&key.replace('+', " ")) {
                    replacement.s3.object.url_decoded_key = Some(decoded_key.into_owned());
                }
            }
            replacement
        })
        .collect()
}

/// The kinds of objects the handlers know how to consume
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum RecordType {
    /// A gzip compressed JSON dump, `.json.gz`
    GzipJson,
    #[default]
    Unknown,
}

/// Identify the [RecordType] of an object from the suffix of its key
pub fn suffix_from_key(key: &str) -> RecordType {
    if key.ends_with(finlake::historical::SOURCE_SUFFIX) {
        return RecordType::GzipJson;
    }
    RecordType::Unknown
}

/**
 * Turn the records of a bucket notification into the [ObjectLocation]s which were created.
 *
 * Records for anything other than an object creation, or without a bucket or key, are
 * dropped with a log line rather than failing the whole notification
 */
pub fn created_locations(records: &[S3EventRecord]) -> Vec<ObjectLocation> {
    records_with_url_decoded_keys(records)
        .into_iter()
        .filter_map(|record| {
            let how = Modification::from(record.event_name.as_deref().unwrap_or_default());
            if how != Modification::Create {
                debug!("Ignoring {:?} record {:?}", how, record.event_name);
                return None;
            }
            let key = record
                .s3
                .object
                .url_decoded_key
                .or(record.s3.object.key)?;
            match record.s3.bucket.name {
                Some(bucket) => Some(ObjectLocation::new(bucket, key)),
                None => {
                    warn!("Record for {key} has no bucket name, skipping");
                    None
                }
            }
        })
        .collect()
}
