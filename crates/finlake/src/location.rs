//!
//! Helpers for addressing objects in the lake, both as `s3://` URIs and as hive-style
//! partitioned keys
//!

use chrono::NaiveDate;

use crate::error::{LakeError, LakeResult};

/// Format used for every `date=` partition and every date accepted in requests
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// An object in a bucket, e.g. `s3://big-data-pipeline/data/forex_historical/202210_forex.json.gz`
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse an `s3://bucket/key` URI. Both the bucket and the key must be present and the key
    /// is taken verbatim
    pub fn parse(uri: &str) -> LakeResult<Self> {
        let invalid = || LakeError::InvalidLocation(uri.into());
        let (bucket, key) = uri
            .strip_prefix("s3://")
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(invalid)?;
        let key = key.trim_start_matches('/');
        if bucket.is_empty() || key.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(bucket, key))
    }

    /// Render the location as an `s3://` URI
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    /// The last segment of the key
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri())
    }
}

/// Join key segments with exactly one `/` between them, ignoring empty segments
pub fn join_key<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments
        .into_iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the hive-style key `<prefix>/date=<YYYY-MM-DD>/<file>`
pub fn partition_key(prefix: &str, date: &NaiveDate, file: &str) -> String {
    let partition = format!("date={}", date.format(DATE_FORMAT));
    join_key([prefix, partition.as_str(), file])
}

/// Parse a `YYYY-MM-DD` date, anything else is a client error
pub fn parse_date(value: &str) -> LakeResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| LakeError::InvalidDate(value.into()))
}
