//!
//! Environment driven configuration shared by the Lambdas
//!
use url::Url;

use crate::alphavantage::{AlphaVantage, DEFAULT_BASE_URL};
use crate::error::{LakeError, LakeResult};
use crate::{forex, historical, intraday};

/// Bucket every derived dataset is written to
pub const BUCKET_NAME_ENV: &str = "BUCKET_NAME";
/// Alpha Vantage API key
pub const API_KEY_ENV: &str = "API_KEY";
/// Optional override of the Alpha Vantage endpoint, mostly useful for tests and proxies
pub const ALPHA_VANTAGE_URL_ENV: &str = "ALPHA_VANTAGE_URL";
pub const DEST_PREFIX_ENV: &str = "DEST_PREFIX";
pub const INTRADAY_PREFIX_ENV: &str = "INTRADAY_PREFIX";
pub const FOREX_PREFIX_ENV: &str = "FOREX_PREFIX";

/// Where the lake lives and how its datasets are laid out
#[derive(Clone, Debug, PartialEq)]
pub struct LakeConfig {
    pub bucket: String,
    pub historical_prefix: String,
    pub intraday_prefix: String,
    pub forex_prefix: String,
}

impl LakeConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            historical_prefix: historical::DEFAULT_DEST_PREFIX.into(),
            intraday_prefix: intraday::DEFAULT_PREFIX.into(),
            forex_prefix: forex::DEFAULT_PREFIX.into(),
        }
    }

    pub fn from_env() -> LakeResult<Self> {
        Ok(Self::new(required(BUCKET_NAME_ENV)?).with_env_prefixes())
    }

    /// Replace the default dataset prefixes with `DEST_PREFIX`, `INTRADAY_PREFIX` and
    /// `FOREX_PREFIX` where they are set
    pub fn with_env_prefixes(mut self) -> Self {
        if let Ok(prefix) = std::env::var(DEST_PREFIX_ENV) {
            self.historical_prefix = prefix;
        }
        if let Ok(prefix) = std::env::var(INTRADAY_PREFIX_ENV) {
            self.intraday_prefix = prefix;
        }
        if let Ok(prefix) = std::env::var(FOREX_PREFIX_ENV) {
            self.forex_prefix = prefix;
        }
        self
    }
}

/// Build the Alpha Vantage client from `API_KEY` and `ALPHA_VANTAGE_URL`
pub fn market_data_from_env() -> LakeResult<AlphaVantage> {
    let api_key = required(API_KEY_ENV)?;
    let base_url = std::env::var(ALPHA_VANTAGE_URL_ENV).unwrap_or(DEFAULT_BASE_URL.into());
    AlphaVantage::new(api_key, Url::parse(&base_url)?)
}

fn required(name: &'static str) -> LakeResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(LakeError::MissingEnv(name)),
    }
}
