//! Error types shared by every finlake transform

use thiserror::Error;

pub type LakeResult<T> = std::result::Result<T, LakeError>;

#[derive(Debug, Error)]
pub enum LakeError {
    /// A date string in a request or a source document was not `YYYY-MM-DD`
    #[error("Invalid date `{0}`, dates must be in format 'YYYY-MM-DD'")]
    InvalidDate(String),

    /// A field required by the request was absent or empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A required environment variable is not set
    #[error("The `{0}` must be set in the environment")]
    MissingEnv(&'static str),

    /// The invocation payload did not have the shape the handler expects
    #[error("Malformed event: {0}")]
    InvalidEvent(String),

    /// The location could not be turned into a bucket and key
    #[error("Invalid object location `{0}`")]
    InvalidLocation(String),

    /// The source document did not have the expected shape
    #[error("Malformed source data: {0}")]
    MalformedData(String),

    /// The market data API answered with an error payload instead of data
    #[error("Market data API error: {0}")]
    Api(String),

    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),

    #[error(transparent)]
    ObjectStorePath(#[from] object_store::path::Error),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl LakeError {
    /// Errors caused by the caller's request rather than by the lake or its dependencies
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LakeError::InvalidDate(_)
                | LakeError::MissingField(_)
                | LakeError::InvalidEvent(_)
                | LakeError::InvalidLocation(_)
        )
    }
}
