//!
//! The response envelope every finlake Lambda answers with
//!
use finlake::LakeError;
use serde::Serialize;
use tracing::log::*;

use std::collections::HashMap;

/// `{"statusCode": 200, "headers": {"Content-Type": "text/plain"}, "body": "..."}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Response {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        let headers = HashMap::from([("Content-Type".to_string(), "text/plain".to_string())]);
        Self {
            status_code,
            headers,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn client_error(body: impl Into<String>) -> Self {
        Self::new(400, body)
    }

    pub fn server_error(body: impl Into<String>) -> Self {
        Self::new(500, body)
    }

    /// Report `err` as a 400 when the caller caused it, otherwise as a 500 carrying
    /// `server_body`. The underlying error is only logged, never returned to the caller
    pub fn from_error(err: &LakeError, client_body: &str, server_body: &str) -> Self {
        if err.is_client_error() {
            warn!("Rejecting request: {err}");
            Self::client_error(client_body)
        } else {
            error!("Request failed: {err}");
            Self::server_error(server_body)
        }
    }
}
