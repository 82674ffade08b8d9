//!
//! finlake contains the transforms which land market data into the lake: the historical forex
//! conversion, the intraday stock and hourly forex fetchers, and the declarations of the managed
//! resources around them.
//!
//! Everything which touches object storage goes through a [storage::StoreProvider] so the same
//! code runs against S3 in Lambda and against memory in tests.

pub mod alphavantage;
pub mod catalog;
pub mod config;
pub mod error;
pub mod forex;
pub mod historical;
pub mod intraday;
pub mod location;
pub mod storage;
pub mod write;

pub use error::{LakeError, LakeResult};
pub use location::ObjectLocation;
