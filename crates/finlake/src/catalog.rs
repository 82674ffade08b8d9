//!
//! Declarations of the managed resources which sit around the lake: the Glue database and
//! tables, the crawlers which keep the partitioned feeds registered, the extract job, the
//! bucket notification feeding the converter and the schedules which drive the Lambdas.
//!
//! Nothing here talks to AWS, the declarations are consumed by the `finlake` CLI when
//! provisioning and backfilling.
//!
use arrow::datatypes::{DataType, Schema};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::LakeConfig;
use crate::historical;
use crate::location::join_key;

pub const PARQUET_INPUT_FORMAT: &str =
    "org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat";
pub const PARQUET_OUTPUT_FORMAT: &str =
    "org.apache.hadoop.hive.ql.io.parquet.MapredParquetOutputFormat";
pub const PARQUET_SERDE: &str = "org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe";

/// Prefix under which every derived dataset lives
pub const LAKE_PREFIX: &str = "datalake";
/// Prefix the extract job writes the relational history to
pub const HISTORICAL_STOCK_PREFIX: &str = "datalake/stock_data_historical";
/// Prefix the raw gzipped forex history is uploaded under
pub const HISTORICAL_SOURCE_PREFIX: &str = "data/forex_historical";

/// Name of the Glue job which copies `financedb.stock_data_historical` out of Postgres
pub const EXTRACT_JOB_NAME: &str = "rds_extract_job";
pub const EXTRACT_JOB_WORKER_TYPE: &str = "G.1X";
pub const EXTRACT_JOB_WORKERS: i32 = 10;

/// Crawlers run nightly after the last hourly quote of the day has landed
pub const CRAWLER_SCHEDULE: &str = "cron(0 2 * * ? *)";
/// Tickers refreshed every night and backfilled on demand
pub const TICKERS: [&str; 3] = ["MSFT", "AMZN", "IBM"];
pub const INTRADAY_SCHEDULE: &str = "cron(0 0 * * ? *)";
/// Currency pairs quoted hourly
pub const CURRENCY_PAIRS: [(&str, &str); 4] =
    [("BTC", "CNY"), ("USD", "JPY"), ("USD", "CNY"), ("BTC", "USD")];
pub const FOREX_SCHEDULE: &str = "cron(5 1,9-23 * * ? *)";

/// A column in a Glue table, typed with Hive type names
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub glue_type: String,
}

impl ColumnDef {
    pub fn new(name: &str, glue_type: &str) -> Self {
        Self {
            name: name.into(),
            glue_type: glue_type.into(),
        }
    }
}

/// An explicitly declared Parquet table
#[derive(Clone, Debug, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub description: String,
    pub location: String,
    pub columns: Vec<ColumnDef>,
}

/// A crawler which registers whatever it finds under `target`
#[derive(Clone, Debug, PartialEq)]
pub struct CrawlerDef {
    pub name: String,
    pub target: String,
    pub schedule: String,
    pub delete_behavior: String,
}

/// A scheduled rule which invokes one of the Lambdas with a fixed input
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScheduleDef {
    pub name: String,
    pub schedule: String,
    pub function: String,
    pub input: Value,
}

/// A bucket notification which invokes a Lambda for every object created under `prefix`
/// whose key ends with `suffix`
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NotificationDef {
    pub bucket: String,
    pub prefix: String,
    pub suffix: String,
    pub events: Vec<String>,
    pub function: String,
}

/// Function names the Lambdas are deployed under
pub const HISTORICAL_FUNCTION: &str = "historical_data_handler";
pub const INTRADAY_FUNCTION: &str = "intraday_data_handler";
pub const FOREX_FUNCTION: &str = "forex_hourly_handler";

/// Map an Arrow type onto the Hive type name Glue expects
pub fn glue_type(data_type: &DataType) -> Option<&'static str> {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 => Some("string"),
        DataType::Date32 | DataType::Date64 => Some("date"),
        DataType::Float64 => Some("double"),
        DataType::Float32 => Some("float"),
        DataType::Int64 => Some("bigint"),
        DataType::Int32 => Some("int"),
        DataType::Boolean => Some("boolean"),
        DataType::Timestamp(_, _) => Some("timestamp"),
        _ => None,
    }
}

/// Glue columns for every field of `schema` which has a Hive equivalent
pub fn columns_for(schema: &Schema) -> Vec<ColumnDef> {
    schema
        .fields()
        .iter()
        .filter_map(|f| glue_type(f.data_type()).map(|t| ColumnDef::new(f.name(), t)))
        .collect()
}

/// The resources of one deployment of the lake
#[derive(Clone, Debug, PartialEq)]
pub struct LakeResources {
    pub bucket: String,
    pub database: String,
    pub historical_prefix: String,
    pub intraday_prefix: String,
    pub forex_prefix: String,
}

impl LakeResources {
    pub fn new(bucket: impl Into<String>, database: impl Into<String>) -> Self {
        Self::from_config(&LakeConfig::new(bucket), database)
    }

    /// Resources laid out over the same bucket and prefixes the Lambdas write with
    pub fn from_config(config: &LakeConfig, database: impl Into<String>) -> Self {
        Self {
            bucket: config.bucket.clone(),
            database: database.into(),
            historical_prefix: config.historical_prefix.clone(),
            intraday_prefix: config.intraday_prefix.clone(),
            forex_prefix: config.forex_prefix.clone(),
        }
    }

    fn uri(&self, prefix: &str) -> String {
        format!("s3://{}/{}/", self.bucket, join_key([prefix]))
    }

    pub fn database_location(&self) -> String {
        self.uri(LAKE_PREFIX)
    }

    /// Tables whose data is not partitioned by date and is therefore declared up front
    pub fn tables(&self) -> Vec<TableDef> {
        let stock_columns = [
            ("ticker", "string"),
            ("date", "date"),
            ("open", "double"),
            ("high", "double"),
            ("low", "double"),
            ("close", "double"),
            ("adj_close", "double"),
            ("volume", "double"),
        ];
        vec![
            TableDef {
                name: "historical_stock_data".into(),
                description: "Historical Stock Data".into(),
                location: self.uri(HISTORICAL_STOCK_PREFIX),
                columns: stock_columns
                    .iter()
                    .map(|(name, ty)| ColumnDef::new(name, ty))
                    .collect(),
            },
            TableDef {
                name: "forex_daily_historical".into(),
                description: "Historical Forex Data".into(),
                location: self.uri(&self.historical_prefix),
                columns: columns_for(&historical::schema()),
            },
        ]
    }

    /// Crawlers for the feeds which land under `date=` partitions
    pub fn crawlers(&self) -> Vec<CrawlerDef> {
        [
            ("intraday_stock_data_crawler", &self.intraday_prefix),
            ("forex_hourly_crawler", &self.forex_prefix),
        ]
        .into_iter()
        .map(|(name, prefix)| CrawlerDef {
            name: name.into(),
            target: self.uri(prefix),
            schedule: CRAWLER_SCHEDULE.into(),
            delete_behavior: "LOG".into(),
        })
        .collect()
    }

    /// The converter runs whenever a gzipped history file is uploaded
    pub fn notifications(&self) -> Vec<NotificationDef> {
        vec![NotificationDef {
            bucket: self.bucket.clone(),
            prefix: HISTORICAL_SOURCE_PREFIX.into(),
            suffix: historical::SOURCE_SUFFIX.into(),
            events: vec!["s3:ObjectCreated:*".into()],
            function: HISTORICAL_FUNCTION.into(),
        }]
    }

    pub fn crawler_names(&self) -> Vec<String> {
        self.crawlers().into_iter().map(|c| c.name).collect()
    }

    /// One rule per ticker for the nightly intraday refresh and one per currency pair for the
    /// hourly quotes
    pub fn schedules(&self) -> Vec<ScheduleDef> {
        let intraday = TICKERS.iter().map(|ticker| ScheduleDef {
            name: format!("intraday_{}", ticker.to_lowercase()),
            schedule: INTRADAY_SCHEDULE.into(),
            function: INTRADAY_FUNCTION.into(),
            input: json!({ "ticker": ticker }),
        });
        let forex = CURRENCY_PAIRS.iter().map(|(from, to)| ScheduleDef {
            name: format!("forex_{}_{}", from.to_lowercase(), to.to_lowercase()),
            schedule: FOREX_SCHEDULE.into(),
            function: FOREX_FUNCTION.into(),
            input: json!({ "from_currency": from, "to_currency": to }),
        });
        intraday.chain(forex).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locations_follow_bucket() {
        let resources = LakeResources::new("big-data-pipeline", "financedb");
        assert_eq!(
            resources.database_location(),
            "s3://big-data-pipeline/datalake/"
        );

        let tables = resources.tables();
        assert_eq!(tables.len(), 2);
        assert_eq!(
            tables[0].location,
            "s3://big-data-pipeline/datalake/stock_data_historical/"
        );
        assert_eq!(
            tables[1].location,
            "s3://big-data-pipeline/datalake/forex_historical/"
        );
    }

    #[test]
    fn test_forex_table_matches_converted_files() {
        let resources = LakeResources::new("bucket", "db");
        let forex = resources
            .tables()
            .into_iter()
            .find(|t| t.name == "forex_daily_historical")
            .expect("forex table should be declared");

        let expected: Vec<ColumnDef> = [
            ("from_currency", "string"),
            ("to_currency", "string"),
            ("date", "date"),
            ("open", "double"),
            ("high", "double"),
            ("low", "double"),
            ("close", "double"),
            ("adj_close", "double"),
            ("volume", "double"),
        ]
        .iter()
        .map(|(n, t)| ColumnDef::new(n, t))
        .collect();
        assert_eq!(forex.columns, expected);
    }

    #[test]
    fn test_crawlers() {
        let resources = LakeResources::new("bucket", "db");
        let crawlers = resources.crawlers();
        assert_eq!(
            resources.crawler_names(),
            vec!["intraday_stock_data_crawler", "forex_hourly_crawler"]
        );
        assert_eq!(
            crawlers[0].target,
            "s3://bucket/datalake/stock_data_intraday/"
        );
        assert_eq!(crawlers[1].target, "s3://bucket/datalake/forex_hourly/");
        assert!(crawlers.iter().all(|c| c.delete_behavior == "LOG"));
    }

    #[test]
    fn test_prefix_overrides_reach_catalog() {
        let config = LakeConfig {
            historical_prefix: "staging/forex_daily".into(),
            intraday_prefix: "staging/intraday/".into(),
            ..LakeConfig::new("bucket")
        };
        let resources = LakeResources::from_config(&config, "db");

        let crawlers = resources.crawlers();
        assert_eq!(crawlers[0].target, "s3://bucket/staging/intraday/");
        assert_eq!(crawlers[1].target, "s3://bucket/datalake/forex_hourly/");
        assert_eq!(
            resources.tables()[1].location,
            "s3://bucket/staging/forex_daily/"
        );
        // the extract job's table is not configurable
        assert_eq!(
            resources.tables()[0].location,
            "s3://bucket/datalake/stock_data_historical/"
        );
    }

    #[test]
    fn test_notifications() {
        let notifications = LakeResources::new("big-data-pipeline", "db").notifications();
        assert_eq!(notifications.len(), 1);

        let convert = &notifications[0];
        assert_eq!(convert.bucket, "big-data-pipeline");
        assert_eq!(convert.prefix, "data/forex_historical");
        assert_eq!(convert.suffix, ".json.gz");
        assert_eq!(convert.function, HISTORICAL_FUNCTION);
        assert_eq!(
            serde_json::to_value(convert).expect("serializable")["events"],
            json!(["s3:ObjectCreated:*"])
        );
    }

    #[test]
    fn test_schedules() {
        let schedules = LakeResources::new("bucket", "db").schedules();
        assert_eq!(schedules.len(), TICKERS.len() + CURRENCY_PAIRS.len());

        let msft = &schedules[0];
        assert_eq!(msft.name, "intraday_msft");
        assert_eq!(msft.schedule, "cron(0 0 * * ? *)");
        assert_eq!(msft.function, INTRADAY_FUNCTION);
        assert_eq!(msft.input, json!({"ticker": "MSFT"}));

        let btc_usd = schedules
            .iter()
            .find(|s| s.name == "forex_btc_usd")
            .expect("BTC/USD should be scheduled");
        assert_eq!(btc_usd.schedule, "cron(5 1,9-23 * * ? *)");
        assert_eq!(
            btc_usd.input,
            json!({"from_currency": "BTC", "to_currency": "USD"})
        );
    }

    #[test]
    fn test_glue_types() {
        assert_eq!(glue_type(&DataType::Utf8), Some("string"));
        assert_eq!(
            glue_type(&DataType::Timestamp(arrow::datatypes::TimeUnit::Second, None)),
            Some("timestamp")
        );
        assert_eq!(glue_type(&DataType::Null), None);
        assert_eq!(columns_for(&crate::intraday::schema()).len(), 7);
    }
}
