//!
//! Create the Glue resources declared in [finlake::catalog] which do not exist yet. Resources
//! which already exist are left untouched.
//!
use aws_config::SdkConfig;
use aws_sdk_glue::error::BuildError;
use aws_sdk_glue::types::{
    Column, CrawlerTargets, DatabaseInput, DeleteBehavior, S3Target, SchemaChangePolicy,
    SerDeInfo, StorageDescriptor, TableInput,
};
use finlake::catalog::{
    CrawlerDef, LakeResources, TableDef, PARQUET_INPUT_FORMAT, PARQUET_OUTPUT_FORMAT,
    PARQUET_SERDE,
};
use tracing::log::*;

pub async fn run(
    resources: &LakeResources,
    role: &str,
    config: &SdkConfig,
) -> Result<(), anyhow::Error> {
    let glue = aws_sdk_glue::Client::new(config);
    let database = &resources.database;

    match glue.get_database().name(database).send().await {
        Ok(_) => info!("Database {database} already exists"),
        Err(error) => {
            let get_db_error = error.into_service_error();
            if !get_db_error.is_entity_not_found_exception() {
                return Err(get_db_error.into());
            }
            info!("Database {database} doesn't exist. Creating...");
            glue.create_database()
                .database_input(database_input(resources)?)
                .send()
                .await?;
        }
    }

    for table in resources.tables() {
        match glue
            .get_table()
            .database_name(database)
            .name(&table.name)
            .send()
            .await
        {
            Ok(_) => info!("Table {database}.{} already exists", table.name),
            Err(error) => {
                let get_table_error = error.into_service_error();
                if !get_table_error.is_entity_not_found_exception() {
                    return Err(get_table_error.into());
                }
                info!("Table {database}.{} doesn't exist. Creating...", table.name);
                glue.create_table()
                    .database_name(database)
                    .table_input(table_input(&table)?)
                    .send()
                    .await?;
            }
        }
    }

    for crawler in resources.crawlers() {
        match glue.get_crawler().name(&crawler.name).send().await {
            Ok(_) => info!("Crawler {} already exists", crawler.name),
            Err(error) => {
                let get_crawler_error = error.into_service_error();
                if !get_crawler_error.is_entity_not_found_exception() {
                    return Err(get_crawler_error.into());
                }
                info!("Crawler {} doesn't exist. Creating...", crawler.name);
                glue.create_crawler()
                    .name(&crawler.name)
                    .role(role)
                    .database_name(database)
                    .targets(crawler_targets(&crawler))
                    .schedule(&crawler.schedule)
                    .schema_change_policy(schema_change_policy(&crawler))
                    .send()
                    .await?;
            }
        }
    }
    Ok(())
}

fn database_input(resources: &LakeResources) -> Result<DatabaseInput, BuildError> {
    DatabaseInput::builder()
        .name(&resources.database)
        .location_uri(resources.database_location())
        .build()
}

/// An external Parquet table over the declared location
fn table_input(table: &TableDef) -> Result<TableInput, BuildError> {
    let columns = table
        .columns
        .iter()
        .map(|c| Column::builder().name(&c.name).r#type(&c.glue_type).build())
        .collect::<Result<Vec<_>, _>>()?;

    let descriptor = StorageDescriptor::builder()
        .location(&table.location)
        .input_format(PARQUET_INPUT_FORMAT)
        .output_format(PARQUET_OUTPUT_FORMAT)
        .serde_info(
            SerDeInfo::builder()
                .serialization_library(PARQUET_SERDE)
                .build(),
        )
        .set_columns(Some(columns))
        .build();

    TableInput::builder()
        .name(&table.name)
        .description(&table.description)
        .table_type("EXTERNAL_TABLE")
        .parameters("classification", "parquet")
        .storage_descriptor(descriptor)
        .build()
}

fn crawler_targets(crawler: &CrawlerDef) -> CrawlerTargets {
    CrawlerTargets::builder()
        .s3_targets(S3Target::builder().path(&crawler.target).build())
        .build()
}

fn schema_change_policy(crawler: &CrawlerDef) -> SchemaChangePolicy {
    SchemaChangePolicy::builder()
        .delete_behavior(DeleteBehavior::from(crawler.delete_behavior.as_str()))
        .build()
}
