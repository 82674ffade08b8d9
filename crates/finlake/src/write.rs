use arrow::array::RecordBatch;
use bytes::Bytes;
use object_store::path::Path;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::async_writer::{AsyncArrowWriter, ParquetObjectWriter};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use tracing::log::*;

use crate::error::LakeResult;
use crate::location::ObjectLocation;
use crate::storage::{put_object, read_object, StoreProvider};

/// Every Parquet file in the lake is snappy compressed so the Glue crawlers and Athena agree on
/// how to read it
pub fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

///
/// Write the [RecordBatch] as a single Parquet file at `location`, replacing any existing object
///
pub async fn write_parquet(
    provider: &dyn StoreProvider,
    location: &ObjectLocation,
    batch: &RecordBatch,
) -> LakeResult<()> {
    let store = provider.store_for(&location.bucket)?;
    let sink = ParquetObjectWriter::new(store, Path::parse(&location.key)?);

    let mut writer = AsyncArrowWriter::try_new(sink, batch.schema(), Some(writer_properties()))?;
    writer.write(batch).await?;
    let metadata = writer.close().await?;
    info!(
        "Wrote {} rows to {location} in {} row groups",
        metadata.num_rows,
        metadata.row_groups.len()
    );
    Ok(())
}

/// Serialize `value` as a single JSON document at `location`
pub async fn write_json<T: Serialize>(
    provider: &dyn StoreProvider,
    location: &ObjectLocation,
    value: &T,
) -> LakeResult<()> {
    let body = serde_json::to_string(value)?;
    debug!("Writing {} bytes of JSON to {location}", body.len());
    put_object(provider, location, body).await
}

/// Load every [RecordBatch] from the Parquet file at `location`
pub async fn read_parquet(
    provider: &dyn StoreProvider,
    location: &ObjectLocation,
) -> LakeResult<Vec<RecordBatch>> {
    let bytes: Bytes = read_object(provider, location).await?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)?.build()?;
    let mut batches = vec![];
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStores;
    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use std::sync::Arc;

    fn sample_batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("ticker", DataType::Utf8, false),
            Field::new("close", DataType::Float64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["IBM", "IBM"])),
                Arc::new(Float64Array::from(vec![Some(161.2), None])),
            ],
        )
        .expect("Failed to build batch")
    }

    #[tokio::test]
    async fn test_write_and_read_parquet() -> LakeResult<()> {
        let stores = MemoryStores::default();
        let location = ObjectLocation::new("lake", "datalake/date=2024-01-02/IBM.parquet");

        write_parquet(&stores, &location, &sample_batch()).await?;

        let batches = read_parquet(&stores, &location).await?;
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);
        assert_eq!(batches[0].schema().fields(), sample_batch().schema().fields());
        Ok(())
    }

    #[tokio::test]
    async fn test_parquet_is_snappy() -> LakeResult<()> {
        let stores = MemoryStores::default();
        let location = ObjectLocation::new("lake", "IBM.parquet");
        write_parquet(&stores, &location, &sample_batch()).await?;

        let bytes = read_object(&stores, &location).await?;
        let reader = SerializedFileReader::new(bytes)?;
        let row_group = reader.metadata().row_group(0);
        for column in row_group.columns() {
            assert_eq!(column.compression(), Compression::SNAPPY);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_write_json() -> LakeResult<()> {
        let stores = MemoryStores::default();
        let location = ObjectLocation::new("lake", "quote.json");
        write_json(&stores, &location, &serde_json::json!({"bid_price": 1.5})).await?;

        let bytes = read_object(&stores, &location).await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(value["bid_price"], 1.5);
        Ok(())
    }
}
