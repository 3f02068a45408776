//! Parquet schema reader
//!
//! Column names come from the footer alone: the last 8 bytes give the length
//! of the metadata block, which is then fetched and decoded. Row groups are
//! never read, so a remote schema lookup costs two small range requests.

use crate::traits::RemoteStore;
use async_trait::async_trait;
use bytes::Bytes;
use fileflows_core::{FileOpsError, FileOpsResult, RemoteLocation};
use parquet::arrow::parquet_to_arrow_schema;
use parquet::file::metadata::ParquetMetaDataReader;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const PARQUET_MAGIC: &[u8; 4] = b"PAR1";
/// Metadata length (4 bytes, little endian) followed by the magic.
const FOOTER_LEN: u64 = 8;

/// Random-access byte source handed to the schema reader.
#[async_trait]
pub trait RangeSource: Send + Sync {
    async fn size(&self) -> FileOpsResult<u64>;

    async fn read_range(&self, range: Range<u64>) -> FileOpsResult<Bytes>;

    fn describe(&self) -> String;
}

/// A file on the local filesystem.
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalFileSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RangeSource for LocalFileSource {
    async fn size(&self) -> FileOpsResult<u64> {
        Ok(fs::metadata(&self.path)
            .await
            .map_err(|e| FileOpsError::from_io(e, self.path.display()))?
            .len())
    }

    async fn read_range(&self, range: Range<u64>) -> FileOpsResult<Bytes> {
        let mut file = fs::File::open(&self.path)
            .await
            .map_err(|e| FileOpsError::from_io(e, self.path.display()))?;
        file.seek(SeekFrom::Start(range.start))
            .await
            .map_err(|e| FileOpsError::from_io(e, self.path.display()))?;

        let mut buf = vec![0u8; range.end.saturating_sub(range.start) as usize];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| FileOpsError::from_io(e, self.path.display()))?;
        Ok(Bytes::from(buf))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An object in a remote store, read through ranged requests.
pub struct RemoteObjectSource<'a> {
    store: &'a dyn RemoteStore,
    location: &'a RemoteLocation,
}

impl<'a> RemoteObjectSource<'a> {
    pub fn new(store: &'a dyn RemoteStore, location: &'a RemoteLocation) -> Self {
        RemoteObjectSource { store, location }
    }
}

#[async_trait]
impl RangeSource for RemoteObjectSource<'_> {
    async fn size(&self) -> FileOpsResult<u64> {
        Ok(self
            .store
            .object_size(self.location.bucket(), self.location.key())
            .await?)
    }

    async fn read_range(&self, range: Range<u64>) -> FileOpsResult<Bytes> {
        Ok(self
            .store
            .get_range(self.location.bucket(), self.location.key(), range)
            .await?)
    }

    fn describe(&self) -> String {
        self.location.to_string()
    }
}

/// Length of the metadata block announced by a Parquet footer.
fn metadata_len(footer: &[u8], source: &str) -> FileOpsResult<u64> {
    if footer.len() != FOOTER_LEN as usize || &footer[4..] != PARQUET_MAGIC {
        return Err(FileOpsError::Backend(format!(
            "{} is not a parquet file: missing PAR1 footer",
            source
        )));
    }
    let mut len = [0u8; 4];
    len.copy_from_slice(&footer[..4]);
    Ok(u32::from_le_bytes(len) as u64)
}

/// Top-level column names of a Parquet file, in schema order.
pub async fn read_column_names(source: &dyn RangeSource) -> FileOpsResult<Vec<String>> {
    let name = source.describe();
    let size = source.size().await?;
    // header magic + footer
    if size < PARQUET_MAGIC.len() as u64 + FOOTER_LEN {
        return Err(FileOpsError::Backend(format!(
            "{} is not a parquet file: only {} bytes",
            name, size
        )));
    }

    let footer = source.read_range(size - FOOTER_LEN..size).await?;
    let metadata_len = metadata_len(&footer, &name)?;
    if metadata_len + FOOTER_LEN + PARQUET_MAGIC.len() as u64 > size {
        return Err(FileOpsError::Backend(format!(
            "{} has a corrupt footer: metadata length {} exceeds file size {}",
            name, metadata_len, size
        )));
    }

    let metadata_end = size - FOOTER_LEN;
    let metadata = source
        .read_range(metadata_end - metadata_len..metadata_end)
        .await?;

    let parquet_metadata = ParquetMetaDataReader::decode_metadata(&metadata)
        .map_err(|e| FileOpsError::Backend(format!("{}: {}", name, e)))?;
    let file_metadata = parquet_metadata.file_metadata();
    let schema = parquet_to_arrow_schema(
        file_metadata.schema_descr(),
        file_metadata.key_value_metadata(),
    )
    .map_err(|e| FileOpsError::Backend(format!("{}: {}", name, e)))?;

    tracing::debug!(
        source = %name,
        size_bytes = size,
        metadata_bytes = metadata_len,
        columns = schema.fields().len(),
        "Parquet schema read"
    );

    Ok(schema.fields().iter().map(|f| f.name().clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn parquet_bytes(rows: usize) -> Vec<u8> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from_iter_values(0..rows as i64)),
                Arc::new(StringArray::from_iter_values(
                    (0..rows).map(|i| format!("row-{i}")),
                )),
                Arc::new(Float64Array::from_iter_values((0..rows).map(|i| i as f64))),
            ],
        )
        .unwrap();

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        buf
    }

    #[tokio::test]
    async fn test_local_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.parquet");
        tokio::fs::write(&path, parquet_bytes(10)).await.unwrap();

        let names = read_column_names(&LocalFileSource::new(&path)).await.unwrap();
        assert_eq!(names, vec!["id", "name", "score"]);
    }

    #[tokio::test]
    async fn test_remote_schema_reads_only_the_footer() {
        let data = parquet_bytes(5_000);
        let total = data.len() as u64;
        let store = MemoryStore::new();
        store.put_object("bucket", "t.parquet", data).unwrap();

        let location = RemoteLocation::new("bucket", "t.parquet").unwrap();
        let names = read_column_names(&RemoteObjectSource::new(&store, &location))
            .await
            .unwrap();
        assert_eq!(names, vec!["id", "name", "score"]);

        let stats = store.stats();
        assert_eq!(stats.full_reads, 0);
        assert_eq!(stats.range_reads, 2);
        assert!(stats.bytes_served < total / 2);
    }

    #[tokio::test]
    async fn test_rejects_non_parquet_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.csv");
        tokio::fs::write(&path, b"a,b,c\n1,2,3\n").await.unwrap();

        let result = read_column_names(&LocalFileSource::new(&path)).await;
        assert!(matches!(result, Err(FileOpsError::Backend(_))));
    }

    #[test]
    fn test_metadata_len_parses_footer() {
        let mut footer = 300u32.to_le_bytes().to_vec();
        footer.extend_from_slice(PARQUET_MAGIC);
        assert_eq!(metadata_len(&footer, "x").unwrap(), 300);
        assert!(metadata_len(b"12345678", "x").is_err());
    }
}
