//! Local JSON file backend.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{decode_records, encode_records, DurableStore, RecordMap, StoreError};
use crate::provider::BoxFuture;

/// Stores the record map as one pretty-printed JSON file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write never leaves a truncated cache behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cache.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DurableStore for JsonFileStore {
    fn read_all(&self) -> BoxFuture<'_, Result<RecordMap, StoreError>> {
        Box::pin(async move {
            let bytes = match tokio::fs::read(&self.path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    info!(path = %self.path.display(), "No cache file found, starting fresh");
                    return Ok(RecordMap::new());
                }
                Err(e) => return Err(e.into()),
            };
            let records = decode_records(&bytes)?;
            debug!(path = %self.path.display(), records = records.len(), "Read cache file");
            Ok(records)
        })
    }

    fn write_all<'a>(&'a self, records: &'a RecordMap) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let bytes = encode_records(records)?;

            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }

            let temp = self.temp_path();
            tokio::fs::write(&temp, &bytes).await?;
            tokio::fs::rename(&temp, &self.path).await?;

            debug!(
                path = %self.path.display(),
                records = records.len(),
                bytes = bytes.len(),
                "Wrote cache file"
            );
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}
