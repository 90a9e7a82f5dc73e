//! File-backed upload record store
//!
//! The CLI's stand-in for the application's metadata backend: a JSON array
//! on disk next to the config file.

use std::path::PathBuf;

use async_trait::async_trait;

use service::persist::{MetadataStore, PersistError, UploadRecord};

pub struct FileMetadataStore {
    path: PathBuf,
}

impl FileMetadataStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn records(&self) -> Result<Vec<UploadRecord>, PersistError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(anyhow::Error::new(e).into()),
        };
        serde_json::from_str(&raw).map_err(|e| anyhow::Error::new(e).into())
    }
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    async fn save_upload(&self, record: &UploadRecord) -> Result<(), PersistError> {
        let mut records = self.records().await?;
        records.push(record.clone());
        let raw = serde_json::to_string_pretty(&records).map_err(anyhow::Error::new)?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| anyhow::Error::new(e).into())
    }
}
