use std::io;
use std::path::Path;

use crate::types::FileStat;

/// Source of file metadata for the modified-time date fallback.
#[async_trait::async_trait]
pub trait StatProvider: Send + Sync {
    async fn stat(&self, path: &Path) -> io::Result<FileStat>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioStat;

#[async_trait::async_trait]
impl StatProvider for TokioStat {
    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(FileStat::from_metadata(&metadata))
    }
}
