//! Filesystem modification time

use super::traits::TimestampSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Reads the file's modification time from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTimestampSource;

#[async_trait]
impl TimestampSource for FsTimestampSource {
    async fn last_modified(&self, path: &Path) -> crate::Result<DateTime<Utc>> {
        let unavailable = |reason: String| crate::Error::TimestampUnavailable {
            path: path.to_path_buf(),
            reason,
        };
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let modified = metadata
            .modified()
            .map_err(|e| unavailable(e.to_string()))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}
