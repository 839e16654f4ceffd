//! Version-control commit time using an external git binary

use super::traits::TimestampSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Uses the committer date of the most recent commit that touched a file
///
/// Runs `git log -1 --format=%cI -- <file>` from the file's directory, so the
/// file may live in any repository (or submodule) below the project root.
///
/// # Examples
///
/// ```no_run
/// use l10n_sync::timestamp::{GitTimestampSource, TimestampSource};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = GitTimestampSource::from_path()
///     .expect("git not found in PATH");
/// let committed = source.last_modified(Path::new("locales/fr/app.po")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GitTimestampSource {
    binary_path: PathBuf,
}

impl GitTimestampSource {
    /// Create a source with an explicit git binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find git in PATH
    pub fn from_path() -> Option<Self> {
        which::which("git").ok().map(Self::new)
    }
}

#[async_trait]
impl TimestampSource for GitTimestampSource {
    async fn last_modified(&self, path: &Path) -> crate::Result<DateTime<Utc>> {
        let unavailable = |reason: String| crate::Error::TimestampUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| unavailable("path has no file name".to_string()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let output = Command::new(&self.binary_path)
            .arg("log")
            .arg("-1")
            .arg("--format=%cI")
            .arg("--")
            .arg(file_name)
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| unavailable(format!("failed to execute git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unavailable(format!("git log failed: {}", stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.trim();
        if line.is_empty() {
            return Err(unavailable("no commit history for path".to_string()));
        }

        DateTime::parse_from_rfc3339(line)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| unavailable(format!("unparseable commit date '{line}': {e}")))
    }

    fn name(&self) -> &'static str {
        "git"
    }
}
