//! Per-job log files

use async_trait::async_trait;
use chrono::Utc;
use jobq_queue::{Execution, LogSink};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;

/// Writes one `<dir>/<job_id>.log` file per job. Each attempt appends a
/// block with its outcome and both output streams.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    dir: PathBuf,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ids that are already file-name safe map to `<id>.log`. Anything
    /// rewritten gets a digest of the raw id appended, so `a/b` and `a_b`
    /// never share a file.
    pub fn path_for(&self, job_id: &str) -> PathBuf {
        let safe: String = job_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = safe.trim_start_matches('.');

        if safe == job_id {
            self.dir.join(format!("{}.log", safe))
        } else {
            let digest = Sha256::digest(job_id.as_bytes());
            self.dir
                .join(format!("{}-{}.log", safe, hex::encode(&digest[..4])))
        }
    }

    /// Full log contents, or `None` if the job never produced a log.
    pub async fn read(&self, job_id: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(job_id)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn render(job_id: &str, execution: &Execution) -> String {
    let status = match execution.outcome.error_message() {
        None => "success".to_string(),
        Some(msg) => format!("failed: {}", msg),
    };
    format!(
        "=== job {} at {} ({} ms) ===\nstatus: {}\n--- STDOUT ---\n{}\n--- STDERR ---\n{}\n",
        job_id,
        Utc::now().to_rfc3339(),
        execution.elapsed.as_millis(),
        status,
        execution.stdout.trim_end(),
        execution.stderr.trim_end(),
    )
}

#[async_trait]
impl LogSink for FileLogSink {
    async fn write(&self, job_id: &str, execution: &Execution) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(job_id))
            .await?;
        file.write_all(render(job_id, execution).as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_stays_inside_dir() {
        let sink = FileLogSink::new("/tmp/logs");
        assert_eq!(sink.path_for("abc-1"), PathBuf::from("/tmp/logs/abc-1.log"));

        let escaped = sink.path_for("../../etc/passwd");
        assert_eq!(escaped.parent(), Some(Path::new("/tmp/logs")));
        let name = escaped.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with("_.._etc_passwd-"));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn test_sanitised_ids_do_not_collide() {
        let sink = FileLogSink::new("/tmp/logs");
        assert_ne!(sink.path_for("a/b"), sink.path_for("a_b"));
        assert_ne!(sink.path_for("a/b"), sink.path_for("a b"));
        assert_eq!(sink.path_for("a/b"), sink.path_for("a/b"));
        assert_eq!(sink.path_for("a_b"), PathBuf::from("/tmp/logs/a_b.log"));
    }
}
