//! Filesystem-backed storage sink

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;

use super::{SaveRequest, SinkError, StorageSink, StoredFile};
use crate::utils::filename::filename_parts;

/// Writes under a root directory and keeps a download history.
///
/// Saves never overwrite: an occupied path becomes `name (1).ext`,
/// `name (2).ext`, ...
#[derive(Debug)]
pub struct FsSink {
    root: PathBuf,
    next_id: AtomicU64,
    history: Mutex<BTreeMap<u64, PathBuf>>,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_id: AtomicU64::new(1),
            history: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths of saves whose records have not been erased, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<PathBuf> {
        self.history.lock().values().cloned().collect()
    }

    fn resolve_target(&self, target: &str) -> Result<PathBuf, SinkError> {
        let relative = Path::new(target);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || target.is_empty() {
            return Err(SinkError::InvalidPath(target.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn write_new(&self, path: PathBuf, bytes: &[u8]) -> Result<PathBuf, SinkError> {
        let parent = path
            .parent()
            .ok_or_else(|| SinkError::InvalidPath(path.display().to_string()))?
            .to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|source| SinkError::Io {
                path: parent.clone(),
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SinkError::InvalidPath(path.display().to_string()))?;
        let (stem, ext) = filename_parts(&file_name);

        let mut attempt = 0usize;
        loop {
            let candidate = if attempt == 0 {
                path.clone()
            } else if ext.is_empty() {
                parent.join(format!("{stem} ({attempt})"))
            } else {
                parent.join(format!("{stem} ({attempt}).{ext}"))
            };

            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await;
            match opened {
                Ok(mut file) => {
                    file.write_all(bytes)
                        .await
                        .map_err(|source| SinkError::Io {
                            path: candidate.clone(),
                            source,
                        })?;
                    file.flush().await.map_err(|source| SinkError::Io {
                        path: candidate.clone(),
                        source,
                    })?;
                    return Ok(candidate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => {
                    return Err(SinkError::Io {
                        path: candidate,
                        source,
                    });
                }
            }
        }
    }
}

impl StorageSink for FsSink {
    fn save(&self, request: SaveRequest) -> BoxFuture<'_, Result<StoredFile, SinkError>> {
        async move {
            let target = self.resolve_target(&request.target_path)?;
            let path = self.write_new(target, &request.bytes).await?;
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.history.lock().insert(id, path.clone());
            log::debug!(
                "Stored {} bytes ({}) at {}",
                request.bytes.len(),
                request.mime,
                path.display()
            );
            Ok(StoredFile { id, path })
        }
        .boxed()
    }

    fn erase_record(&self, file: &StoredFile) {
        self.history.lock().remove(&file.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(target: &str, body: &str) -> SaveRequest {
        SaveRequest {
            bytes: body.as_bytes().to_vec(),
            mime: "text/plain".to_string(),
            target_path: target.to_string(),
        }
    }

    #[tokio::test]
    async fn test_conflicting_saves_are_uniquified() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FsSink::new(dir.path());

        let first = sink.save(request("data/1/a.txt", "one")).await.expect("save");
        let second = sink.save(request("data/1/a.txt", "two")).await.expect("save");

        assert_eq!(first.path, dir.path().join("data/1/a.txt"));
        assert_eq!(second.path, dir.path().join("data/1/a (1).txt"));
        assert_eq!(std::fs::read_to_string(&first.path).expect("read"), "one");
        assert_eq!(std::fs::read_to_string(&second.path).expect("read"), "two");
    }

    #[tokio::test]
    async fn test_escaping_targets_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FsSink::new(dir.path());
        let err = sink.save(request("../evil.txt", "x")).await.unwrap_err();
        assert!(matches!(err, SinkError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_erase_record_keeps_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FsSink::new(dir.path());
        let stored = sink.save(request("d/x.css", "body{}")).await.expect("save");
        assert_eq!(sink.history().len(), 1);
        sink.erase_record(&stored);
        assert!(sink.history().is_empty());
        assert!(stored.path.exists());
    }
}
