use super::{local_attributes, path_key, LocalFileSource, LocalFileSystem};
use crate::attributes::DataType;
use crate::command::{FileSystem, ReadCommand};
use crate::content::FileContent;
use crate::error::{FileError, FileResult};
use crate::lock::{NullPathLock, PathLock};
use crate::message::FileMessage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads one local file.
pub struct LocalReadCommand<'a> {
    fs: &'a LocalFileSystem,
}

impl<'a> LocalReadCommand<'a> {
    pub fn new(fs: &'a LocalFileSystem) -> Self {
        Self { fs }
    }
}

impl LocalReadCommand<'_> {
    /// Builds the message for a file already known to exist. `listed` is the
    /// path reported in the attributes; locks are keyed on the canonical
    /// `target` so reads through different links share one lock.
    pub(crate) async fn read_existing(
        &self,
        listed: &Path,
        target: PathBuf,
        meta: &std::fs::Metadata,
        lock: bool,
    ) -> FileResult<FileMessage> {
        let key = path_key(&target);
        let path_lock: Arc<dyn PathLock> = if lock {
            self.fs.lock(&key).await
        } else {
            self.fs.verify_not_locked(&key)?;
            Arc::new(NullPathLock::new(key.as_str()))
        };

        log::debug!("read '{}' (lock={})", key, lock);
        let attributes = local_attributes(listed, meta).with_lock(path_lock.clone());
        let content = FileContent::new(key, LocalFileSource::new(target), path_lock);
        let mut message = FileMessage::new(attributes, content, DataType::default());
        self.fs.update_content_metadata(&mut message);
        Ok(message)
    }
}

#[async_trait::async_trait]
impl ReadCommand for LocalReadCommand<'_> {
    async fn read(&mut self, file_path: &str, lock: bool) -> FileResult<FileMessage> {
        let path = self.fs.resolve_existing_path(file_path).await?;
        let key = path_key(&path);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FileError::io(&key, e))?;
        if meta.is_dir() {
            return Err(FileError::cannot_read_directory(&key));
        }
        self.read_existing(&path, path.clone(), &meta, lock).await
    }
}
