use super::get_existing_file;
use crate::file_system::FtpFileSystem;
use crate::input_stream::FtpInputStream;
use crate::pool::FtpConnectionPool;
use ferry_file::{
    DataType, FileAttributes, FileContent, FileError, FileMessage, FileResult, FileSystem,
    NullPathLock, PathLock, ReadCommand,
};
use std::sync::Arc;

/// Reads one remote file. Content is streamed over a separate session
/// checked out from `pool`, so the command's own session is free again as
/// soon as `read` returns.
pub struct FtpReadCommand<'a> {
    fs: &'a mut FtpFileSystem,
    pool: &'a FtpConnectionPool,
}

impl<'a> FtpReadCommand<'a> {
    pub fn new(fs: &'a mut FtpFileSystem, pool: &'a FtpConnectionPool) -> Self {
        Self { fs, pool }
    }
}

#[async_trait::async_trait]
impl ReadCommand for FtpReadCommand<'_> {
    async fn read(&mut self, file_path: &str, lock: bool) -> FileResult<FileMessage> {
        let attributes = get_existing_file(self.fs, file_path)
            .await?
            .ok_or_else(|| FileError::invalid_path(file_path))?;
        if attributes.is_directory() {
            return Err(FileError::cannot_read_directory(&attributes.path));
        }
        read_attributes(self.fs, self.pool, attributes, lock, true).await
    }
}

/// Message for an already looked-up file. Without `wait_for_connection`
/// the stream's session must be available right away.
pub(crate) async fn read_attributes(
    fs: &FtpFileSystem,
    pool: &FtpConnectionPool,
    attributes: FileAttributes,
    lock: bool,
    wait_for_connection: bool,
) -> FileResult<FileMessage> {
    let key = attributes.path.clone();
    let path_lock: Arc<dyn PathLock> = if lock {
        fs.lock(&key).await
    } else {
        fs.verify_not_locked(&key)?;
        Arc::new(NullPathLock::new(key.as_str()))
    };

    let checkout = if wait_for_connection {
        FtpInputStream::new(pool, key.as_str()).await
    } else {
        FtpInputStream::try_new(pool, key.as_str()).await
    };
    let stream = match checkout {
        Ok(stream) => stream,
        Err(e) => {
            path_lock.release();
            return Err(e);
        }
    };

    log::debug!("read '{}' (lock={})", key, lock);
    let attributes = attributes.with_lock(path_lock.clone());
    let content = FileContent::new(key, stream, path_lock);
    let mut message = FileMessage::new(attributes, content, DataType::default());
    fs.update_content_metadata(&mut message);
    Ok(message)
}
