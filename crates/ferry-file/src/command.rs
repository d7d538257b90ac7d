//! Command contracts shared by the local and remote connectors.

use crate::attributes::{DataType, FileAttributes};
use crate::error::{FileError, FileResult};
use crate::lock::{LockRegistry, PathLock};
use crate::matcher::AttributesPredicate;
use crate::message::FileMessage;
use std::sync::Arc;

/// Services a connector offers to its read/list commands.
#[async_trait::async_trait]
pub trait FileSystem: Send + Sync {
    fn lock_registry(&self) -> &LockRegistry;

    /// Charset reported for text content.
    fn default_encoding(&self) -> Option<&str> {
        None
    }

    /// Exclusive lock on `path`, waiting for any current holder.
    async fn lock(&self, path: &str) -> Arc<dyn PathLock> {
        Arc::new(self.lock_registry().lock(path).await)
    }

    /// Fail with `FileLocked` if somebody holds `path`.
    fn verify_not_locked(&self, path: &str) -> FileResult<()> {
        if self.lock_registry().is_locked(path) {
            Err(FileError::file_locked(path))
        } else {
            Ok(())
        }
    }

    fn data_type(&self, attributes: &FileAttributes) -> DataType {
        DataType::for_attributes(attributes, self.default_encoding())
    }

    /// Refresh message metadata derived from the attributes.
    fn update_content_metadata(&self, message: &mut FileMessage) {
        message.data_type = self.data_type(&message.attributes);
    }
}

/// Commands run with exclusive use of their connection.
#[async_trait::async_trait]
pub trait ReadCommand: Send {
    /// Attributes and lazily opened content of the file at `path`.
    ///
    /// With `lock` the path is held until the content is closed or
    /// exhausted, waiting for any current holder first. Without it the read
    /// fails with `FileLocked` while somebody else holds the path.
    async fn read(&mut self, path: &str, lock: bool) -> FileResult<FileMessage>;
}

#[async_trait::async_trait]
pub trait ListCommand: Send {
    /// Entries of `directory` accepted by `matcher`, descending into
    /// subdirectories when `recursive`. `.` and `..` are never returned.
    async fn list(
        &mut self,
        directory: &str,
        recursive: bool,
        matcher: &dyn AttributesPredicate,
    ) -> FileResult<Vec<FileMessage>>;
}

/// A configured connector: the operations a caller runs against it.
#[async_trait::async_trait]
pub trait FileConnector: Send + Sync {
    fn name(&self) -> &str;

    async fn read(&self, path: &str, lock: bool) -> FileResult<FileMessage>;

    async fn list(
        &self,
        directory: &str,
        recursive: bool,
        matcher: &dyn AttributesPredicate,
    ) -> FileResult<Vec<FileMessage>>;
}
