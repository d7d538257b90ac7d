//! Content source backed by a dedicated pooled connection.

use crate::error::FtpResult;
use crate::pool::{ConnectionHandle, FtpConnectionPool};
use ferry_file::{ContentReader, ContentSource, FileError, FileErrorKind, FileResult};

/// Streams one remote file over its own checked-out session.
///
/// The session is taken at construction; `RETR` is only sent on the first
/// read. Closing waits for the transfer's completion reply, drops the data
/// stream and gives the session back, in that order.
pub struct FtpInputStream {
    path: String,
    handle: Option<ConnectionHandle>,
    opened: bool,
}

impl std::fmt::Debug for FtpInputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpInputStream")
            .field("path", &self.path)
            .field("opened", &self.opened)
            .field("released", &self.handle.is_none())
            .finish()
    }
}

impl FtpInputStream {
    pub async fn new(pool: &FtpConnectionPool, path: impl Into<String>) -> FileResult<Self> {
        let path = path.into();
        let checkout = pool.get_connection().await;
        Self::from_checkout(checkout, path)
    }

    /// Fails with `ConnectionUnavailable` instead of waiting when the pool
    /// is at its bound.
    pub async fn try_new(pool: &FtpConnectionPool, path: impl Into<String>) -> FileResult<Self> {
        let path = path.into();
        let checkout = pool.try_get_connection().await;
        Self::from_checkout(checkout, path)
    }

    fn from_checkout(checkout: FtpResult<ConnectionHandle>, path: String) -> FileResult<Self> {
        let handle = checkout.map_err(|e| {
            FileError::connection_unavailable(format!(
                "Could not obtain connection to fetch file '{}': {}",
                path, e.message
            ))
            .with_path(path.as_str())
            .with_source(e)
        })?;
        Ok(Self {
            path,
            handle: Some(handle),
            opened: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait::async_trait]
impl ContentSource for FtpInputStream {
    async fn open(&mut self) -> FileResult<ContentReader> {
        let handle = self.handle.as_mut().ok_or_else(|| {
            FileError::new(
                FileErrorKind::IllegalOperation,
                format!("Stream for '{}' is already closed", self.path),
            )
        })?;
        let stream = handle
            .connection()
            .retrieve_file_content(&self.path)
            .await
            .map_err(|e| {
                FileError::operation_failed(format!("Failed to retrieve file '{}'", self.path))
                    .with_path(self.path.as_str())
                    .with_source(e)
            })?;
        self.opened = true;
        log::debug!("retrieving '{}'", self.path);
        Ok(Box::new(stream))
    }

    async fn close(&mut self, reader: Option<ContentReader>) -> FileResult<()> {
        let Some(mut handle) = self.handle.take() else {
            drop(reader);
            return Ok(());
        };

        let mut result = Ok(());
        if self.opened {
            if let Err(e) = handle.connection().await_command_completion().await {
                log::warn!("transfer of '{}' did not complete cleanly: {}", self.path, e);
                result = Err(FileError::operation_failed(format!(
                    "Could not complete retrieval of '{}'",
                    self.path
                ))
                .with_path(self.path.as_str())
                .with_source(e));
            }
        }
        drop(reader);

        handle.release();
        result
    }
}
