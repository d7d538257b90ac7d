//! Lazily opened content streams.
//!
//! A [`FileContent`] wraps a [`ContentSource`] that is not touched until the
//! first read. The opened reader is kept for the life of the stream. Closing
//! (explicitly, or automatically once the reader reports end of stream) tears
//! the source down once and then releases the path lock, whatever the
//! teardown returned.

use crate::error::{FileError, FileResult};
use crate::lock::PathLock;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

pub type ContentReader = Box<dyn AsyncRead + Send + Unpin>;

const COPY_BUFFER: usize = 8 * 1024;

/// Where the bytes of a file come from.
#[async_trait::async_trait]
pub trait ContentSource: Send {
    /// Open the byte source. Called at most once per stream.
    async fn open(&mut self) -> FileResult<ContentReader>;

    /// Tear the source down. `reader` is the opened reader, if `open` ran.
    async fn close(&mut self, reader: Option<ContentReader>) -> FileResult<()> {
        drop(reader);
        Ok(())
    }
}

enum ContentState {
    Pending(Box<dyn ContentSource>),
    Streaming {
        source: Box<dyn ContentSource>,
        reader: ContentReader,
    },
    Closed,
}

impl ContentState {
    fn label(&self) -> &'static str {
        match self {
            ContentState::Pending(_) => "pending",
            ContentState::Streaming { .. } => "streaming",
            ContentState::Closed => "closed",
        }
    }
}

/// Content of one file, opened on first read.
pub struct FileContent {
    path: String,
    state: Mutex<ContentState>,
    lock: Arc<dyn PathLock>,
}

impl fmt::Debug for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.try_lock().map(|s| s.label()).unwrap_or("busy");
        f.debug_struct("FileContent")
            .field("path", &self.path)
            .field("state", &state)
            .finish()
    }
}

impl FileContent {
    pub fn new<S>(path: impl Into<String>, source: S, lock: Arc<dyn PathLock>) -> Self
    where
        S: ContentSource + 'static,
    {
        Self {
            path: path.into(),
            state: Mutex::new(ContentState::Pending(Box::new(source))),
            lock,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub async fn is_open(&self) -> bool {
        matches!(*self.state.lock().await, ContentState::Streaming { .. })
    }

    pub async fn is_closed(&self) -> bool {
        matches!(*self.state.lock().await, ContentState::Closed)
    }

    /// Read into `buf`. Returns 0 at end of stream; the stream is closed
    /// at that point.
    pub async fn read(&self, buf: &mut [u8]) -> FileResult<usize> {
        let mut state = self.state.lock().await;

        *state = match std::mem::replace(&mut *state, ContentState::Closed) {
            ContentState::Pending(mut source) => {
                log::debug!("opening content of '{}'", self.path);
                match source.open().await {
                    Ok(reader) => ContentState::Streaming { source, reader },
                    Err(e) => {
                        if let Err(close_err) = source.close(None).await {
                            log::warn!("cleanup after failed open of '{}': {}", self.path, close_err);
                        }
                        self.lock.release();
                        return Err(e);
                    }
                }
            }
            other => other,
        };

        let n = match &mut *state {
            ContentState::Streaming { reader, .. } => reader
                .read(buf)
                .await
                .map_err(|e| FileError::io(&self.path, e))?,
            _ => return Ok(0),
        };

        if n == 0 && !buf.is_empty() {
            self.close_locked(&mut state).await?;
        }
        Ok(n)
    }

    /// Read the remaining content, closing the stream at the end.
    pub async fn read_to_end(&self) -> FileResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; COPY_BUFFER];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    pub async fn read_to_string(&self) -> FileResult<String> {
        let bytes = self.read_to_end().await?;
        String::from_utf8(bytes).map_err(|e| {
            FileError::operation_failed(format!("content of '{}' is not UTF-8: {}", self.path, e))
                .with_path(self.path.as_str())
        })
    }

    /// Copy the remaining content into `writer`.
    pub async fn copy_to<W>(&self, writer: &mut W) -> FileResult<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut total = 0u64;
        let mut buf = vec![0u8; COPY_BUFFER];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(|e| FileError::io(&self.path, e))?;
            total += n as u64;
        }
        writer.flush().await.map_err(|e| FileError::io(&self.path, e))?;
        Ok(total)
    }

    /// Close the stream. Later calls are no-ops.
    pub async fn close(&self) -> FileResult<()> {
        let mut state = self.state.lock().await;
        self.close_locked(&mut state).await
    }

    async fn close_locked(&self, state: &mut ContentState) -> FileResult<()> {
        let result = match std::mem::replace(state, ContentState::Closed) {
            ContentState::Closed => return Ok(()),
            ContentState::Pending(mut source) => source.close(None).await,
            ContentState::Streaming { mut source, reader } => source.close(Some(reader)).await,
        };
        self.lock.release();
        log::debug!("closed content of '{}'", self.path);
        result
    }
}

impl Drop for FileContent {
    fn drop(&mut self) {
        if !matches!(self.state.get_mut(), ContentState::Closed) {
            log::warn!("content of '{}' dropped without being closed", self.path);
            self.lock.release();
        }
    }
}
