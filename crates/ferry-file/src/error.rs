//! File connector error type.

use std::fmt;
use std::sync::Arc;

/// Categorised file connector error.
#[derive(Debug, Clone)]
pub struct FileError {
    pub kind: FileErrorKind,
    pub message: String,
    /// Path the failing operation was working on, if any.
    pub path: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    /// Target path does not exist.
    InvalidPath,
    /// Read on a directory, list on a file.
    IllegalOperation,
    /// Unlocked read of a path somebody else holds locked.
    FileLocked,
    /// No connection could be obtained for the operation.
    ConnectionUnavailable,
    /// Protocol failure: bad reply, failed directory change, parse error.
    OperationFailed,
    /// Local I/O failure.
    Io,
}

pub type FileResult<T> = Result<T, FileError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FileError {
    pub fn new(kind: FileErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            path: None,
            source: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn invalid_path(path: &str) -> Self {
        Self::new(
            FileErrorKind::InvalidPath,
            format!("Path '{}' doesn't exist", path),
        )
        .with_path(path)
    }

    pub fn cannot_read_directory(path: &str) -> Self {
        Self::new(
            FileErrorKind::IllegalOperation,
            format!("Cannot read path '{}' since it's a directory", path),
        )
        .with_path(path)
    }

    pub fn cannot_list_file(path: &str) -> Self {
        Self::new(
            FileErrorKind::IllegalOperation,
            format!("Cannot list path '{}' because it's a file. Only directories can be listed", path),
        )
        .with_path(path)
    }

    pub fn file_locked(path: &str) -> Self {
        Self::new(
            FileErrorKind::FileLocked,
            format!("File '{}' is locked by another process", path),
        )
        .with_path(path)
    }

    pub fn connection_unavailable(msg: impl Into<String>) -> Self {
        Self::new(FileErrorKind::ConnectionUnavailable, msg)
    }

    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::new(FileErrorKind::OperationFailed, msg)
    }

    pub fn io(path: &str, err: std::io::Error) -> Self {
        Self::new(FileErrorKind::Io, format!("I/O error on '{}': {}", path, err))
            .with_path(path)
            .with_source(err)
    }

    pub fn is(&self, kind: FileErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<FileError> for std::io::Error {
    fn from(e: FileError) -> Self {
        let kind = match e.kind {
            FileErrorKind::InvalidPath => std::io::ErrorKind::NotFound,
            FileErrorKind::FileLocked => std::io::ErrorKind::WouldBlock,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_includes_kind_and_message() {
        let e = FileError::invalid_path("/nope");
        assert_eq!(e.to_string(), "[InvalidPath] Path '/nope' doesn't exist");
        assert_eq!(e.path.as_deref(), Some("/nope"));
    }

    #[test]
    fn source_is_chained() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let e = FileError::connection_unavailable("no connection").with_source(io);
        assert!(e.is(FileErrorKind::ConnectionUnavailable));
        assert_eq!(e.source().unwrap().to_string(), "refused");
    }

    #[test]
    fn converts_into_io_error() {
        let io: std::io::Error = FileError::file_locked("a.txt").into();
        assert_eq!(io.kind(), std::io::ErrorKind::WouldBlock);
    }
}
