//! Local filesystem connector.

pub mod list;
pub mod read;

pub use list::LocalListCommand;
pub use read::LocalReadCommand;

use crate::attributes::{FileAttributes, FileKind};
use crate::command::{FileConnector, FileSystem, ListCommand, ReadCommand};
use crate::content::{ContentReader, ContentSource};
use crate::error::{FileError, FileResult};
use crate::lock::LockRegistry;
use crate::matcher::AttributesPredicate;
use crate::message::FileMessage;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};

/// Files under a base directory. Relative paths resolve against it.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    base_dir: PathBuf,
    registry: LockRegistry,
    default_encoding: Option<String>,
}

impl LocalFileSystem {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            registry: LockRegistry::new(),
            default_encoding: None,
        }
    }

    pub fn with_encoding(mut self, encoding: Option<String>) -> Self {
        self.default_encoding = encoding;
        self
    }

    /// Share locks with other connectors over the same files.
    pub fn with_registry(mut self, registry: LockRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn read_command(&self) -> LocalReadCommand<'_> {
        LocalReadCommand::new(self)
    }

    pub fn list_command(&self) -> LocalListCommand<'_> {
        LocalListCommand::new(self)
    }

    /// `path` against the base directory, with `.` and `..` folded away.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let joined = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.base_dir.join(path)
        };
        normalize(&joined)
    }

    /// Canonical form of `path`, failing with `InvalidPath` if it is missing.
    pub async fn resolve_existing_path(&self, path: &str) -> FileResult<PathBuf> {
        let resolved = self.resolve_path(path);
        match tokio::fs::canonicalize(&resolved).await {
            Ok(p) => Ok(p),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FileError::invalid_path(&resolved.to_string_lossy()))
            }
            Err(e) => Err(FileError::io(&resolved.to_string_lossy(), e)),
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Lock registry key of a local path.
pub(crate) fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub(crate) fn local_attributes(path: &Path, meta: &std::fs::Metadata) -> FileAttributes {
    let file_type = meta.file_type();
    let kind = if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_dir() {
        FileKind::Directory
    } else if file_type.is_file() {
        FileKind::File
    } else {
        FileKind::Other
    };
    let size = if kind == FileKind::Directory { 0 } else { meta.len() };
    FileAttributes::new(path_key(path), kind, size)
        .with_modified(meta.modified().ok().map(DateTime::<Utc>::from))
        .with_permissions(permissions(meta))
}

#[cfg(unix)]
fn permissions(meta: &std::fs::Metadata) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode();
    let flags = ['r', 'w', 'x'];
    Some(
        (0..9)
            .map(|i| {
                if mode & (0o400 >> i) != 0 {
                    flags[i % 3]
                } else {
                    '-'
                }
            })
            .collect(),
    )
}

#[cfg(not(unix))]
fn permissions(meta: &std::fs::Metadata) -> Option<String> {
    Some(if meta.permissions().readonly() { "r--" } else { "rw-" }.to_string())
}

/// Opens a local file on first read.
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait::async_trait]
impl ContentSource for LocalFileSource {
    async fn open(&mut self) -> FileResult<ContentReader> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| FileError::io(&self.path.to_string_lossy(), e))?;
        Ok(Box::new(file))
    }
}

#[async_trait::async_trait]
impl FileSystem for LocalFileSystem {
    fn lock_registry(&self) -> &LockRegistry {
        &self.registry
    }

    fn default_encoding(&self) -> Option<&str> {
        self.default_encoding.as_deref()
    }
}

#[async_trait::async_trait]
impl FileConnector for LocalFileSystem {
    fn name(&self) -> &str {
        "local"
    }

    async fn read(&self, path: &str, lock: bool) -> FileResult<FileMessage> {
        self.read_command().read(path, lock).await
    }

    async fn list(
        &self,
        directory: &str,
        recursive: bool,
        matcher: &dyn AttributesPredicate,
    ) -> FileResult<Vec<FileMessage>> {
        self.list_command().list(directory, recursive, matcher).await
    }
}
