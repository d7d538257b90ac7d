//! File metadata shared by every connector.

use crate::lock::{NullPathLock, PathLock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ─── Entry kind ──────────────────────────────────────────────────────

/// Type of a filesystem entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileKind::File => "file",
            FileKind::Directory => "directory",
            FileKind::Symlink => "symlink",
            FileKind::Other => "other",
        };
        f.write_str(s)
    }
}

// ─── Attributes ──────────────────────────────────────────────────────

/// Metadata of one file or directory.
///
/// Immutable once built, except for the lock associated with it by a read.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttributes {
    pub path: String,
    pub name: String,
    pub kind: FileKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// `rwxr-xr-x` style string, when the source reports one.
    pub permissions: Option<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
    #[serde(skip)]
    lock: Arc<dyn PathLock>,
}

impl fmt::Debug for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAttributes")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl FileAttributes {
    pub fn new(path: impl Into<String>, kind: FileKind, size: u64) -> Self {
        let path = path.into();
        let name = file_name(&path).to_string();
        Self {
            lock: Arc::new(NullPathLock::new(path.clone())),
            path,
            name,
            kind,
            size,
            modified: None,
            permissions: None,
            owner: None,
            group: None,
        }
    }

    pub fn with_modified(mut self, modified: Option<DateTime<Utc>>) -> Self {
        self.modified = modified;
        self
    }

    pub fn with_permissions(mut self, permissions: Option<String>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_owner(mut self, owner: Option<String>, group: Option<String>) -> Self {
        self.owner = owner;
        self.group = group;
        self
    }

    pub fn with_lock(mut self, lock: Arc<dyn PathLock>) -> Self {
        self.lock = lock;
        self
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_regular_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    pub fn lock(&self) -> &Arc<dyn PathLock> {
        &self.lock
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

/// Last path component of a `/`-separated path.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

// ─── Data type ───────────────────────────────────────────────────────

/// MIME type and optional charset of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataType {
    pub mime_type: String,
    pub encoding: Option<String>,
}

impl Default for DataType {
    fn default() -> Self {
        Self {
            mime_type: mime_guess::mime::APPLICATION_OCTET_STREAM.to_string(),
            encoding: None,
        }
    }
}

impl DataType {
    /// Guess from the file name, falling back to `application/octet-stream`.
    pub fn for_attributes(attributes: &FileAttributes, encoding: Option<&str>) -> Self {
        let mime_type = mime_guess::from_path(&attributes.name)
            .first_or_octet_stream()
            .to_string();
        let encoding = if mime_type.starts_with("text/") {
            encoding.map(str::to_string)
        } else {
            None
        };
        Self { mime_type, encoding }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.encoding {
            Some(enc) => write!(f, "{}; charset={}", self.mime_type, enc),
            None => f.write_str(&self.mime_type),
        }
    }
}
