//! # ferry-file — file connector core
//!
//! Contracts and shared machinery for file-like connectors, plus the local
//! filesystem connector.
//!
//! Architecture:
//! - `error` — file connector error type
//! - `lock` — advisory per-path locks and the lock registry
//! - `attributes` — file metadata and data type
//! - `content` — lazily opened content streams with guaranteed release
//! - `message` — read results / listing entries
//! - `matcher` — listing predicates
//! - `command` — `FileSystem`, `ReadCommand`, `ListCommand`, `FileConnector`
//! - `local` — local filesystem connector

pub mod attributes;
pub mod command;
pub mod content;
pub mod error;
pub mod local;
pub mod lock;
pub mod matcher;
pub mod message;

pub use attributes::{file_name, DataType, FileAttributes, FileKind};
pub use command::{FileConnector, FileSystem, ListCommand, ReadCommand};
pub use content::{ContentReader, ContentSource, FileContent};
pub use error::{FileError, FileErrorKind, FileResult};
pub use local::LocalFileSystem;
pub use lock::{LockRegistry, NullPathLock, PathLock, RegistryLock};
pub use matcher::{AcceptAll, AttributesPredicate, FileMatcher};
pub use message::{close_all, FileMessage};

/// `.` and `..` entries never show up in listings.
pub fn is_virtual_directory(name: &str) -> bool {
    name == "." || name == ".."
}
