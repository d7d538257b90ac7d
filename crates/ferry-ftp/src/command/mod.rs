//! Read and list commands over an FTP session.

mod list;
mod read;

pub use list::{FtpListCommand, FTP_LIST_PAGE_SIZE};
pub use read::FtpReadCommand;

use crate::file_system::FtpFileSystem;
use crate::types::{FtpEntry, FtpEntryKind};
use ferry_file::{is_virtual_directory, FileAttributes, FileError, FileKind, FileResult};

/// Absolute, normalised form of `path` relative to `cwd`.
pub fn resolve_path(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd, path)
    };
    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

pub(crate) fn child_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

pub fn ftp_attributes(path: &str, entry: &FtpEntry) -> FileAttributes {
    let kind = match entry.kind {
        FtpEntryKind::File => FileKind::File,
        FtpEntryKind::Directory => FileKind::Directory,
        FtpEntryKind::Symlink => FileKind::Symlink,
        FtpEntryKind::Unknown => FileKind::Other,
    };
    FileAttributes::new(path, kind, entry.size)
        .with_modified(entry.modified)
        .with_permissions(entry.permissions.clone())
        .with_owner(entry.owner.clone(), entry.group.clone())
}

/// Attributes of `path`, or `None` when the server knows no such entry.
///
/// Directories are detected by changing into them (and straight back);
/// anything else is looked up with `LIST`.
pub(crate) async fn get_existing_file(
    fs: &mut FtpFileSystem,
    path: &str,
) -> FileResult<Option<FileAttributes>> {
    let client = fs.client_mut();
    let cwd = client.pwd().await?;
    let target = resolve_path(&cwd, path);

    if client.change_working_directory(&target).await? {
        if !client.change_working_directory(&cwd).await? {
            return Err(FileError::operation_failed(format!(
                "Could not return to working directory '{}' after probing '{}'",
                cwd, target
            )));
        }
        return Ok(Some(FileAttributes::new(target, FileKind::Directory, 0)));
    }

    match client.list_files(&target).await {
        Ok(entries) => Ok(entries
            .iter()
            .find(|e| !is_virtual_directory(&e.name))
            .map(|e| ftp_attributes(&target, e))),
        Err(e) if e.is_rejection() => Ok(None),
        Err(e) => Err(FileError::operation_failed(format!(
            "Found exception while trying to list path {}",
            target
        ))
        .with_path(target.as_str())
        .with_source(e)),
    }
}
