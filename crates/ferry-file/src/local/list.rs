use super::{local_attributes, path_key, LocalFileSystem, LocalReadCommand};
use crate::command::{FileSystem, ListCommand};
use crate::error::{FileError, FileResult};
use crate::is_virtual_directory;
use crate::matcher::AttributesPredicate;
use crate::message::FileMessage;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::path::PathBuf;

/// Lists a local directory, optionally descending into subdirectories.
///
/// Symbolic links are reported under their listed path and classified by
/// what they point to. Dangling links are skipped.
pub struct LocalListCommand<'a> {
    fs: &'a LocalFileSystem,
    reader: LocalReadCommand<'a>,
    visited: HashSet<PathBuf>,
}

impl<'a> LocalListCommand<'a> {
    pub fn new(fs: &'a LocalFileSystem) -> Self {
        Self {
            fs,
            reader: LocalReadCommand::new(fs),
            visited: HashSet::new(),
        }
    }

    fn do_list<'b>(
        &'b mut self,
        dir: PathBuf,
        recursive: bool,
        matcher: &'b dyn AttributesPredicate,
        accumulator: &'b mut Vec<FileMessage>,
    ) -> BoxFuture<'b, FileResult<()>> {
        async move {
            let dir_key = path_key(&dir);
            let canonical = tokio::fs::canonicalize(&dir)
                .await
                .map_err(|e| FileError::io(&dir_key, e))?;
            if !self.visited.insert(canonical) {
                log::warn!("skipping '{}': directory already listed through another link", dir_key);
                return Ok(());
            }

            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| FileError::io(&dir_key, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| FileError::io(&dir_key, e))?
            {
                let name = entry.file_name();
                if is_virtual_directory(&name.to_string_lossy()) {
                    continue;
                }
                let path = entry.path();
                let key = path_key(&path);
                let meta = match tokio::fs::metadata(&path).await {
                    Ok(meta) => meta,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        log::debug!("skipping dangling link '{}'", key);
                        continue;
                    }
                    Err(e) => return Err(FileError::io(&key, e)),
                };
                let attributes = local_attributes(&path, &meta);
                if !matcher.test(&attributes) {
                    continue;
                }

                if attributes.is_directory() {
                    let data_type = self.fs.data_type(&attributes);
                    accumulator.push(FileMessage::directory(attributes, data_type));
                    if recursive {
                        self.do_list(path, recursive, matcher, accumulator).await?;
                    }
                } else {
                    let target = tokio::fs::canonicalize(&path)
                        .await
                        .map_err(|e| FileError::io(&key, e))?;
                    accumulator.push(self.reader.read_existing(&path, target, &meta, false).await?);
                }
            }
            Ok(())
        }
        .boxed()
    }
}

#[async_trait::async_trait]
impl ListCommand for LocalListCommand<'_> {
    async fn list(
        &mut self,
        directory: &str,
        recursive: bool,
        matcher: &dyn AttributesPredicate,
    ) -> FileResult<Vec<FileMessage>> {
        let path = self.fs.resolve_existing_path(directory).await?;
        let key = path_key(&path);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FileError::io(&key, e))?;
        if !meta.is_dir() {
            return Err(FileError::cannot_list_file(&key));
        }

        let mut accumulator = Vec::new();
        self.visited.clear();
        self.do_list(path, recursive, matcher, &mut accumulator).await?;
        log::debug!("listed {} entries under '{}' (recursive={})", accumulator.len(), key, recursive);
        Ok(accumulator)
    }
}
