use super::read::read_attributes;
use super::{child_path, ftp_attributes, get_existing_file};
use crate::error::FtpError;
use crate::file_system::FtpFileSystem;
use crate::pool::FtpConnectionPool;
use crate::types::is_positive_completion;
use ferry_file::{
    close_all, is_virtual_directory, AttributesPredicate, FileError, FileMessage, FileResult,
    FileSystem, ListCommand,
};
use futures::future::{BoxFuture, FutureExt};

/// Entries fetched from the parse engine per round.
pub const FTP_LIST_PAGE_SIZE: usize = 25;

/// Lists a remote directory by changing into it, optionally descending
/// into subdirectories. The session's working directory is restored
/// afterwards, whether the listing succeeded or not.
pub struct FtpListCommand<'a> {
    fs: &'a mut FtpFileSystem,
    pool: &'a FtpConnectionPool,
}

fn list_failed(dir: &str, e: FtpError) -> FileError {
    FileError::operation_failed(format!("Failed to list files on directory '{}'", dir))
        .with_path(dir)
        .with_source(e)
}

impl<'a> FtpListCommand<'a> {
    pub fn new(fs: &'a mut FtpFileSystem, pool: &'a FtpConnectionPool) -> Self {
        Self { fs, pool }
    }

    fn do_list<'b>(
        &'b mut self,
        dir: String,
        recursive: bool,
        matcher: &'b dyn AttributesPredicate,
        accumulator: &'b mut Vec<FileMessage>,
    ) -> BoxFuture<'b, FileResult<()>> {
        async move {
            let mut engine = self
                .fs
                .client_mut()
                .initiate_list_parsing()
                .await
                .map_err(|e| list_failed(&dir, e))?;
            self.ensure_listed(&dir)?;

            while engine.has_next() {
                let page = engine.next_page(FTP_LIST_PAGE_SIZE);
                if page.is_empty() {
                    return Ok(());
                }

                for entry in page {
                    if is_virtual_directory(&entry.name) {
                        continue;
                    }
                    let file_path = child_path(&dir, &entry.name);
                    let attributes = ftp_attributes(&file_path, &entry);
                    if !matcher.test(&attributes) {
                        continue;
                    }

                    if !attributes.is_directory() {
                        // The listing session is already held; waiting on a
                        // bounded pool here would never finish.
                        accumulator.push(read_attributes(self.fs, self.pool, attributes, false, false).await?);
                        continue;
                    }

                    let data_type = self.fs.data_type(&attributes);
                    accumulator.push(FileMessage::directory(attributes, data_type));
                    if !recursive {
                        continue;
                    }

                    if !self.fs.client_mut().change_working_directory(&entry.name).await? {
                        return Err(FileError::operation_failed(format!(
                            "Could not change working directory to '{}' while performing recursion on list operation",
                            file_path
                        )));
                    }
                    self.do_list(file_path, recursive, matcher, accumulator).await?;
                    if !self.fs.client_mut().change_to_parent_directory().await? {
                        return Err(FileError::operation_failed(format!(
                            "Could not return to parent working directory '{}' while performing recursion on list operation",
                            dir
                        )));
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn list_current(
        &mut self,
        path: &str,
        recursive: bool,
        matcher: &dyn AttributesPredicate,
        accumulator: &mut Vec<FileMessage>,
    ) -> FileResult<()> {
        self.do_list(path.to_string(), recursive, matcher, accumulator).await?;
        self.ensure_listed(path)
    }

    /// The last reply on the listing session must be a positive completion.
    fn ensure_listed(&self, path: &str) -> FileResult<()> {
        match self.fs.client().last_reply_code() {
            Some(code) if is_positive_completion(code) => Ok(()),
            code => Err(FileError::operation_failed(format!(
                "Failed to list files on directory '{}' (last reply: {:?})",
                path, code
            ))
            .with_path(path)),
        }
    }
}

#[async_trait::async_trait]
impl ListCommand for FtpListCommand<'_> {
    async fn list(
        &mut self,
        directory: &str,
        recursive: bool,
        matcher: &dyn AttributesPredicate,
    ) -> FileResult<Vec<FileMessage>> {
        let attributes = get_existing_file(self.fs, directory)
            .await?
            .ok_or_else(|| FileError::invalid_path(directory))?;
        if !attributes.is_directory() {
            return Err(FileError::cannot_list_file(&attributes.path));
        }
        let path = attributes.path;

        let original = self.fs.client_mut().pwd().await?;
        if !self.fs.client_mut().change_working_directory(&path).await? {
            return Err(FileError::operation_failed(format!(
                "Could not change working directory to '{}' while trying to list that directory",
                path
            ))
            .with_path(path.as_str()));
        }

        let mut accumulator = Vec::new();
        let outcome = self
            .list_current(&path, recursive, matcher, &mut accumulator)
            .await;
        let restored = self.fs.client_mut().change_working_directory(&original).await;

        match (outcome, restored) {
            (Ok(()), Ok(true)) => {
                log::debug!(
                    "listed {} entries under '{}' (recursive={})",
                    accumulator.len(),
                    path,
                    recursive
                );
                Ok(accumulator)
            }
            (Ok(()), restored) => {
                // close_all logs each failed close; the listing error is what we report.
                let _ = close_all(&accumulator).await;
                let err = FileError::operation_failed(format!(
                    "Could not restore working directory '{}' after listing '{}'",
                    original, path
                ))
                .with_path(path.as_str());
                Err(match restored {
                    Err(e) => err.with_source(e),
                    Ok(_) => err,
                })
            }
            (Err(e), restored) => {
                match restored {
                    Ok(true) => {}
                    Ok(false) => log::error!(
                        "could not restore working directory '{}' after failed listing of '{}'",
                        original,
                        path
                    ),
                    Err(restore_err) => log::error!(
                        "could not restore working directory '{}' after failed listing of '{}': {}",
                        original,
                        path,
                        restore_err
                    ),
                }
                // close_all logs each failed close; the listing error is what we report.
                let _ = close_all(&accumulator).await;
                Err(e)
            }
        }
    }
}
