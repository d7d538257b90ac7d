//! Result of a read, or one entry of a listing.

use crate::attributes::{DataType, FileAttributes};
use crate::content::FileContent;
use crate::error::FileResult;

/// Attributes, data type and (for files) a lazily opened content stream.
#[derive(Debug)]
pub struct FileMessage {
    pub attributes: FileAttributes,
    /// `None` for directory entries.
    pub content: Option<FileContent>,
    pub data_type: DataType,
}

impl FileMessage {
    pub fn new(attributes: FileAttributes, content: FileContent, data_type: DataType) -> Self {
        Self {
            attributes,
            content: Some(content),
            data_type,
        }
    }

    pub fn directory(attributes: FileAttributes, data_type: DataType) -> Self {
        Self {
            attributes,
            content: None,
            data_type,
        }
    }

    pub fn path(&self) -> &str {
        &self.attributes.path
    }

    /// Close the content stream, if any.
    pub async fn close(&self) -> FileResult<()> {
        match &self.content {
            Some(content) => content.close().await,
            None => Ok(()),
        }
    }
}

/// Close every message, returning the first failure.
pub async fn close_all(messages: &[FileMessage]) -> FileResult<()> {
    let mut first_err = None;
    for message in messages {
        if let Err(e) = message.close().await {
            log::warn!("failed to close '{}': {}", message.path(), e);
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
