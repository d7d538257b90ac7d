//! Class loading error type.

use crate::policy::LookupPolicy;
use crate::source::LookupKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassLoaderError {
    /// Neither source permitted by the lookup policy has the name.
    #[error("{kind} '{name}' not found by loader '{loader}' ({policy})")]
    ClassResolutionFailed {
        kind: LookupKind,
        name: String,
        loader: String,
        policy: LookupPolicy,
    },

    /// The same name appears in more than one loader override set.
    #[error("'{0}' is listed in more than one loader override set")]
    InvalidOverride(String),

    #[error("invalid class path entry '{path}': {reason}")]
    InvalidClassPath { path: PathBuf, reason: String },

    #[error("cannot read plugin directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ClassLoaderResult<T> = Result<T, ClassLoaderError>;
