//! Predicates used to filter listings.

use crate::attributes::{FileAttributes, FileKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accepts or rejects one listed entry.
pub trait AttributesPredicate: Send + Sync {
    fn test(&self, attributes: &FileAttributes) -> bool;
}

impl<F> AttributesPredicate for F
where
    F: Fn(&FileAttributes) -> bool + Send + Sync,
{
    fn test(&self, attributes: &FileAttributes) -> bool {
        self(attributes)
    }
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AttributesPredicate for AcceptAll {
    fn test(&self, _attributes: &FileAttributes) -> bool {
        true
    }
}

/// Declarative matcher. Every criterion that is set must hold.
///
/// Name and path patterns are shell globs (`*.html`, `/data/**/in/*.csv`).
/// An invalid pattern matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMatcher {
    #[serde(default)]
    pub filename_pattern: Option<String>,
    #[serde(default)]
    pub path_pattern: Option<String>,
    #[serde(default)]
    pub directory: Option<bool>,
    #[serde(default)]
    pub regular_file: Option<bool>,
    #[serde(default)]
    pub symlink: Option<bool>,
    #[serde(default)]
    pub min_size: Option<u64>,
    #[serde(default)]
    pub max_size: Option<u64>,
    #[serde(default)]
    pub updated_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_until: Option<DateTime<Utc>>,
}

impl FileMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filename(mut self, pattern: impl Into<String>) -> Self {
        self.filename_pattern = Some(pattern.into());
        self
    }

    pub fn path(mut self, pattern: impl Into<String>) -> Self {
        self.path_pattern = Some(pattern.into());
        self
    }

    pub fn directories(mut self, accept: bool) -> Self {
        self.directory = Some(accept);
        self
    }

    pub fn regular_files(mut self, accept: bool) -> Self {
        self.regular_file = Some(accept);
        self
    }

    pub fn size_between(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_size = min;
        self.max_size = max;
        self
    }

    fn kind_matches(&self, kind: FileKind) -> bool {
        let wanted = |flag: Option<bool>, is: bool| flag.map(|f| f == is).unwrap_or(true);
        wanted(self.directory, kind == FileKind::Directory)
            && wanted(self.regular_file, kind == FileKind::File)
            && wanted(self.symlink, kind == FileKind::Symlink)
    }
}

fn glob_matches(pattern: &Option<String>, value: &str) -> bool {
    match pattern {
        None => true,
        Some(p) => match glob::Pattern::new(p) {
            Ok(pat) => pat.matches(value),
            Err(e) => {
                log::warn!("invalid match pattern '{}': {}", p, e);
                false
            }
        },
    }
}

impl AttributesPredicate for FileMatcher {
    fn test(&self, a: &FileAttributes) -> bool {
        if !self.kind_matches(a.kind) {
            return false;
        }
        if !glob_matches(&self.filename_pattern, &a.name) || !glob_matches(&self.path_pattern, &a.path) {
            return false;
        }
        // Size bounds only make sense for regular files.
        if !a.is_directory() {
            if self.min_size.is_some_and(|min| a.size < min) {
                return false;
            }
            if self.max_size.is_some_and(|max| a.size > max) {
                return false;
            }
        }
        match a.modified {
            Some(m) => {
                self.updated_since.map(|s| m >= s).unwrap_or(true)
                    && self.updated_until.map(|u| m <= u).unwrap_or(true)
            }
            None => self.updated_since.is_none() && self.updated_until.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(path: &str, size: u64) -> FileAttributes {
        FileAttributes::new(path, FileKind::File, size)
    }

    fn dir(path: &str) -> FileAttributes {
        FileAttributes::new(path, FileKind::Directory, 0)
    }

    #[test]
    fn closures_are_predicates() {
        let only_html = |a: &FileAttributes| a.name.ends_with(".html");
        assert!(only_html.test(&file("/d/a.html", 1)));
        assert!(!only_html.test(&file("/d/a.txt", 1)));
    }

    #[test]
    fn empty_matcher_accepts_everything() {
        let m = FileMatcher::new();
        assert!(m.test(&file("/d/a.html", 1)));
        assert!(m.test(&dir("/d/sub")));
    }

    #[test]
    fn filename_glob() {
        let m = FileMatcher::new().filename("test-file-*.html");
        assert!(m.test(&file("/d/test-file-3.html", 3)));
        assert!(!m.test(&file("/d/other.html", 3)));
    }

    #[test]
    fn kind_flags() {
        let no_dirs = FileMatcher::new().directories(false);
        assert!(no_dirs.test(&file("/d/a", 1)));
        assert!(!no_dirs.test(&dir("/d/sub")));

        let only_files = FileMatcher::new().regular_files(true);
        assert!(!only_files.test(&dir("/d/sub")));
    }

    #[test]
    fn size_bounds_ignore_directories() {
        let m = FileMatcher::new().size_between(Some(2), Some(4));
        assert!(!m.test(&file("/d/a", 1)));
        assert!(m.test(&file("/d/a", 3)));
        assert!(!m.test(&file("/d/a", 5)));
        assert!(m.test(&dir("/d/sub")));
    }

    #[test]
    fn modification_window() {
        let t = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let m = FileMatcher {
            updated_since: Some(t(10)),
            ..Default::default()
        };
        assert!(m.test(&file("/d/a", 1).with_modified(Some(t(11)))));
        assert!(!m.test(&file("/d/a", 1).with_modified(Some(t(9)))));
        assert!(!m.test(&file("/d/a", 1)));
    }

    #[test]
    fn deserializes_camel_case() {
        let m: FileMatcher =
            serde_json::from_str(r#"{ "filenamePattern": "*.csv", "directory": false }"#).unwrap();
        assert_eq!(m.filename_pattern.as_deref(), Some("*.csv"));
        assert_eq!(m.directory, Some(false));
    }
}
