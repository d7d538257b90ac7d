//! Directory + jar search path.
//!
//! Exploded directories are probed on disk at lookup time. Jar indexes are
//! read once, on first lookup, and kept for the lifetime of the class path.

use crate::error::{ClassLoaderError, ClassLoaderResult};
use crate::source::{Resource, ResourceSource};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use url::Url;

enum ClassPathEntry {
    Directory {
        root: PathBuf,
    },
    Jar {
        path: PathBuf,
        url: Url,
        index: OnceLock<HashSet<String>>,
    },
}

impl ClassPathEntry {
    fn locate(&self, resource_name: &str) -> Option<Url> {
        match self {
            ClassPathEntry::Directory { root } => {
                let candidate = root.join(resource_name);
                if candidate.is_file() {
                    Url::from_file_path(&candidate).ok()
                } else {
                    None
                }
            }
            ClassPathEntry::Jar { path, url, index } => {
                let entries = index.get_or_init(|| read_jar_index(path));
                if entries.contains(resource_name) {
                    Url::parse(&format!("jar:{}!/{}", url, resource_name)).ok()
                } else {
                    None
                }
            }
        }
    }
}

/// A lookup name must stay inside its class path entry: relative, with no
/// `.` or `..` segments.
fn is_contained_name(resource_name: &str) -> bool {
    !resource_name.is_empty()
        && !resource_name.contains('\\')
        && Path::new(resource_name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

fn read_jar_index(path: &Path) -> HashSet<String> {
    let archive = File::open(path)
        .map_err(|e| e.to_string())
        .and_then(|f| zip::ZipArchive::new(f).map_err(|e| e.to_string()));
    match archive {
        Ok(archive) => {
            let entries: HashSet<String> = archive.file_names().map(str::to_string).collect();
            log::debug!("indexed {} entries of {}", entries.len(), path.display());
            entries
        }
        Err(e) => {
            log::warn!("cannot read jar {}: {}", path.display(), e);
            HashSet::new()
        }
    }
}

/// Ordered search path over `file:` URLs of directories and jars.
pub struct UrlClassPath {
    name: String,
    urls: Vec<Url>,
    entries: Vec<ClassPathEntry>,
}

impl UrlClassPath {
    pub fn new(name: impl Into<String>, urls: Vec<Url>) -> ClassLoaderResult<Self> {
        let mut entries = Vec::with_capacity(urls.len());
        for url in &urls {
            let path = url.to_file_path().map_err(|_| ClassLoaderError::InvalidClassPath {
                path: PathBuf::from(url.as_str()),
                reason: "not a local file URL".into(),
            })?;
            if path.is_dir() {
                entries.push(ClassPathEntry::Directory { root: path });
            } else {
                entries.push(ClassPathEntry::Jar {
                    path,
                    url: url.clone(),
                    index: OnceLock::new(),
                });
            }
        }
        Ok(Self {
            name: name.into(),
            urls,
            entries,
        })
    }

    /// Class path over local directories and jar files, in order.
    pub fn from_paths<P: AsRef<Path>>(name: impl Into<String>, paths: &[P]) -> ClassLoaderResult<Self> {
        let urls = paths
            .iter()
            .map(|p| {
                let p = p.as_ref();
                let abs = p.canonicalize().map_err(|e| ClassLoaderError::InvalidClassPath {
                    path: p.to_path_buf(),
                    reason: e.to_string(),
                })?;
                if abs.is_dir() {
                    crate::factory::directory_url(&abs)
                } else {
                    crate::factory::file_url(&abs)
                }
            })
            .collect::<ClassLoaderResult<Vec<_>>>()?;
        Self::new(name, urls)
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    fn locate(&self, lookup_name: &str, resource_name: &str) -> Option<Resource> {
        if !is_contained_name(resource_name) {
            log::debug!("'{}' escapes the class path of '{}'", resource_name, self.name);
            return None;
        }
        self.entries
            .iter()
            .find_map(|e| e.locate(resource_name))
            .map(|url| Resource {
                name: lookup_name.to_string(),
                url,
                source: self.name.clone(),
            })
    }
}

impl ResourceSource for UrlClassPath {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_class(&self, class_name: &str) -> Option<Resource> {
        self.locate(class_name, &class_resource_name(class_name))
    }

    fn find_resource(&self, resource_name: &str) -> Option<Resource> {
        self.locate(resource_name, resource_name.trim_start_matches('/'))
    }
}

/// `a.b.C` → `a/b/C.class`
pub fn class_resource_name(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_class(root: &Path, class: &str, body: &[u8]) {
        let path = root.join(class_resource_name(class));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn write_jar(path: &Path, entries: &[&str]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for entry in entries {
            zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
            zip.write_all(b"x").unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn builds_from_paths() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "a.B", b"b");
        let jar = dir.path().join("x.jar");
        write_jar(&jar, &["c/D.class"]);

        let cp = UrlClassPath::from_paths("container", &[dir.path().to_path_buf(), jar]).unwrap();
        assert_eq!(cp.urls().len(), 2);
        assert!(cp.find_class("a.B").is_some());
        assert!(cp.find_class("c.D").is_some());
        assert!(UrlClassPath::from_paths("bad", &[dir.path().join("missing")]).is_err());
    }

    #[test]
    fn lookups_cannot_leave_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        std::fs::create_dir(&classes).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"s").unwrap();
        std::fs::write(classes.join("app.properties"), b"a").unwrap();

        let cp = UrlClassPath::new("plugin", vec![Url::from_directory_path(&classes).unwrap()]).unwrap();
        assert!(cp.find_resource("app.properties").is_some());
        assert!(cp.find_resource("/app.properties").is_some());
        assert!(cp.find_resource("../secret.txt").is_none());
        assert!(cp.find_resource("./../secret.txt").is_none());
        assert!(cp.find_resource("sub/../../secret.txt").is_none());
        assert!(cp.find_resource("..\\secret.txt").is_none());
        assert!(cp.find_resource("").is_none());
    }

    #[test]
    fn class_names_map_to_class_files() {
        assert_eq!(class_resource_name("mypackage.MyClass"), "mypackage/MyClass.class");
    }

    #[test]
    fn finds_classes_in_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "mypackage.MyClass", b"Hello");

        let cp = UrlClassPath::new("plugin", vec![Url::from_directory_path(dir.path()).unwrap()]).unwrap();
        let found = cp.find_class("mypackage.MyClass").unwrap();
        assert_eq!(found.source, "plugin");
        assert!(found.url.as_str().ends_with("mypackage/MyClass.class"));
        assert!(cp.find_class("mypackage.Other").is_none());
    }

    #[test]
    fn finds_classes_and_resources_in_jars() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(&jar, &["mypackage/MyClass.class", "META-INF/plugin.properties"]);

        let cp = UrlClassPath::new("plugin", vec![Url::from_file_path(&jar).unwrap()]).unwrap();
        let class = cp.find_class("mypackage.MyClass").unwrap();
        assert!(class.url.as_str().starts_with("jar:file:"));
        assert!(class.url.as_str().ends_with("!/mypackage/MyClass.class"));
        assert!(cp.find_resource("META-INF/plugin.properties").is_some());
        assert!(cp.find_resource("META-INF/missing.properties").is_none());
    }

    #[test]
    fn earlier_entries_win() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_class(first.path(), "a.B", b"1");
        write_class(second.path(), "a.B", b"2");

        let cp = UrlClassPath::new(
            "plugin",
            vec![
                Url::from_directory_path(first.path()).unwrap(),
                Url::from_directory_path(second.path()).unwrap(),
            ],
        )
        .unwrap();
        let found = cp.find_class("a.B").unwrap();
        let expected = Url::from_file_path(first.path().join("a/B.class")).unwrap();
        assert_eq!(found.url, expected);
    }

    #[test]
    fn unreadable_jar_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("broken.jar");
        std::fs::write(&jar, b"not a zip").unwrap();

        let cp = UrlClassPath::new("plugin", vec![Url::from_file_path(&jar).unwrap()]).unwrap();
        assert!(cp.find_class("a.B").is_none());
    }

    #[test]
    fn rejects_non_file_urls() {
        let url = Url::parse("https://example.com/lib.jar").unwrap();
        assert!(matches!(
            UrlClassPath::new("plugin", vec![url]),
            Err(ClassLoaderError::InvalidClassPath { .. })
        ));
    }
}
