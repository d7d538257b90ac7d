//! Builds a plugin class loader from its on-disk layout.
//!
//! ```text
//! <plugin-root>/
//!   classes/      exploded classes and resources
//!   lib/*.jar     bundled libraries
//! ```

use crate::class_loader::FineGrainedControlClassLoader;
use crate::class_path::UrlClassPath;
use crate::descriptor::PluginDescriptor;
use crate::error::{ClassLoaderError, ClassLoaderResult};
use crate::policy::LoaderOverride;
use crate::source::ResourceSource;
use std::path::Path;
use std::sync::Arc;
use url::Url;

pub const CLASSES_DIR: &str = "classes";
pub const LIB_DIR: &str = "lib";
pub const JAR_PATTERN: &str = "*.jar";

#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleClassLoaderFactory;

impl ModuleClassLoaderFactory {
    pub fn new() -> Self {
        Self
    }

    /// Class path of a plugin: `classes/` first, then every jar directly
    /// under `lib/`. Missing directories contribute nothing.
    pub fn classpath_urls(&self, plugin_root: &Path) -> ClassLoaderResult<Vec<Url>> {
        let root = plugin_root.canonicalize().unwrap_or_else(|_| plugin_root.to_path_buf());
        let mut urls = Vec::new();

        let classes = root.join(CLASSES_DIR);
        if classes.is_dir() {
            urls.push(directory_url(&classes)?);
        }

        let lib = root.join(LIB_DIR);
        if lib.is_dir() {
            let pattern = glob::Pattern::new(JAR_PATTERN).map_err(|e| ClassLoaderError::InvalidClassPath {
                path: lib.clone(),
                reason: e.to_string(),
            })?;
            let entries = std::fs::read_dir(&lib).map_err(|source| ClassLoaderError::Io {
                path: lib.clone(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| ClassLoaderError::Io {
                    path: lib.clone(),
                    source,
                })?;
                let path = entry.path();
                let matches = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| pattern.matches(n))
                    .unwrap_or(false);
                if matches && path.is_file() {
                    urls.push(file_url(&path)?);
                }
            }
        }

        Ok(urls)
    }

    /// Class loader for the plugin at `plugin_root`, delegating to `parent`
    /// according to `loader_override`.
    pub fn create(
        &self,
        plugin_root: &Path,
        descriptor: &PluginDescriptor,
        parent: Arc<dyn ResourceSource>,
        loader_override: Option<LoaderOverride>,
    ) -> ClassLoaderResult<FineGrainedControlClassLoader> {
        let urls = self.classpath_urls(plugin_root)?;
        let name = if descriptor.name.is_empty() {
            plugin_root.display().to_string()
        } else {
            descriptor.name.clone()
        };

        log::debug!("loading plugin '{}' from {}", name, plugin_root.display());
        for url in &urls {
            log::debug!("  {}", url);
        }
        if urls.is_empty() {
            log::debug!("plugin '{}' has no classes/ or lib/*.jar entries", name);
        }

        let local = UrlClassPath::new(name.clone(), urls)?;
        Ok(FineGrainedControlClassLoader::new(
            name,
            Arc::new(local),
            parent,
            loader_override,
        ))
    }
}

pub(crate) fn directory_url(path: &Path) -> ClassLoaderResult<Url> {
    Url::from_directory_path(path).map_err(|_| ClassLoaderError::InvalidClassPath {
        path: path.to_path_buf(),
        reason: "not an absolute path".into(),
    })
}

pub(crate) fn file_url(path: &Path) -> ClassLoaderResult<Url> {
    Url::from_file_path(path).map_err(|_| ClassLoaderError::InvalidClassPath {
        path: path.to_path_buf(),
        reason: "not an absolute path".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::EmptySource;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn classes_dir_comes_first_then_jars() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("classes")).unwrap();
        touch(&dir.path().join("lib/a.jar"));
        touch(&dir.path().join("lib/b.jar"));
        touch(&dir.path().join("lib/readme.txt"));

        let urls = ModuleClassLoaderFactory::new().classpath_urls(dir.path()).unwrap();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].as_str().ends_with("/classes/"));

        let mut jars: Vec<&str> = urls[1..].iter().map(|u| u.as_str()).collect();
        jars.sort();
        assert!(jars[0].ends_with("/lib/a.jar"));
        assert!(jars[1].ends_with("/lib/b.jar"));
    }

    #[test]
    fn missing_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ModuleClassLoaderFactory::new();
        assert!(factory.classpath_urls(dir.path()).unwrap().is_empty());

        touch(&dir.path().join("lib/only.jar"));
        let urls = factory.classpath_urls(dir.path()).unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].as_str().ends_with("/lib/only.jar"));
    }

    #[test]
    fn nested_jars_are_not_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("lib/nested/inner.jar"));
        let urls = ModuleClassLoaderFactory::new().classpath_urls(dir.path()).unwrap();
        assert!(urls.is_empty());
    }

    #[test]
    fn created_loader_serves_plugin_classes() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("classes/mypackage/MyClass.class"));

        let loader = ModuleClassLoaderFactory::new()
            .create(
                dir.path(),
                &PluginDescriptor::new("hello"),
                Arc::new(EmptySource::default()),
                None,
            )
            .unwrap();
        let found = loader.load_class("mypackage.MyClass").unwrap();
        assert_eq!(found.source, "hello");
        assert!(loader.load_class("mypackage.Missing").is_err());
    }
}
