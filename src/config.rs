//! Runtime configuration, loaded from a camelCase JSON document.
//!
//! ```json
//! {
//!   "logging": { "level": "debug", "json": false },
//!   "local": { "baseDir": "/srv/files", "defaultEncoding": "UTF-8" },
//!   "ftp": {
//!     "connection": { "host": "ftp.example.com", "username": "ann", "password": "..." },
//!     "pool": { "maxConnections": 0, "idleTimeoutSec": 300 }
//!   },
//!   "plugins": [
//!     { "root": "plugins/http", "loaderOverride": { "parentFirst": ["org.example"] } }
//!   ]
//! }
//! ```

use ferry_classloader::{
    ClassLoaderResult, EmptySource, FineGrainedControlClassLoader, LoaderOverride,
    ModuleClassLoaderFactory, PluginDescriptor, ResourceSource, UrlClassPath,
};
use ferry_file::LocalFileSystem;
use ferry_ftp::{FtpConnectionConfig, FtpConnector, PoolConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no FTP connection configured")]
    FtpNotConfigured,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FerryConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub ftp: Option<FtpConfig>,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Filter directive used when `FERRY_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default)]
    pub default_encoding: Option<String>,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            default_encoding: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConfig {
    pub connection: FtpConnectionConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub default_encoding: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub descriptor: PluginDescriptor,
    #[serde(default)]
    pub loader_override: Option<LoaderOverride>,
    /// Directories and jars searched on the container side.
    #[serde(default)]
    pub parent_class_path: Vec<PathBuf>,
}

impl FerryConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `load(path)` when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn local_file_system(&self) -> LocalFileSystem {
        LocalFileSystem::new(&self.local.base_dir).with_encoding(self.local.default_encoding.clone())
    }

    /// Pooled FTP connector. Must be called inside a tokio runtime.
    pub fn ftp_connector(&self) -> Result<FtpConnector, ConfigError> {
        let ftp = self.ftp.as_ref().ok_or(ConfigError::FtpNotConfigured)?;
        Ok(FtpConnector::connect(
            "ftp",
            ftp.connection.clone(),
            ftp.pool.clone(),
            ftp.default_encoding.clone(),
        ))
    }

    /// The configured plugin at `root`, or a bare entry for it.
    pub fn plugin(&self, root: &Path) -> PluginConfig {
        let wanted = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        self.plugins
            .iter()
            .find(|p| p.root.canonicalize().unwrap_or_else(|_| p.root.clone()) == wanted)
            .cloned()
            .unwrap_or_else(|| PluginConfig {
                root: root.to_path_buf(),
                descriptor: PluginDescriptor::default(),
                loader_override: None,
                parent_class_path: Vec::new(),
            })
    }
}

impl PluginConfig {
    pub fn class_loader(&self) -> ClassLoaderResult<FineGrainedControlClassLoader> {
        let parent: Arc<dyn ResourceSource> = if self.parent_class_path.is_empty() {
            Arc::new(EmptySource::new("container"))
        } else {
            Arc::new(UrlClassPath::from_paths("container", &self.parent_class_path)?)
        };
        ModuleClassLoaderFactory::new().create(
            &self.root,
            &self.descriptor,
            parent,
            self.loader_override.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_classloader::LookupPolicy;

    #[test]
    fn empty_document_uses_defaults() {
        let config: FerryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(config.local.base_dir, PathBuf::from("."));
        assert!(config.ftp.is_none());
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn parses_full_document() {
        let config: FerryConfig = serde_json::from_str(
            r#"{
                "logging": { "level": "debug", "json": true },
                "local": { "baseDir": "/srv", "defaultEncoding": "UTF-8" },
                "ftp": {
                    "connection": { "host": "ftp.example.com", "port": 2121 },
                    "pool": { "maxConnections": 4 }
                },
                "plugins": [{
                    "root": "plugins/http",
                    "descriptor": { "name": "http", "exportedPrefixNames": ["org.example.api"] },
                    "loaderOverride": { "childOnly": ["org.example.impl"] }
                }]
            }"#,
        )
        .unwrap();

        assert!(config.logging.json);
        assert_eq!(config.local.default_encoding.as_deref(), Some("UTF-8"));
        let ftp = config.ftp.unwrap();
        assert_eq!(ftp.connection.port, 2121);
        assert_eq!(ftp.pool.max_connections, 4);

        let plugin = &config.plugins[0];
        assert_eq!(plugin.descriptor.name, "http");
        let over = plugin.loader_override.as_ref().unwrap();
        assert_eq!(over.policy_for("org.example.impl.Thing"), LookupPolicy::ChildOnly);
    }

    #[test]
    fn load_reports_offending_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferry.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FerryConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("ferry.json"));

        let err = FerryConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn unknown_plugin_gets_bare_entry() {
        let dir = tempfile::tempdir().unwrap();
        let config = FerryConfig::default();
        let plugin = config.plugin(dir.path());
        assert!(plugin.loader_override.is_none());
        assert!(plugin.class_loader().is_ok());
    }

    #[test]
    fn ftp_connector_requires_configuration() {
        let err = FerryConfig::default().ftp_connector().unwrap_err();
        assert!(matches!(err, ConfigError::FtpNotConfigured));
    }
}
