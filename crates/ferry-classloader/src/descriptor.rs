//! Plugin descriptor: the names a plugin exports to, and blocks from,
//! other plugins.

use serde::{Deserialize, Serialize};

/// Export/block lists of a plugin.
///
/// Entries are either exact class names (`java.lang.Object`) or prefixes
/// (`java.lang`). An exact match always wins over a prefix match, so a class
/// can be exported out of an otherwise blocked package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub exported_prefix_names: Vec<String>,
    #[serde(default)]
    pub blocked_prefix_names: Vec<String>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_exported<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exported_prefix_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_blocked<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_prefix_names = names.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let json = r#"{ "name": "ftp", "exportedPrefixNames": ["org.ftp.api"] }"#;
        let d: PluginDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.name, "ftp");
        assert_eq!(d.exported_prefix_names, vec!["org.ftp.api".to_string()]);
        assert!(d.blocked_prefix_names.is_empty());
    }
}
