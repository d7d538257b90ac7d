//! Resource sources: anything that can answer "do you have this class or
//! resource, and where is it?".

use crate::filter::ClassLoaderFilter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Kind of lookup being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LookupKind {
    Class,
    Resource,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKind::Class => f.write_str("class"),
            LookupKind::Resource => f.write_str("resource"),
        }
    }
}

/// A located class or resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Lookup name as requested (`a.b.C` or `a/b/c.txt`).
    pub name: String,
    /// Where the bytes live (`file:` or `jar:file:...!/entry`).
    pub url: Url,
    /// Name of the source that served the lookup.
    pub source: String,
}

/// A search path able to locate classes and resources.
pub trait ResourceSource: Send + Sync {
    fn name(&self) -> &str;

    fn find_class(&self, class_name: &str) -> Option<Resource>;

    fn find_resource(&self, resource_name: &str) -> Option<Resource>;

    fn find(&self, kind: LookupKind, name: &str) -> Option<Resource> {
        match kind {
            LookupKind::Class => self.find_class(name),
            LookupKind::Resource => self.find_resource(name),
        }
    }
}

/// A source that has nothing. Used as the root of a loader chain.
#[derive(Debug, Clone)]
pub struct EmptySource {
    name: String,
}

impl EmptySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for EmptySource {
    fn default() -> Self {
        Self::new("bootstrap")
    }
}

impl ResourceSource for EmptySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_class(&self, _class_name: &str) -> Option<Resource> {
        None
    }

    fn find_resource(&self, _resource_name: &str) -> Option<Resource> {
        None
    }
}

/// Exposes only the names a [`ClassLoaderFilter`] accepts.
///
/// This is the view one plugin gets of another: the wrapped loader resolves
/// normally, but anything outside the export list is reported as missing.
pub struct FilteringSource {
    inner: Arc<dyn ResourceSource>,
    filter: Arc<dyn ClassLoaderFilter>,
}

impl FilteringSource {
    pub fn new(inner: Arc<dyn ResourceSource>, filter: Arc<dyn ClassLoaderFilter>) -> Self {
        Self { inner, filter }
    }
}

impl ResourceSource for FilteringSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn find_class(&self, class_name: &str) -> Option<Resource> {
        if self.filter.accepts(class_name) {
            self.inner.find_class(class_name)
        } else {
            log::trace!("{}: class '{}' is not exported", self.inner.name(), class_name);
            None
        }
    }

    fn find_resource(&self, resource_name: &str) -> Option<Resource> {
        if self.filter.accepts(&resource_name.replace('/', ".")) {
            self.inner.find_resource(resource_name)
        } else {
            log::trace!("{}: resource '{}' is not exported", self.inner.name(), resource_name);
            None
        }
    }
}
