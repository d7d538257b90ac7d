//! Export/block filtering across a plugin boundary.

use crate::descriptor::PluginDescriptor;

/// Decides whether a class or resource name is visible outside a plugin.
pub trait ClassLoaderFilter: Send + Sync {
    fn accepts(&self, name: &str) -> bool;
}

/// Filter driven by a [`PluginDescriptor`].
///
/// An exact blocked/exported name has precedence over a blocked/exported
/// prefix, which allows exporting single classes or subpackages out of a
/// blocked package. Names that are not exported are rejected.
#[derive(Debug, Clone)]
pub struct ModuleClassLoaderFilter {
    descriptor: PluginDescriptor,
}

impl ModuleClassLoaderFilter {
    pub fn new(descriptor: PluginDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn is_blocked_prefix(&self, name: &str) -> bool {
        has_listed_prefix(name, &self.descriptor.blocked_prefix_names)
    }

    fn is_blocked_class(&self, name: &str) -> bool {
        self.descriptor.blocked_prefix_names.iter().any(|b| b == name)
    }

    fn is_exported_class(&self, name: &str) -> bool {
        self.descriptor.exported_prefix_names.iter().any(|e| e == name)
    }

    fn is_exported_prefix(&self, name: &str) -> bool {
        has_listed_prefix(name, &self.descriptor.exported_prefix_names)
    }
}

impl ClassLoaderFilter for ModuleClassLoaderFilter {
    fn accepts(&self, name: &str) -> bool {
        (!self.is_blocked_class(name) && self.is_exported_class(name))
            || (!self.is_blocked_prefix(name) && self.is_exported_prefix(name))
    }
}

fn has_listed_prefix(name: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| name.starts_with(p.as_str()))
}
