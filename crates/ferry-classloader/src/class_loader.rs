//! Class loader with per-lookup control over parent/child ordering.

use crate::error::{ClassLoaderError, ClassLoaderResult};
use crate::policy::{LoaderOverride, LookupPolicy, Origin};
use crate::source::{LookupKind, Resource, ResourceSource};
use std::sync::Arc;

/// Resolves each lookup from the plugin-local search path (`child`) and/or
/// the `parent`, in the order chosen by the [`LoaderOverride`].
///
/// Without an override every lookup is child-first, falling back to the
/// parent on a miss. A child-only lookup never reaches the parent and a
/// parent-only lookup never reaches the child, even when the other side has
/// the name.
pub struct FineGrainedControlClassLoader {
    name: String,
    child: Arc<dyn ResourceSource>,
    parent: Arc<dyn ResourceSource>,
    loader_override: Option<LoaderOverride>,
}

impl FineGrainedControlClassLoader {
    pub fn new(
        name: impl Into<String>,
        child: Arc<dyn ResourceSource>,
        parent: Arc<dyn ResourceSource>,
        loader_override: Option<LoaderOverride>,
    ) -> Self {
        Self {
            name: name.into(),
            child,
            parent,
            loader_override,
        }
    }

    pub fn loader_override(&self) -> Option<&LoaderOverride> {
        self.loader_override.as_ref()
    }

    pub fn policy_for(&self, name: &str) -> LookupPolicy {
        self.loader_override
            .as_ref()
            .map(|o| o.policy_for(name))
            .unwrap_or(LookupPolicy::ChildFirst)
    }

    pub fn load_class(&self, class_name: &str) -> ClassLoaderResult<Resource> {
        self.resolve(LookupKind::Class, class_name)
    }

    pub fn get_resource(&self, resource_name: &str) -> ClassLoaderResult<Resource> {
        self.resolve(LookupKind::Resource, resource_name)
    }

    fn source(&self, origin: Origin) -> &dyn ResourceSource {
        match origin {
            Origin::Child => self.child.as_ref(),
            Origin::Parent => self.parent.as_ref(),
        }
    }

    fn resolve(&self, kind: LookupKind, name: &str) -> ClassLoaderResult<Resource> {
        let policy = self.policy_for(name);
        for origin in policy.search_order() {
            if let Some(found) = self.source(*origin).find(kind, name) {
                log::trace!(
                    "{}: {} '{}' served by '{}' ({})",
                    self.name,
                    kind,
                    name,
                    found.source,
                    policy
                );
                return Ok(found);
            }
        }
        Err(ClassLoaderError::ClassResolutionFailed {
            kind,
            name: name.to_string(),
            loader: self.name.clone(),
            policy,
        })
    }
}

impl ResourceSource for FineGrainedControlClassLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_class(&self, class_name: &str) -> Option<Resource> {
        self.load_class(class_name).ok()
    }

    fn find_resource(&self, resource_name: &str) -> Option<Resource> {
        self.get_resource(resource_name).ok()
    }
}
