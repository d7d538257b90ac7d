//! # ferry-classloader — plugin class isolation
//!
//! Decides which class and resource names a plugin may see, and from where.
//!
//! Architecture:
//! - `descriptor` — plugin export/block lists and loader overrides
//! - `filter` — export/block filter applied at a plugin boundary
//! - `policy` — override decision table (child-only, parent-only, parent-first, child-first)
//! - `source` — the `ResourceSource` abstraction and filtering wrapper
//! - `class_path` — directory + jar search path
//! - `class_loader` — fine-grained parent/child lookup
//! - `factory` — assembles a plugin's class path from `classes/` and `lib/*.jar`
//! - `error` — class loading error type

pub mod class_loader;
pub mod class_path;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod filter;
pub mod policy;
pub mod source;

pub use class_loader::FineGrainedControlClassLoader;
pub use class_path::UrlClassPath;
pub use descriptor::PluginDescriptor;
pub use error::{ClassLoaderError, ClassLoaderResult};
pub use factory::ModuleClassLoaderFactory;
pub use filter::{ClassLoaderFilter, ModuleClassLoaderFilter};
pub use policy::{LoaderOverride, LookupPolicy, Origin};
pub use source::{EmptySource, FilteringSource, LookupKind, Resource, ResourceSource};
