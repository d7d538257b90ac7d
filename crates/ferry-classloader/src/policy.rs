//! Loader override decision table.
//!
//! A [`LoaderOverride`] holds three disjoint name sets. For every lookup the
//! first set containing the name picks the [`LookupPolicy`]; names in no set
//! fall back to child-first.

use crate::error::{ClassLoaderError, ClassLoaderResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Where a lookup may be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The plugin-local search path.
    Child,
    /// The host / shared loader.
    Parent,
}

/// Resolution order for one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LookupPolicy {
    ChildOnly,
    ParentOnly,
    ParentFirst,
    ChildFirst,
}

impl LookupPolicy {
    /// Sources to consult, in order. A miss on every listed source is a
    /// resolution failure; unlisted sources are never consulted.
    pub fn search_order(self) -> &'static [Origin] {
        match self {
            LookupPolicy::ChildOnly => &[Origin::Child],
            LookupPolicy::ParentOnly => &[Origin::Parent],
            LookupPolicy::ParentFirst => &[Origin::Parent, Origin::Child],
            LookupPolicy::ChildFirst => &[Origin::Child, Origin::Parent],
        }
    }
}

impl fmt::Display for LookupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LookupPolicy::ChildOnly => "child-only",
            LookupPolicy::ParentOnly => "parent-only",
            LookupPolicy::ParentFirst => "parent-first",
            LookupPolicy::ChildFirst => "child-first",
        };
        f.write_str(s)
    }
}

/// Serialized form, validated into a [`LoaderOverride`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLoaderOverride {
    #[serde(default)]
    parent_only: BTreeSet<String>,
    #[serde(default)]
    parent_first: BTreeSet<String>,
    #[serde(default)]
    child_only: BTreeSet<String>,
}

impl TryFrom<RawLoaderOverride> for LoaderOverride {
    type Error = ClassLoaderError;

    fn try_from(raw: RawLoaderOverride) -> Result<Self, Self::Error> {
        LoaderOverride::new(raw.parent_only, raw.parent_first, raw.child_only)
    }
}

/// Per-package override of the default child-first lookup order.
///
/// Entries are package (or class) names. A lookup name matches an entry when
/// it is equal to it or nested under it: `mypackage` matches
/// `mypackage.MyClass` and the resource `mypackage/data.txt`, but not
/// `mypackageextra.Foo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawLoaderOverride")]
pub struct LoaderOverride {
    parent_only: BTreeSet<String>,
    parent_first: BTreeSet<String>,
    child_only: BTreeSet<String>,
}

impl LoaderOverride {
    pub fn new<I1, I2, I3>(parent_only: I1, parent_first: I2, child_only: I3) -> ClassLoaderResult<Self>
    where
        I1: IntoIterator,
        I1::Item: Into<String>,
        I2: IntoIterator,
        I2::Item: Into<String>,
        I3: IntoIterator,
        I3::Item: Into<String>,
    {
        let parent_only: BTreeSet<String> = normalize_all(parent_only);
        let parent_first: BTreeSet<String> = normalize_all(parent_first);
        let child_only: BTreeSet<String> = normalize_all(child_only);

        if let Some(dup) = parent_only
            .intersection(&parent_first)
            .chain(parent_only.intersection(&child_only))
            .chain(parent_first.intersection(&child_only))
            .next()
        {
            return Err(ClassLoaderError::InvalidOverride(dup.clone()));
        }

        Ok(Self {
            parent_only,
            parent_first,
            child_only,
        })
    }

    pub fn parent_only(&self) -> &BTreeSet<String> {
        &self.parent_only
    }

    pub fn parent_first(&self) -> &BTreeSet<String> {
        &self.parent_first
    }

    pub fn child_only(&self) -> &BTreeSet<String> {
        &self.child_only
    }

    /// Look up the policy for a class name (`a.b.C`) or a resource name
    /// (`a/b/c.txt`).
    pub fn policy_for(&self, name: &str) -> LookupPolicy {
        let dotted = name.replace('/', ".");
        let table: [(&BTreeSet<String>, LookupPolicy); 3] = [
            (&self.child_only, LookupPolicy::ChildOnly),
            (&self.parent_only, LookupPolicy::ParentOnly),
            (&self.parent_first, LookupPolicy::ParentFirst),
        ];
        table
            .iter()
            .find(|(set, _)| set.iter().any(|entry| is_nested(&dotted, entry)))
            .map(|(_, policy)| *policy)
            .unwrap_or(LookupPolicy::ChildFirst)
    }
}

fn normalize_all<I>(names: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    names
        .into_iter()
        .map(|n| {
            let n: String = n.into();
            n.replace('/', ".").trim_end_matches('.').to_string()
        })
        .filter(|n| !n.is_empty())
        .collect()
}

fn is_nested(name: &str, entry: &str) -> bool {
    name == entry
        || (name.len() > entry.len()
            && name.starts_with(entry)
            && name.as_bytes()[entry.len()] == b'.')
}
