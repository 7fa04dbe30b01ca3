//! Platform-registry abstraction used by `{Registry:...}` search paths.
//!
//! The resolver only needs three operations on a registry-shaped store, so
//! they live behind a trait. On platforms without a system registry the
//! default implementation returns nothing and registry search paths simply
//! yield zero candidates. Tests and embedders can supply a [`MapRegistry`].

use std::{collections::BTreeMap, fmt};

/// Root hive of a registry query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegistryRoot {
    CurrentUser,
    LocalMachine,
}

impl RegistryRoot {
    pub const ALL: [Self; 2] = [Self::CurrentUser, Self::LocalMachine];

    fn prefix(self) -> &'static str {
        match self {
            Self::CurrentUser => "hkcu",
            Self::LocalMachine => "hklm",
        }
    }
}

/// Minimal read-only registry surface.
pub trait Registry: Send + Sync + fmt::Debug {
    /// Names of the immediate subkeys of `path`, in stored order.
    fn subkey_names(&self, root: RegistryRoot, path: &str) -> Vec<String>;
    /// The default value of the key at `path`, if any.
    fn default_value(&self, root: RegistryRoot, path: &str) -> Option<String>;
    /// Whether the key at `path` exists.
    fn open(&self, root: RegistryRoot, path: &str) -> bool;
}

/// A registry with no keys; the default on every platform.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRegistry;

impl Registry for NoRegistry {
    fn subkey_names(&self, _root: RegistryRoot, _path: &str) -> Vec<String> {
        Vec::new()
    }

    fn default_value(&self, _root: RegistryRoot, _path: &str) -> Option<String> {
        None
    }

    fn open(&self, _root: RegistryRoot, _path: &str) -> bool {
        false
    }
}

/// An in-memory registry keyed by `root\path`, case-insensitive.
#[derive(Clone, Debug, Default)]
pub struct MapRegistry {
    /// Maps the normalized full path of a key to its default value (possibly
    /// empty for keys without one).
    keys: BTreeMap<String, Option<String>>,
}

impl MapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key, creating all ancestors.
    pub fn insert(&mut self, root: RegistryRoot, path: &str, value: Option<&str>) {
        let normalized = normalize(root, path);
        let mut ancestor = String::new();
        for component in normalized.split('\\') {
            if !ancestor.is_empty() {
                ancestor.push('\\');
            }
            ancestor.push_str(component);
            self.keys.entry(ancestor.clone()).or_insert(None);
        }
        self.keys.insert(normalized, value.map(str::to_string));
    }
}

impl Registry for MapRegistry {
    fn subkey_names(&self, root: RegistryRoot, path: &str) -> Vec<String> {
        let prefix = format!("{}\\", normalize(root, path));
        let mut names = Vec::new();
        for key in self.keys.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if !rest.contains('\\') && !names.contains(&rest.to_string()) {
                    names.push(rest.to_string());
                }
            }
        }
        names
    }

    fn default_value(&self, root: RegistryRoot, path: &str) -> Option<String> {
        self.keys.get(&normalize(root, path)).cloned().flatten()
    }

    fn open(&self, root: RegistryRoot, path: &str) -> bool {
        self.keys.contains_key(&normalize(root, path))
    }
}

fn normalize(root: RegistryRoot, path: &str) -> String {
    format!("{}\\{}", root.prefix(), path.trim_matches('\\').to_ascii_lowercase())
}
