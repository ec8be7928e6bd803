//! Environment mappings passed to child processes.
//!
//! syborg never mutates its own process environment. Each subprocess gets an
//! explicit [`Environment`] overlay that is applied on top of the inherited
//! environment when the child is spawned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// An immutable set of environment variable overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// An empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from key-value pairs; later pairs win.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Copy with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut vars = self.vars.clone();
        vars.insert(key.into(), value.into());
        Self { vars }
    }

    /// Copy without `key`.
    pub fn without(&self, key: &str) -> Self {
        let mut vars = self.vars.clone();
        vars.remove(key);
        Self { vars }
    }

    /// Copy with every variable of `overlay` applied on top.
    pub fn merged(&self, overlay: &Environment) -> Self {
        let mut vars = self.vars.clone();
        vars.extend(
            overlay
                .vars
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Self { vars }
    }

    /// Run `f` with `overlay` merged on top of this environment.
    ///
    /// The merged mapping only exists for the duration of `f`; `self` is
    /// untouched, so the previous mapping is what callers see afterwards.
    pub fn scoped<R>(&self, overlay: &Environment, f: impl FnOnce(&Environment) -> R) -> R {
        let merged = self.merged(overlay);
        f(&merged)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Value of `key`, treating blank values as unset.
    pub fn get_nonempty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Expand a leading `~` or `~/` to the user's home directory.
///
/// Anything else, including `~user`, is returned unchanged.
pub fn expand_home(value: &str) -> String {
    expand_home_with(value, dirs::home_dir().as_deref())
}

fn expand_home_with(value: &str, home: Option<&Path>) -> String {
    let Some(home) = home else {
        return value.to_string();
    };
    if value == "~" {
        return home.display().to_string();
    }
    match value.strip_prefix("~/") {
        Some(rest) => PathBuf::from(home).join(rest).display().to_string(),
        None => value.to_string(),
    }
}
