//! Configuration file handling.
//!
//! The config file is INI-like: `[section]` headers, `key = value` pairs,
//! indented continuation lines and `${...}` interpolation. Every section
//! inherits the keys of `[DEFAULT]`, which starts out holding the built-in
//! borg defaults from [`constants::DEFAULT_OPTIONS`].
//!
//! ```text
//! [backup.home]
//! archives = documents, photos
//! repositories = local
//!
//! [repository.local]
//! env.borg_repo = ~/backups/borg
//! env.borg_passcommand = pass show borg/local
//!
//! [archive.documents]
//! basedir = ~
//! include = Documents
//! exclude = Documents/tmp
//! ```

use std::path::Path;
use tracing::{debug, warn};

use crate::core::constants;
use crate::error::{ConfigError, Result};

/// Name of the section inherited by every other section.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Interpolation gives up after this many nested references.
const MAX_INTERPOLATION_DEPTH: usize = 10;

/// Keys of one section, in the order they were first seen.
#[derive(Debug, Clone, Default)]
struct Section {
    entries: Vec<(String, String)>,
}

impl Section {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: String) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

/// Parsed configuration.
#[derive(Debug, Clone)]
pub struct Config {
    defaults: Section,
    sections: Vec<(String, Section)>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Configuration holding only the built-in defaults.
    pub fn new() -> Self {
        let mut config = Self::empty();
        for (key, value) in constants::DEFAULT_OPTIONS {
            config.defaults.set(key, value.to_string());
        }
        config
    }

    /// Configuration with no keys at all, not even the built-in defaults.
    pub fn empty() -> Self {
        Self {
            defaults: Section::default(),
            sections: Vec::new(),
        }
    }

    /// Built-in defaults overlaid with the file at `path`.
    ///
    /// A missing file is not an error: the defaults alone are returned and a
    /// warning is logged.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadFile` if the file exists but cannot be read,
    /// or `ConfigError::Parse` if it is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::new();
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults only");
            return Ok(config);
        }

        debug!(path = %path.display(), "loading config");
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        config.read_str(&contents, &path.display().to_string())?;
        debug!(sections = config.sections.len(), "config loaded");
        Ok(config)
    }

    /// Parse `text` on top of the current contents.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on a key outside any section or a line
    /// that is neither a header, a comment, nor a `key = value` pair.
    pub fn read_str(&mut self, text: &str, origin: &str) -> Result<()> {
        let mut current: Option<String> = None;
        let mut last_key: Option<String> = None;
        // Blank lines seen since the last value line; kept only if the value
        // continues after them.
        let mut blanks = 0;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                blanks += 1;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indented = raw.starts_with(|c: char| c.is_whitespace());
            if indented {
                if let (Some(section), Some(key)) = (&current, &last_key) {
                    let target = self.section_mut(section);
                    let mut value = target.get(key).unwrap_or_default().to_string();
                    value.push_str(&"\n".repeat(blanks + 1));
                    value.push_str(trimmed);
                    target.set(key, value);
                    blanks = 0;
                    continue;
                }
            }
            blanks = 0;

            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                let name = trimmed[1..trimmed.len() - 1].trim().to_string();
                self.section_mut(&name);
                current = Some(name);
                last_key = None;
                continue;
            }

            let Some(section) = &current else {
                return Err(parse_error(origin, line_no, "key outside of any section"));
            };
            let Some(split) = trimmed.find(['=', ':']) else {
                return Err(parse_error(origin, line_no, "expected `key = value`"));
            };

            let key = trimmed[..split].trim().to_lowercase();
            if key.is_empty() {
                return Err(parse_error(origin, line_no, "empty key"));
            }
            let value = trimmed[split + 1..].trim().to_string();
            self.section_mut(section).set(&key, value);
            last_key = Some(key);
        }

        Ok(())
    }

    fn section_mut(&mut self, name: &str) -> &mut Section {
        if name == DEFAULT_SECTION {
            return &mut self.defaults;
        }
        let position = match self.sections.iter().position(|(n, _)| n == name) {
            Some(position) => position,
            None => {
                self.sections.push((name.to_string(), Section::default()));
                self.sections.len() - 1
            }
        };
        &mut self.sections[position].1
    }

    fn section(&self, name: &str) -> Option<&Section> {
        if name == DEFAULT_SECTION {
            return Some(&self.defaults);
        }
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, section)| section)
    }

    /// Whether a (non-default) section exists.
    pub fn has_section(&self, name: &str) -> bool {
        name != DEFAULT_SECTION && self.section(name).is_some()
    }

    /// Fail unless `name` exists.
    pub fn require_section(&self, name: &str) -> Result<()> {
        if self.has_section(name) {
            Ok(())
        } else {
            Err(ConfigError::MissingSection(name.to_string()).into())
        }
    }

    /// Set a key in a section, creating the section if needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.section_mut(section)
            .set(&key.to_lowercase(), value.into());
    }

    /// Uninterpolated value of `key` in `section`, falling back to defaults.
    fn raw(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)
            .and_then(|s| s.get(key))
            .or_else(|| self.defaults.get(key))
    }

    /// Interpolated value of `key` in `section`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSection` if the section does not exist
    /// and `ConfigError::Interpolation` if a `${...}` reference is broken.
    pub fn get(&self, section: &str, key: &str) -> Result<Option<String>> {
        if self.section(section).is_none() {
            return Err(ConfigError::MissingSection(section.to_string()).into());
        }
        let key = key.to_lowercase();
        match self.raw(section, &key) {
            Some(raw) => Ok(Some(self.interpolate(section, &key, raw, 0)?)),
            None => Ok(None),
        }
    }

    /// Like [`Config::get`] but a missing or blank key is an error.
    pub fn require(&self, section: &str, key: &str) -> Result<String> {
        match self.get(section, key)? {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::MissingKey {
                section: section.to_string(),
                key: key.to_string(),
            }
            .into()),
        }
    }

    /// Boolean value using the usual INI spellings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBoolean` for anything other than
    /// `1/yes/true/on` or `0/no/false/off`.
    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        let Some(value) = self.get(section, key)? else {
            return Ok(None);
        };
        parse_bool(&value).map(Some).ok_or_else(|| {
            ConfigError::InvalidBoolean {
                section: section.to_string(),
                key: key.to_string(),
                value,
            }
            .into()
        })
    }

    /// List value split on newlines and commas, blanks dropped.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyList` when the list is empty and
    /// `allow_empty` is false.
    pub fn get_list(&self, section: &str, key: &str, allow_empty: bool) -> Result<Vec<String>> {
        let value = self.get(section, key)?.unwrap_or_default();
        let items: Vec<String> = value
            .lines()
            .flat_map(|line| line.split(','))
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();

        if items.is_empty() && !allow_empty {
            return Err(ConfigError::EmptyList {
                section: section.to_string(),
                key: key.to_string(),
            }
            .into());
        }
        Ok(items)
    }

    /// Keys visible from `section` that start with `prefix`, as
    /// `(key, suffix)` pairs.
    ///
    /// Default keys come first, then keys only present in the section, each
    /// key once, in the order it was first seen.
    pub fn keys_with_prefix(&self, section: &str, prefix: &str) -> Vec<(String, String)> {
        let own = self.section(section).into_iter().flat_map(Section::keys);
        let mut seen: Vec<(String, String)> = Vec::new();
        for key in self.defaults.keys().chain(own) {
            if let Some(suffix) = key.strip_prefix(prefix) {
                if !seen.iter().any(|(k, _)| k == key) {
                    seen.push((key.to_string(), suffix.to_string()));
                }
            }
        }
        seen
    }

    fn interpolate(&self, section: &str, key: &str, raw: &str, depth: usize) -> Result<String> {
        let fail = |reason: String| -> crate::error::Error {
            ConfigError::Interpolation {
                section: section.to_string(),
                key: key.to_string(),
                reason,
            }
            .into()
        };

        if depth > MAX_INTERPOLATION_DEPTH {
            return Err(fail("too many nested references".to_string()));
        }

        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
            } else if let Some(body) = after.strip_prefix('{') {
                let end = body
                    .find('}')
                    .ok_or_else(|| fail("unterminated `${`".to_string()))?;
                let reference = &body[..end];
                let (target_section, target_key) = match reference.split_once(':') {
                    Some((s, k)) => (s.to_string(), k.to_lowercase()),
                    None => (section.to_string(), reference.to_lowercase()),
                };
                let value = self
                    .raw(&target_section, &target_key)
                    .filter(|_| self.section(&target_section).is_some())
                    .ok_or_else(|| fail(format!("`{}` is not defined", reference)))?;
                out.push_str(&self.interpolate(&target_section, &target_key, value, depth + 1)?);
                rest = &body[end + 1..];
            } else {
                return Err(fail("`$` must be followed by `$` or `{`".to_string()));
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Parse an INI boolean.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn parse_error(origin: &str, line: usize, reason: &str) -> crate::error::Error {
    ConfigError::Parse {
        path: origin.to_string(),
        line,
        reason: reason.to_string(),
    }
    .into()
}
