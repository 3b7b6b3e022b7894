//! Tags: normalized `key=value` labels attached to incidents.
//!
//! A [`Tag`] is an immutable key/value pair. Keys are restricted to lowercase
//! ASCII letters, digits and underscores; values are free text. The canonical
//! representation is `"{key}={value}"`, and parsing splits on the first `=`.
//!
//! Tags are shared between incidents. The [`TagRegistry`] interns them so that
//! at most one instance exists per `(key, value)` pair.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{IncidentError, Result};

/// Separator between key and value in the canonical form.
pub const TAG_DELIMITER: char = '=';

static TAG_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").unwrap_or_else(|_| unreachable!()));

/// An immutable key/value label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    key: String,
    value: String,
}

impl Tag {
    /// Creates a tag after validating both parts.
    ///
    /// # Errors
    ///
    /// Returns `IncidentError::InvalidTag` if the key contains anything other
    /// than lowercase letters, digits or underscores, or if the value is empty.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let value = value.into();

        if !TAG_KEY_REGEX.is_match(&key) {
            return Err(IncidentError::InvalidTag {
                tag: format!("{key}{TAG_DELIMITER}{value}"),
                reason: "key must consist of lowercase letters, numbers and underscores"
                    .to_string(),
            });
        }
        if value.is_empty() {
            return Err(IncidentError::InvalidTag {
                tag: format!("{key}{TAG_DELIMITER}"),
                reason: "value cannot be empty".to_string(),
            });
        }

        Ok(Self { key, value })
    }

    /// Parses a tag from its canonical `key=value` form.
    ///
    /// # Errors
    ///
    /// Returns `IncidentError::InvalidTag` if the delimiter is missing or
    /// either half fails validation.
    pub fn parse(s: &str) -> Result<Self> {
        let (key, value) = s
            .split_once(TAG_DELIMITER)
            .ok_or_else(|| IncidentError::InvalidTag {
                tag: s.to_string(),
                reason: format!("tags must follow the format key{TAG_DELIMITER}value"),
            })?;
        Self::new(key, value)
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{TAG_DELIMITER}{}", self.key, self.value)
    }
}

impl FromStr for Tag {
    type Err = IncidentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Groups tags by key.
///
/// Tag requirements are evaluated per key group: an incident satisfies a
/// group when it carries any of the group's values, and it must satisfy
/// every group.
#[must_use]
pub fn group_by_key<'a, I>(tags: I) -> BTreeMap<String, BTreeSet<String>>
where
    I: IntoIterator<Item = &'a Tag>,
{
    let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for tag in tags {
        groups
            .entry(tag.key.clone())
            .or_default()
            .insert(tag.value.clone());
    }
    groups
}

/// Interning table guaranteeing one shared [`Tag`] per `(key, value)`.
#[derive(Debug, Default)]
pub struct TagRegistry {
    tags: RwLock<HashSet<Arc<Tag>>>,
}

impl TagRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared instance for `tag`, storing it on first sight.
    pub fn intern(&self, tag: Tag) -> Arc<Tag> {
        if let Some(existing) = self.tags.read().get(&tag) {
            return Arc::clone(existing);
        }

        let mut tags = self.tags.write();
        if let Some(existing) = tags.get(&tag) {
            return Arc::clone(existing);
        }
        debug!(tag = %tag, "interned new tag");
        let shared = Arc::new(tag);
        tags.insert(Arc::clone(&shared));
        shared
    }

    /// Parses and interns a canonical tag string.
    pub fn intern_str(&self, s: &str) -> Result<Arc<Tag>> {
        Ok(self.intern(Tag::parse(s)?))
    }

    /// Returns the number of distinct tags stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.read().len()
    }

    /// Returns true if no tags have been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.read().is_empty()
    }
}
