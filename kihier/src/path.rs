//! Hierarchical entity paths
//!
//! KiCad addresses every sheet instance, symbol instance and footprint with
//! a `/`-separated list of UUIDs, much like a filesystem path:
//!
//! ```text
//! /<root sheet>/<sheet>/<sheet>/<symbol>
//! ```
//!
//! Two entities are the same instance exactly when their paths are equal.
//! The root sheet instance is the single-element path holding the root
//! schematic's UUID; every other path extends it.

use std::fmt;
use std::ops::{Add, BitAnd, Bound, RangeBounds};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid path component '{value}': {reason}")]
    InvalidComponent { value: String, reason: String },
}

/// One UUID segment of an [`EntityPath`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityPathComponent(Uuid);

impl EntityPathComponent {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Fresh random component for items created by edit commands
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for EntityPathComponent {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for EntityPathComponent {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| PathError::InvalidComponent {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for EntityPathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl Serialize for EntityPathComponent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityPathComponent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Ordered, immutable sequence of UUID components
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityPath {
    components: Vec<EntityPathComponent>,
}

impl EntityPath {
    pub fn new(components: Vec<EntityPathComponent>) -> Self {
        Self { components }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_component(component: EntityPathComponent) -> Self {
        Self {
            components: vec![component],
        }
    }

    /// Build from the host's native path representation
    pub fn from_native(items: &[Uuid]) -> Self {
        Self {
            components: items.iter().copied().map(EntityPathComponent).collect(),
        }
    }

    pub fn components(&self) -> &[EntityPathComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<EntityPathComponent> {
        self.components.get(index).copied()
    }

    pub fn first(&self) -> Option<EntityPathComponent> {
        self.components.first().copied()
    }

    pub fn last(&self) -> Option<EntityPathComponent> {
        self.components.last().copied()
    }

    /// Path with the last component removed; `None` for the empty path
    pub fn parent(&self) -> Option<EntityPath> {
        if self.is_empty() {
            return None;
        }
        Some(self.slice(..self.len() - 1))
    }

    /// Sub-path over `range`, clamped to the path length
    pub fn slice(&self, range: impl RangeBounds<usize>) -> EntityPath {
        let len = self.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s + 1,
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e + 1,
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .min(len)
        .max(start);
        EntityPath::new(self.components[start..end].to_vec())
    }

    pub fn join(&self, other: &EntityPath) -> EntityPath {
        let mut components = Vec::with_capacity(self.len() + other.len());
        components.extend_from_slice(&self.components);
        components.extend_from_slice(&other.components);
        EntityPath::new(components)
    }

    pub fn child(&self, component: EntityPathComponent) -> EntityPath {
        let mut components = self.components.clone();
        components.push(component);
        EntityPath::new(components)
    }

    /// Prefix test; a prefix longer than `self` is simply not a prefix
    pub fn starts_with(&self, prefix: &EntityPath) -> bool {
        self.components.starts_with(&prefix.components)
    }

    /// Components after `prefix`, if `prefix` is one
    pub fn strip_prefix(&self, prefix: &EntityPath) -> Option<EntityPath> {
        if self.starts_with(prefix) {
            Some(self.slice(prefix.len()..))
        } else {
            None
        }
    }

    /// Longest common prefix; empty when the roots differ
    pub fn common_prefix(&self, other: &EntityPath) -> EntityPath {
        let shared = self
            .components
            .iter()
            .zip(&other.components)
            .take_while(|(a, b)| a == b)
            .count();
        self.slice(..shared)
    }

    /// Longest prefix shared by every path; empty for no paths
    pub fn common_ancestor<'a>(paths: impl IntoIterator<Item = &'a EntityPath>) -> EntityPath {
        let mut paths = paths.into_iter();
        let Some(first) = paths.next() else {
            return EntityPath::empty();
        };
        paths.fold(first.clone(), |acc, path| &acc & path)
    }
}

impl From<Vec<EntityPathComponent>> for EntityPath {
    fn from(components: Vec<EntityPathComponent>) -> Self {
        Self::new(components)
    }
}

impl FromStr for EntityPath {
    type Err = PathError;

    /// Parse `/uuid/uuid/...`; leading slashes are optional
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let components = s
            .trim()
            .trim_start_matches('/')
            .split('/')
            .filter(|part| !part.is_empty())
            .map(str::parse::<EntityPathComponent>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl Serialize for EntityPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl BitAnd for &EntityPath {
    type Output = EntityPath;

    fn bitand(self, rhs: &EntityPath) -> EntityPath {
        self.common_prefix(rhs)
    }
}

impl Add for &EntityPath {
    type Output = EntityPath;

    fn add(self, rhs: &EntityPath) -> EntityPath {
        self.join(rhs)
    }
}

impl<'a> IntoIterator for &'a EntityPath {
    type Item = &'a EntityPathComponent;
    type IntoIter = std::slice::Iter<'a, EntityPathComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}
