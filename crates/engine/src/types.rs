//! Core identifier types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Category used when a bare field name has not been resolved yet.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Category under which container fields are stored.
pub const CONTAINER_CATEGORY: &str = "index";

/// Particle position field names, one per axis.
pub const PARTICLE_POSITION_FIELDS: [&str; 3] = [
    "particle_position_x",
    "particle_position_y",
    "particle_position_z",
];

/// Canonical identifier of a field: `(category, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldKey {
    /// Fluid or particle category, e.g. `gas` or `io`.
    pub category: String,
    /// Field name within the category.
    pub name: String,
}

impl FieldKey {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    /// Same name under a different category.
    pub fn with_category(&self, category: impl Into<String>) -> Self {
        Self::new(category, self.name.clone())
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.category, self.name)
    }
}

impl From<(&str, &str)> for FieldKey {
    fn from((category, name): (&str, &str)) -> Self {
        Self::new(category, name)
    }
}

/// A user-supplied field specifier.
///
/// Specifiers are canonicalized into [`FieldKey`]s by
/// [`DataContainer::determine_fields`](crate::DataContainer::determine_fields).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldSpec {
    /// A bare field name; the category is inferred.
    Name(String),
    /// An explicit `(category, name)` pair.
    Pair(String, String),
    /// An explicit tuple of unchecked arity.
    Parts(Vec<String>),
}

impl FieldSpec {
    /// Parse a specifier from a scripting-layer JSON value.
    ///
    /// A string is a bare name and an array must hold exactly two strings.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(name) => Ok(Self::Name(name.clone())),
            serde_json::Value::Array(items) => {
                let parts = items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| Error::FieldNotParseable(value.to_string()))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Parts(parts))
            }
            other => Err(Error::FieldNotParseable(other.to_string())),
        }
    }

    /// The explicit pair, or `None` for bare names.
    ///
    /// Fails with [`Error::FieldNotParseable`] for tuples that are not pairs.
    pub fn explicit(&self) -> Result<Option<(&str, &str)>> {
        match self {
            Self::Name(_) => Ok(None),
            Self::Pair(category, name) => Ok(Some((category, name))),
            Self::Parts(parts) => match parts.as_slice() {
                [category, name] => Ok(Some((category, name))),
                _ => Err(Error::FieldNotParseable(format!("{parts:?}"))),
            },
        }
    }

    /// The field name, regardless of form.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) | Self::Pair(_, name) => Some(name),
            Self::Parts(parts) => parts.last().map(String::as_str),
        }
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Pair(category, name) => write!(f, "({category}, {name})"),
            Self::Parts(parts) => write!(f, "({})", parts.join(", ")),
        }
    }
}

impl From<&str> for FieldSpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for FieldSpec {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<(&str, &str)> for FieldSpec {
    fn from((category, name): (&str, &str)) -> Self {
        Self::Pair(category.to_string(), name.to_string())
    }
}

impl From<FieldKey> for FieldSpec {
    fn from(key: FieldKey) -> Self {
        Self::Pair(key.category, key.name)
    }
}

impl From<&FieldKey> for FieldSpec {
    fn from(key: &FieldKey) -> Self {
        Self::Pair(key.category.clone(), key.name.clone())
    }
}

/// How a chunk groups its sub-objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Batched for I/O efficiency.
    Io,
    /// One sub-object at a time, for geometric iteration.
    Spatial,
    /// The full selection.
    All,
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "io"),
            Self::Spatial => write!(f, "spatial"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Identifier of a storage sub-object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}
