//! Cacheable entity model.
//!
//! An entity is the last-known JSON shape of a GraphQL node (a repository,
//! an issue), keyed by a stable `<Typename>:<id>` identity.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Separator between typename and server id in an identity string.
const ID_SEPARATOR: char = ':';

/// Globally unique entity identity, e.g. `Repository:MDEwOlJlcG9zaXRvcnk2MzM1MjkwNw==`.
///
/// Serialized as the plain composite string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    typename: String,
    id: String,
}

impl EntityId {
    /// Build an identity from a typename and a server-assigned id.
    pub fn new(typename: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            typename: typename.into(),
            id: id.into(),
        }
    }

    /// GraphQL typename part (e.g. `Repository`).
    pub fn typename(&self) -> &str {
        &self.typename
    }

    /// Server-assigned id part.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl FromStr for EntityId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Server ids may themselves contain ':', so only the first one separates.
        match s.split_once(ID_SEPARATOR) {
            Some((typename, id)) if !typename.is_empty() && !id.is_empty() => {
                Ok(Self::new(typename, id))
            }
            _ => Err(AppError::invalid_input_field(
                format!("expected '<Typename>:<id>', got '{}'", s),
                "entity_id",
            )),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.typename, ID_SEPARATOR, self.id)
    }
}

/// Dot-separated path into an entity's JSON, e.g. `stargazers.totalCount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath<'a> {
    raw: &'a str,
}

impl<'a> FieldPath<'a> {
    /// Parse a path, rejecting empty segments.
    pub fn parse(raw: &'a str) -> Result<Self, AppError> {
        if raw.is_empty() || raw.split('.').any(str::is_empty) {
            return Err(AppError::invalid_field("empty path segment", raw));
        }
        Ok(Self { raw })
    }

    /// Path segments from the entity root to the leaf.
    pub fn segments(&self) -> impl Iterator<Item = &'a str> {
        self.raw.split('.')
    }

    /// Dotted form as given.
    pub fn as_str(&self) -> &'a str {
        self.raw
    }
}

impl std::fmt::Display for FieldPath<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.raw)
    }
}

/// Last-known value of a cached node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identity.
    pub id: EntityId,

    /// Node fields as fetched (including the raw `id`).
    pub data: Map<String, Value>,
}

impl Entity {
    /// Create an entity from an identity and its field map.
    pub fn new(id: EntityId, data: Map<String, Value>) -> Self {
        Self { id, data }
    }

    /// Build an entity from a GraphQL node, deriving identity from its `id` field.
    pub fn from_node(typename: &str, node: Value) -> Result<Self, AppError> {
        let Value::Object(data) = node else {
            return Err(AppError::invalid_input_field(
                format!("{} node is not an object", typename),
                "node",
            ));
        };

        let id = match data.get("id") {
            Some(Value::String(id)) if !id.is_empty() => EntityId::new(typename, id.as_str()),
            _ => {
                return Err(AppError::invalid_input_field(
                    format!("{} node has no string id", typename),
                    "id",
                ))
            }
        };

        Ok(Self { id, data })
    }

    /// Read the value at `path`, if every segment exists.
    pub fn get(&self, path: FieldPath<'_>) -> Option<&Value> {
        let mut segments = path.segments();
        let mut current = self.data.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Return a copy with the given leaves replaced; all sibling fields are kept.
    ///
    /// Parent objects must already exist. Nothing is returned on error, so a
    /// failed write never yields a half-updated entity.
    pub fn with_fields(&self, updates: &[(FieldPath<'_>, Value)]) -> Result<Self, AppError> {
        let mut updated = self.clone();
        for (path, value) in updates {
            updated.set(*path, value.clone())?;
        }
        Ok(updated)
    }

    /// Merge the top-level fields of a newer fetch into this entity.
    pub fn merge_from(&mut self, newer: Entity) {
        for (key, value) in newer.data {
            self.data.insert(key, value);
        }
    }

    fn set(&mut self, path: FieldPath<'_>, value: Value) -> Result<(), AppError> {
        let segments: Vec<&str> = path.segments().collect();
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(AppError::invalid_field("empty path", path.as_str()));
        };

        let mut target = &mut self.data;
        for segment in parents {
            target = match target.get_mut(*segment) {
                Some(Value::Object(child)) => child,
                _ => {
                    return Err(AppError::invalid_field(
                        format!("'{}' is not an object on {}", segment, self.id),
                        path.as_str(),
                    ))
                }
            };
        }

        target.insert((*leaf).to_string(), value);
        Ok(())
    }
}
