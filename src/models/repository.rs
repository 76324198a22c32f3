//! Repository model.

use crate::error::AppError;
use crate::models::entity::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Viewer's watch state on a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionState {
    Subscribed,
    Unsubscribed,
    Ignored,
}

impl SubscriptionState {
    /// Only `SUBSCRIBED` counts toward the watcher total.
    pub fn is_watching(self) -> bool {
        self == Self::Subscribed
    }

    /// State to send for a watch (`true`) or unwatch (`false`).
    pub fn from_watching(watching: bool) -> Self {
        if watching {
            Self::Subscribed
        } else {
            Self::Unsubscribed
        }
    }

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscribed => "SUBSCRIBED",
            Self::Unsubscribed => "UNSUBSCRIBED",
            Self::Ignored => "IGNORED",
        }
    }
}

impl From<&str> for SubscriptionState {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "SUBSCRIBED" => Self::Subscribed,
            "IGNORED" => Self::Ignored,
            _ => Self::Unsubscribed,
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{ totalCount }` connection summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: i64,
}

/// Primary language of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub name: String,
}

/// Repository owner (user or organization).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    pub url: String,
}

/// Typed view of a cached repository node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Server-assigned node id.
    pub id: String,

    /// Repository name.
    pub name: String,

    /// URL to the repository web page.
    pub url: String,

    /// Rendered description.
    #[serde(default, rename = "descriptionHTML")]
    pub description_html: Option<String>,

    #[serde(default)]
    pub primary_language: Option<Language>,

    #[serde(default)]
    pub owner: Option<Owner>,

    /// Star counter, paired with `viewer_has_starred`.
    pub stargazers: TotalCount,

    /// Watcher counter, paired with `viewer_subscription`.
    pub watchers: TotalCount,

    pub viewer_has_starred: bool,

    #[serde(default)]
    pub viewer_subscription: Option<SubscriptionState>,
}

impl Repository {
    /// GraphQL typename used for cache identity.
    pub const TYPENAME: &'static str = "Repository";

    /// Whether the viewer watches this repository.
    pub fn is_watching(&self) -> bool {
        self.viewer_subscription
            .map(SubscriptionState::is_watching)
            .unwrap_or(false)
    }

    /// Convert into a cacheable entity.
    pub fn to_entity(&self) -> Result<Entity, AppError> {
        Entity::from_node(Self::TYPENAME, serde_json::to_value(self)?)
    }
}

impl TryFrom<&Entity> for Repository {
    type Error = AppError;

    fn try_from(entity: &Entity) -> Result<Self, Self::Error> {
        if entity.id.typename() != Self::TYPENAME {
            return Err(AppError::invalid_input_field(
                format!("{} is not a repository", entity.id),
                "typename",
            ));
        }
        Ok(serde_json::from_value(Value::Object(entity.data.clone()))?)
    }
}
