//! Issue model and the open/closed issue filter.

use crate::error::AppError;
use crate::models::entity::Entity;
use crate::models::page::AccumulatedList;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// State of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueState {
    Open,
    Closed,
}

/// Which issues of a repository are shown.
///
/// Cycles `None -> Open -> Closed -> None` on each toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueFilter {
    #[default]
    None,
    Open,
    Closed,
}

impl IssueFilter {
    /// The filter after one toggle.
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::Open,
            Self::Open => Self::Closed,
            Self::Closed => Self::None,
        }
    }

    /// Whether issues are shown at all.
    pub fn is_shown(self) -> bool {
        self != Self::None
    }

    /// Whether an issue in `state` passes this filter.
    pub fn matches(self, state: IssueState) -> bool {
        match self {
            Self::None => false,
            Self::Open => state == IssueState::Open,
            Self::Closed => state == IssueState::Closed,
        }
    }
}

/// Typed view of a cached issue node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,

    /// Repository-scoped issue number.
    pub number: i64,

    pub state: IssueState,

    pub title: String,

    pub url: String,

    #[serde(default, rename = "bodyHTML")]
    pub body_html: Option<String>,
}

impl Issue {
    /// GraphQL typename used for cache identity.
    pub const TYPENAME: &'static str = "Issue";
}

impl TryFrom<&Entity> for Issue {
    type Error = AppError;

    fn try_from(entity: &Entity) -> Result<Self, Self::Error> {
        if entity.id.typename() != Self::TYPENAME {
            return Err(AppError::invalid_input_field(
                format!("{} is not an issue", entity.id),
                "typename",
            ));
        }
        Ok(serde_json::from_value(Value::Object(entity.data.clone()))?)
    }
}

/// Issues of an accumulated list that pass `filter`, in list order.
///
/// Entities that are not issues are skipped.
pub fn filter_issues(list: &AccumulatedList<Entity>, filter: IssueFilter) -> Vec<Issue> {
    if !filter.is_shown() {
        return Vec::new();
    }

    list.items
        .iter()
        .filter_map(|entity| match Issue::try_from(entity) {
            Ok(issue) => Some(issue),
            Err(e) => {
                log::warn!("[issues] Skipping {}: {}", entity.id, e);
                None
            }
        })
        .filter(|issue| filter.matches(issue.state))
        .collect()
}
