//! Cursor pagination models.
//!
//! A `Page` is one fetched batch of a GraphQL connection; an
//! `AccumulatedList` is every page fetched so far for one query.

use crate::error::AppError;
use crate::models::entity::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Continuation metadata of a fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Opaque token to resume after the last item.
    pub end_cursor: Option<String>,

    /// Whether the server has more items after this page.
    pub has_next_page: bool,
}

impl PageInfo {
    /// Page info for the final page of a connection.
    pub fn last(end_cursor: Option<String>) -> Self {
        Self {
            end_cursor,
            has_next_page: false,
        }
    }

    /// Page info for a page with more results after `end_cursor`.
    pub fn more(end_cursor: impl Into<String>) -> Self {
        Self {
            end_cursor: Some(end_cursor.into()),
            has_next_page: true,
        }
    }
}

/// Pagination variables for the next connection fetch (`first`, `after`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// Items to request.
    pub first: u32,

    /// Cursor to resume after; `None` for the first page.
    pub after: Option<String>,
}

impl PageRequest {
    /// Request for the first page of a query.
    pub fn first_page(first: u32) -> Self {
        Self { first, after: None }
    }
}

/// One fetched batch of items plus continuation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items in server order.
    pub items: Vec<T>,

    /// Continuation metadata.
    pub page_info: PageInfo,
}

impl<T> Page<T> {
    /// Create a page.
    pub fn new(items: Vec<T>, page_info: PageInfo) -> Self {
        Self { items, page_info }
    }

    /// Whether the page carries no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reject pagination metadata that cannot be continued from.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.page_info.has_next_page && self.page_info.end_cursor.is_none() {
            return Err(AppError::malformed_page_field(
                "hasNextPage is true but endCursor is null",
                "endCursor",
            ));
        }
        Ok(())
    }

    /// Map items, keeping pagination metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_info: self.page_info,
        }
    }
}

impl Page<Entity> {
    /// Parse a GraphQL connection object (`edges[].node` + `pageInfo`).
    ///
    /// Nodes become entities of the given typename. Missing `edges`,
    /// `pageInfo` or `pageInfo.hasNextPage` is a `MalformedPage` error.
    pub fn from_connection(typename: &str, connection: &Value) -> Result<Self, AppError> {
        let edges = connection
            .get("edges")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::malformed_page_field("connection has no edges", "edges"))?;

        let page_info = connection
            .get("pageInfo")
            .and_then(Value::as_object)
            .ok_or_else(|| AppError::malformed_page_field("connection has no pageInfo", "pageInfo"))?;

        let has_next_page = page_info
            .get("hasNextPage")
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                AppError::malformed_page_field("pageInfo has no hasNextPage", "hasNextPage")
            })?;

        let end_cursor = match page_info.get("endCursor") {
            None | Some(Value::Null) => None,
            Some(Value::String(cursor)) => Some(cursor.clone()),
            Some(_) => {
                return Err(AppError::malformed_page_field(
                    "endCursor is not a string",
                    "endCursor",
                ))
            }
        };

        let items = edges
            .iter()
            .map(|edge| {
                let node = edge
                    .get("node")
                    .cloned()
                    .ok_or_else(|| AppError::malformed_page_field("edge has no node", "node"))?;
                Entity::from_node(typename, node)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let page = Self::new(
            items,
            PageInfo {
                end_cursor,
                has_next_page,
            },
        );
        page.validate()?;
        Ok(page)
    }
}

/// Every item fetched so far for one query, in fetch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedList<T> {
    /// Items of all pages, append-only.
    pub items: Vec<T>,

    /// Metadata of the most recent non-empty page.
    pub page_info: PageInfo,
}

impl<T> AccumulatedList<T> {
    /// Start a list from its first page.
    pub fn from_page(page: Page<T>) -> Self {
        Self {
            items: page.items,
            page_info: page.page_info,
        }
    }

    /// Number of accumulated items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a "fetch more" action is available.
    pub fn has_next_page(&self) -> bool {
        self.page_info.has_next_page
    }

    /// Cursor to pass as `after` for the next fetch, if there is one.
    pub fn next_cursor(&self) -> Option<&str> {
        if self.page_info.has_next_page {
            self.page_info.end_cursor.as_deref()
        } else {
            None
        }
    }
    /// Variables for the "fetch more" request, or `None` on the last page.
    pub fn next_request(&self, first: u32) -> Option<PageRequest> {
        self.next_cursor().map(|cursor| PageRequest {
            first,
            after: Some(cursor.to_string()),
        })
    }
}
