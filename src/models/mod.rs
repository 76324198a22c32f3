//! Data models for the application.
//!
//! These models represent the entities held in the local cache and the
//! pagination shapes delivered by the GraphQL API.

pub mod entity;
pub mod issue;
pub mod page;
pub mod repository;

// Re-exports for convenient access
pub use entity::{Entity, EntityId, FieldPath};
pub use issue::{filter_issues, Issue, IssueFilter, IssueState};
pub use page::{AccumulatedList, Page, PageInfo, PageRequest};
pub use repository::{Language, Owner, Repository, SubscriptionState, TotalCount};
