//! Stargazer - local-first list and cache synchronization for a GitHub
//! repository browser.
//!
//! Merges "fetch more" pages of repositories and issues, and keeps a
//! normalized entity cache in step with star/watch mutations, including
//! optimistic updates. Rendering and network transport are left to the host.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::SessionConfig;
pub use error::AppError;
