//! Synchronization services.
//!
//! This module contains the list and cache logic that sits between the
//! network layer and the renderers:
//! - `page_merger`: combines "fetch more" pages into one list
//! - `cache`: normalized store of last-known entities
//! - `reconciler`: star/watch counter updates, optimistic and confirmed
//! - `session`: background task that owns the cache and lists
//!
//! Services are pure or message-driven and independent of any UI or transport.

pub mod cache;
pub mod page_merger;
pub mod reconciler;
pub mod session;

pub use cache::{CacheEntry, EntityCache};
pub use page_merger::merge;
pub use reconciler::{
    apply_counter_delta, CounterChange, CounterOutcome, FlagKind, MutationResult,
    OptimisticMutation, Reconciler, Toggle,
};
pub use session::{QueryKey, Session, SessionCommand, SessionEvent, SessionHandle};
