//! Client session: one entity cache plus the accumulated list of every
//! active query, driven by explicit messages from the caller's fetch
//! scheduler.
//!
//! The session task owns all writes and handles commands one at a time in
//! arrival order, so per-entity optimistic and confirmation updates apply
//! in the order they were sent. Renderers read snapshots through the
//! handle and subscribe to change events.

use crate::config::SessionConfig;
use crate::error::AppError;
use crate::models::entity::{Entity, EntityId};
use crate::models::page::{AccumulatedList, Page, PageInfo, PageRequest};
use crate::services::cache::EntityCache;
use crate::services::page_merger;
use crate::services::reconciler::{CounterOutcome, MutationResult, Reconciler, Toggle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

/// Identifies one logical paginated query (e.g. an organization's repositories).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Events broadcast after the session state changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A query's accumulated list changed (or was dropped).
    ListUpdated {
        query: QueryKey,
        len: usize,
        page_info: Option<PageInfo>,
    },

    /// An entity's counter/flag was reconciled.
    EntityUpdated {
        entity_id: EntityId,
        outcome: CounterOutcome,
    },

    /// A command was rejected; nothing was applied.
    CommandFailed { message: String },
}

/// Commands that can be sent to the session task.
#[derive(Debug)]
pub enum SessionCommand {
    /// A paginated fetch completed.
    PageFetched {
        query: QueryKey,
        page: Page<Entity>,
        reply: oneshot::Sender<Result<PageInfo, AppError>>,
    },

    /// The view owning a query went away; drop its list.
    ResetQuery { query: QueryKey },

    /// Apply an optimistic or confirmed mutation result.
    ApplyMutation {
        toggle: Toggle<'static>,
        result: MutationResult,
        reply: oneshot::Sender<Result<CounterOutcome, AppError>>,
    },

    /// Stop the session task.
    Stop,
}

/// Cache and lists, shared read-only with the handle.
#[derive(Debug, Default)]
struct SessionState {
    cache: EntityCache,
    lists: HashMap<QueryKey, AccumulatedList<EntityId>>,
}

impl SessionState {
    /// Merge a page; the cache and list are only written once the merge succeeded.
    ///
    /// Returns the list's new metadata and length.
    fn page_fetched(
        &mut self,
        query: &QueryKey,
        page: Page<Entity>,
    ) -> Result<(PageInfo, usize), AppError> {
        let ids = page.clone().map(|entity| entity.id);
        let merged = page_merger::merge(self.lists.get(query), ids)?;

        if !page.is_empty() {
            self.cache.ingest_page(&page);
        }

        let summary = (merged.page_info.clone(), merged.len());
        self.lists.insert(query.clone(), merged);
        Ok(summary)
    }

    /// Resolve a list of identities against the cache.
    fn resolve(&self, query: &QueryKey) -> Option<AccumulatedList<Entity>> {
        let list = self.lists.get(query)?;
        Some(AccumulatedList {
            items: list
                .items
                .iter()
                .filter_map(|id| self.cache.read(id).cloned())
                .collect(),
            page_info: list.page_info.clone(),
        })
    }
}

/// Lightweight handle for talking to the session task.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    state: Arc<RwLock<SessionState>>,
    config: Arc<SessionConfig>,
}

impl SessionHandle {
    /// Deliver a fetched page for `query`.
    ///
    /// # Returns
    /// Pagination metadata of the accumulated list after the merge
    pub async fn page_fetched(
        &self,
        query: QueryKey,
        page: Page<Entity>,
    ) -> Result<PageInfo, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::PageFetched { query, page, reply })
            .await?;
        rx.await
            .map_err(|_| AppError::session("Session dropped the reply"))?
    }

    /// Apply a mutation result (optimistic or confirmed) for `toggle`.
    pub async fn apply_mutation(
        &self,
        toggle: Toggle<'static>,
        result: MutationResult,
    ) -> Result<CounterOutcome, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::ApplyMutation {
            toggle,
            result,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| AppError::session("Session dropped the reply"))?
    }

    /// Drop the accumulated list of `query`.
    pub async fn reset_query(&self, query: QueryKey) -> Result<(), AppError> {
        self.send(SessionCommand::ResetQuery { query }).await
    }

    /// Stop the session task.
    pub async fn stop(&self) -> Result<(), AppError> {
        self.send(SessionCommand::Stop).await
    }

    /// Snapshot of a query's list, resolved to current entity values.
    pub async fn list(&self, query: &QueryKey) -> Option<AccumulatedList<Entity>> {
        self.state.read().await.resolve(query)
    }

    /// Variables for the next fetch of `query`, sized by `page_size`.
    ///
    /// A query with no list yet starts at the first page; a list whose last
    /// page said there is nothing more yields `None`.
    pub async fn next_request(&self, query: &QueryKey) -> Option<PageRequest> {
        let page_size = self.config.page_size;
        match self.state.read().await.lists.get(query) {
            None => Some(PageRequest::first_page(page_size)),
            Some(list) => list.next_request(page_size),
        }
    }

    /// Snapshot of one cached entity.
    pub async fn entity(&self, id: &EntityId) -> Option<Entity> {
        self.state.read().await.cache.read(id).cloned()
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Configuration the session was started with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn send(&self, command: SessionCommand) -> Result<(), AppError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| AppError::session("Session not running"))
    }
}

/// Background session task.
pub struct Session {
    state: Arc<RwLock<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
    reconciler: Reconciler,
}

impl Session {
    /// Start a session with an empty cache.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: SessionConfig) -> SessionHandle {
        Self::start_with_cache(config, EntityCache::new())
    }

    /// Start a session over an already populated cache.
    ///
    /// Spawns a task that owns every write; returns a cloneable handle for
    /// sending commands and reading snapshots.
    pub fn start_with_cache(config: SessionConfig, cache: EntityCache) -> SessionHandle {
        let (tx, mut rx) = mpsc::channel::<SessionCommand>(config.command_buffer);
        let (events, _) = broadcast::channel(config.event_buffer);
        let state = Arc::new(RwLock::new(SessionState {
            cache,
            lists: HashMap::new(),
        }));

        let session = Session {
            state: state.clone(),
            events: events.clone(),
            reconciler: Reconciler::from_config(&config),
        };

        tokio::spawn(async move {
            log::info!("[session] Session started");
            while let Some(command) = rx.recv().await {
                if !session.handle(command).await {
                    break;
                }
            }
            log::info!("[session] Session stopped");
        });

        SessionHandle {
            command_tx: tx,
            events,
            state,
            config: Arc::new(config),
        }
    }

    /// Handle one command. Returns `false` to stop.
    async fn handle(&self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::PageFetched { query, page, reply } => {
                let result = self.state.write().await.page_fetched(&query, page);

                let reply_value = match result {
                    Ok((page_info, len)) => {
                        self.emit(SessionEvent::ListUpdated {
                            query,
                            len,
                            page_info: Some(page_info.clone()),
                        });
                        Ok(page_info)
                    }
                    Err(e) => {
                        log::warn!("[session] Page for {} rejected: {}", query, e);
                        self.emit(SessionEvent::CommandFailed {
                            message: e.to_string(),
                        });
                        Err(e)
                    }
                };
                let _ = reply.send(reply_value);
            }
            SessionCommand::ResetQuery { query } => {
                let removed = self.state.write().await.lists.remove(&query).is_some();
                if removed {
                    log::debug!("[session] Dropped list for {}", query);
                    self.emit(SessionEvent::ListUpdated {
                        query,
                        len: 0,
                        page_info: None,
                    });
                }
            }
            SessionCommand::ApplyMutation {
                toggle,
                result,
                reply,
            } => {
                let outcome = {
                    let mut state = self.state.write().await;
                    self.reconciler
                        .apply_mutation(&mut state.cache, &toggle, &result)
                };

                match &outcome {
                    Ok(outcome) => self.emit(SessionEvent::EntityUpdated {
                        entity_id: result.entity_id.clone(),
                        outcome: *outcome,
                    }),
                    Err(e) => self.emit(SessionEvent::CommandFailed {
                        message: e.to_string(),
                    }),
                }
                let _ = reply.send(outcome);
            }
            SessionCommand::Stop => {
                log::info!("[session] Session stopping");
                return false;
            }
        }
        true
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; renderers may read snapshots instead.
        let _ = self.events.send(event);
    }
}
