//! Cache reconciler for star/watch mutations.
//!
//! A toggle pairs an integer counter with a viewer flag on one entity
//! (stargazer count with `viewerHasStarred`, watcher count with
//! `viewerSubscription`). Reconciling moves both together and is
//! idempotent: applying the same target flag twice counts once. That makes
//! optimistic prediction and server confirmation two calls to the same
//! function.

use crate::config::SessionConfig;
use crate::error::AppError;
use crate::models::entity::{Entity, EntityId, FieldPath};
use crate::models::repository::SubscriptionState;
use crate::services::cache::EntityCache;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// How a flag field is encoded in the entity JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    /// Plain JSON boolean.
    Boolean,
    /// `SUBSCRIBED` / `UNSUBSCRIBED` / `IGNORED` string; null means unsubscribed.
    Subscription,
}

impl FlagKind {
    /// Decode a stored flag value, `None` if it has the wrong type.
    pub fn decode(self, value: &Value) -> Option<bool> {
        match (self, value) {
            (Self::Boolean, Value::Bool(flag)) => Some(*flag),
            (Self::Subscription, Value::String(state)) => {
                Some(SubscriptionState::from(state.as_str()).is_watching())
            }
            (Self::Subscription, Value::Null) => Some(false),
            _ => None,
        }
    }

    /// Encode a flag for writing back.
    pub fn encode(self, flag: bool) -> Value {
        match self {
            Self::Boolean => Value::Bool(flag),
            Self::Subscription => json!(SubscriptionState::from_watching(flag).as_str()),
        }
    }
}

/// A counter and the viewer flag it moves with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle<'a> {
    /// Path of the integer counter.
    pub counter_field: &'a str,
    /// Path of the viewer flag.
    pub flag_field: &'a str,
    pub flag_kind: FlagKind,
}

impl Toggle<'static> {
    /// Star / unstar.
    pub const STAR: Toggle<'static> = Toggle {
        counter_field: "stargazers.totalCount",
        flag_field: "viewerHasStarred",
        flag_kind: FlagKind::Boolean,
    };

    /// Watch / unwatch.
    pub const WATCH: Toggle<'static> = Toggle {
        counter_field: "watchers.totalCount",
        flag_field: "viewerSubscription",
        flag_kind: FlagKind::Subscription,
    };
}

impl<'a> Toggle<'a> {
    /// Toggle over a boolean flag.
    pub fn boolean(counter_field: &'a str, flag_field: &'a str) -> Self {
        Self {
            counter_field,
            flag_field,
            flag_kind: FlagKind::Boolean,
        }
    }
}

/// Direction a counter moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterChange {
    Incremented,
    Decremented,
    Unchanged,
}

/// Result of one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterOutcome {
    pub change: CounterChange,
    /// Counter value after reconciliation.
    pub counter: i64,
    /// Flag value after reconciliation.
    pub flag: bool,
}

/// Mutation result as delivered by the network layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    pub entity_id: EntityId,
    pub new_flag_value: bool,
}

impl MutationResult {
    pub fn new(entity_id: EntityId, new_flag_value: bool) -> Self {
        Self {
            entity_id,
            new_flag_value,
        }
    }

    /// Read a mutation payload node such as `starrable { id viewerHasStarred }`
    /// or `subscribable { id viewerSubscription }`.
    pub fn from_node(typename: &str, toggle: &Toggle<'_>, node: Value) -> Result<Self, AppError> {
        let entity = Entity::from_node(typename, node)?;
        let flag_path = FieldPath::parse(toggle.flag_field)?;
        let new_flag_value = read_flag(&entity, toggle.flag_kind, flag_path)?;
        Ok(Self::new(entity.id, new_flag_value))
    }
}

/// Applies counter/flag updates to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    clamp_counters: bool,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            clamp_counters: true,
        }
    }
}

impl Reconciler {
    pub fn new(clamp_counters: bool) -> Self {
        Self { clamp_counters }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.clamp_counters)
    }

    /// Move `toggle`'s flag on `entity_id` to `new_flag_value`, adjusting the
    /// counter by one only if the flag actually changes.
    ///
    /// The entity must already be cached. On any error the cache is left
    /// exactly as it was.
    pub fn apply(
        &self,
        cache: &mut EntityCache,
        toggle: &Toggle<'_>,
        entity_id: &EntityId,
        new_flag_value: bool,
    ) -> Result<CounterOutcome, AppError> {
        self.reconcile(cache, toggle, entity_id, new_flag_value, None)
    }

    /// Like `apply`, but writes `stored_flag` verbatim as the flag value.
    ///
    /// `stored_flag` must decode to `new_flag_value`. Used to restore an
    /// encoding that `FlagKind::encode` cannot produce, such as `IGNORED`.
    fn reconcile(
        &self,
        cache: &mut EntityCache,
        toggle: &Toggle<'_>,
        entity_id: &EntityId,
        new_flag_value: bool,
        stored_flag: Option<&Value>,
    ) -> Result<CounterOutcome, AppError> {
        let Some(entity) = cache.read(entity_id) else {
            log::warn!("[cache] Reconcile for uncached entity {}", entity_id);
            return Err(AppError::entity_not_found(entity_id.to_string()));
        };

        let counter_path = FieldPath::parse(toggle.counter_field)?;
        let flag_path = FieldPath::parse(toggle.flag_field)?;

        let counter = entity
            .get(counter_path)
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                AppError::invalid_field(
                    format!("counter is missing or not an integer on {}", entity_id),
                    counter_path.as_str(),
                )
            })?;
        let old_flag = read_flag(entity, toggle.flag_kind, flag_path)?;

        let flag_value = match stored_flag {
            Some(value) => value.clone(),
            None => toggle.flag_kind.encode(new_flag_value),
        };

        if old_flag == new_flag_value {
            // Same logical state; only a differing stored encoding is rewritten.
            let rewrite = stored_flag.is_some() && entity.get(flag_path) != Some(&flag_value);
            if rewrite {
                let updated = entity.with_fields(&[(flag_path, flag_value)])?;
                cache.replace(updated);
            } else {
                log::debug!(
                    "[cache] {} on {} already {}, nothing to do",
                    flag_path,
                    entity_id,
                    new_flag_value
                );
            }
            return Ok(CounterOutcome {
                change: CounterChange::Unchanged,
                counter,
                flag: old_flag,
            });
        }

        let (change, new_counter) = if new_flag_value {
            (CounterChange::Incremented, counter.saturating_add(1))
        } else if self.clamp_counters && counter <= 0 {
            log::warn!(
                "[cache] {} on {} is {}, not decrementing below zero",
                counter_path,
                entity_id,
                counter
            );
            (CounterChange::Unchanged, counter)
        } else {
            (CounterChange::Decremented, counter.saturating_sub(1))
        };

        let updated = entity.with_fields(&[
            (counter_path, json!(new_counter)),
            (flag_path, flag_value),
        ])?;
        cache.replace(updated);

        log::debug!(
            "[cache] {} on {}: {} -> {} ({:?})",
            counter_path,
            entity_id,
            counter,
            new_counter,
            change
        );

        Ok(CounterOutcome {
            change,
            counter: new_counter,
            flag: new_flag_value,
        })
    }

    /// Apply a mutation result for `toggle`.
    pub fn apply_mutation(
        &self,
        cache: &mut EntityCache,
        toggle: &Toggle<'_>,
        result: &MutationResult,
    ) -> Result<CounterOutcome, AppError> {
        self.apply(cache, toggle, &result.entity_id, result.new_flag_value)
    }
}

/// Move a boolean flag and its counter on a cached entity.
///
/// # Arguments
/// * `cache` - Entity cache
/// * `entity_id` - Identity of an already cached entity
/// * `counter_field` - Dotted path of the integer counter
/// * `flag_field` - Dotted path of the boolean flag
/// * `new_flag_value` - Target flag value
///
/// # Returns
/// The outcome, or `EntityNotFound` when the entity is not cached
pub fn apply_counter_delta(
    cache: &mut EntityCache,
    entity_id: &EntityId,
    counter_field: &str,
    flag_field: &str,
    new_flag_value: bool,
) -> Result<CounterOutcome, AppError> {
    Reconciler::default().apply(
        cache,
        &Toggle::boolean(counter_field, flag_field),
        entity_id,
        new_flag_value,
    )
}

/// Decoded flag plus its raw stored value.
fn stored_flag(
    cache: &EntityCache,
    toggle: &Toggle<'_>,
    entity_id: &EntityId,
) -> Result<(bool, Value), AppError> {
    let entity = cache
        .read(entity_id)
        .ok_or_else(|| AppError::entity_not_found(entity_id.to_string()))?;
    let path = FieldPath::parse(toggle.flag_field)?;
    let flag = read_flag(entity, toggle.flag_kind, path)?;
    Ok((flag, entity.get(path).cloned().unwrap_or(Value::Null)))
}

fn read_flag(entity: &Entity, kind: FlagKind, path: FieldPath<'_>) -> Result<bool, AppError> {
    entity
        .get(path)
        .and_then(|value| kind.decode(value))
        .ok_or_else(|| {
            AppError::invalid_field(
                format!("flag is missing or not a {:?} on {}", kind, entity.id),
                path.as_str(),
            )
        })
}

/// One user action applied optimistically, then confirmed or rolled back.
///
/// Each step is a single reconciliation; the caller decides when each runs
/// and must apply them in the order the action and response occurred.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticMutation<'a> {
    toggle: Toggle<'a>,
    entity_id: EntityId,
    previous_flag: bool,
    /// Flag exactly as stored before the action (e.g. `"IGNORED"`).
    previous_stored: Value,
    predicted_flag: bool,
}

impl<'a> OptimisticMutation<'a> {
    /// Record the flag before the action and the predicted flag after it.
    pub fn begin(
        cache: &EntityCache,
        toggle: Toggle<'a>,
        entity_id: EntityId,
        predicted_flag: bool,
    ) -> Result<Self, AppError> {
        let (previous_flag, previous_stored) = stored_flag(cache, &toggle, &entity_id)?;
        Ok(Self {
            toggle,
            entity_id,
            previous_flag,
            previous_stored,
            predicted_flag,
        })
    }

    /// Predict the flag flips (the star/unstar, watch/unwatch button).
    pub fn flip(
        cache: &EntityCache,
        toggle: Toggle<'a>,
        entity_id: EntityId,
    ) -> Result<Self, AppError> {
        let (previous_flag, previous_stored) = stored_flag(cache, &toggle, &entity_id)?;
        Ok(Self {
            toggle,
            entity_id,
            previous_flag,
            previous_stored,
            predicted_flag: !previous_flag,
        })
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn predicted_flag(&self) -> bool {
        self.predicted_flag
    }

    /// Mutation result carrying the predicted flag.
    pub fn predicted_result(&self) -> MutationResult {
        MutationResult::new(self.entity_id.clone(), self.predicted_flag)
    }

    /// Apply the prediction before the server responds.
    pub fn predict(
        &self,
        reconciler: &Reconciler,
        cache: &mut EntityCache,
    ) -> Result<CounterOutcome, AppError> {
        reconciler.apply(cache, &self.toggle, &self.entity_id, self.predicted_flag)
    }

    /// Apply the server-confirmed flag. A no-op when it matches the prediction.
    pub fn confirm(
        &self,
        reconciler: &Reconciler,
        cache: &mut EntityCache,
        server_flag: bool,
    ) -> Result<CounterOutcome, AppError> {
        if server_flag != self.predicted_flag {
            log::warn!(
                "[cache] Server flag for {} differs from prediction ({} vs {})",
                self.entity_id,
                server_flag,
                self.predicted_flag
            );
        }
        reconciler.apply(cache, &self.toggle, &self.entity_id, server_flag)
    }

    /// Restore the flag from before the action after a failed mutation.
    ///
    /// The stored value is written back as it was, so an `IGNORED`
    /// subscription does not come back as `UNSUBSCRIBED`.
    pub fn rollback(
        &self,
        reconciler: &Reconciler,
        cache: &mut EntityCache,
    ) -> Result<CounterOutcome, AppError> {
        reconciler.reconcile(
            cache,
            &self.toggle,
            &self.entity_id,
            self.previous_flag,
            Some(&self.previous_stored),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(flag: bool, count: i64) -> (EntityCache, EntityId) {
        let mut cache = EntityCache::new();
        let entity = Entity::from_node(
            "Repository",
            json!({
                "id": "1",
                "name": "react",
                "stargazers": { "totalCount": count },
                "watchers": { "totalCount": 4 },
                "viewerHasStarred": flag,
                "viewerSubscription": "UNSUBSCRIBED"
            }),
        )
        .unwrap();
        let id = entity.id.clone();
        cache.write_fetched(entity);
        (cache, id)
    }

    fn stars(cache: &EntityCache, id: &EntityId) -> Value {
        cache.read(id).unwrap().data["stargazers"]["totalCount"].clone()
    }

    #[test]
    fn test_idempotent_when_flag_already_set() {
        let (mut cache, id) = cache_with(true, 5);
        for _ in 0..2 {
            let outcome =
                apply_counter_delta(&mut cache, &id, "stargazers.totalCount", "viewerHasStarred", true)
                    .unwrap();
            assert_eq!(outcome.change, CounterChange::Unchanged);
            assert_eq!(outcome.counter, 5);
        }
        assert_eq!(stars(&cache, &id), json!(5));
    }

    #[test]
    fn test_flip_and_back() {
        let (mut cache, id) = cache_with(false, 5);

        let up = apply_counter_delta(&mut cache, &id, "stargazers.totalCount", "viewerHasStarred", true)
            .unwrap();
        assert_eq!(up.change, CounterChange::Incremented);
        assert_eq!(stars(&cache, &id), json!(6));
        assert_eq!(cache.read(&id).unwrap().data["viewerHasStarred"], json!(true));

        let down =
            apply_counter_delta(&mut cache, &id, "stargazers.totalCount", "viewerHasStarred", false)
                .unwrap();
        assert_eq!(down.change, CounterChange::Decremented);
        assert_eq!(stars(&cache, &id), json!(5));
        assert_eq!(cache.read(&id).unwrap().data["name"], json!("react"));
    }

    #[test]
    fn test_missing_entity_leaves_cache_unchanged() {
        let (mut cache, _) = cache_with(false, 5);
        let before = cache.clone();
        let missing: EntityId = "Repository:nonexistent-id".parse().unwrap();

        let err = apply_counter_delta(&mut cache, &missing, "stargazers.totalCount", "viewerHasStarred", true)
            .unwrap_err();
        assert!(err.is_entity_not_found());
        assert_eq!(cache, before);
        assert!(!cache.contains(&missing));
    }

    #[test]
    fn test_wrong_field_types_rejected() {
        let (mut cache, id) = cache_with(false, 5);
        let before = cache.clone();

        let err = apply_counter_delta(&mut cache, &id, "name", "viewerHasStarred", true).unwrap_err();
        assert!(matches!(err, AppError::InvalidField { .. }));

        let err =
            apply_counter_delta(&mut cache, &id, "stargazers.totalCount", "name", true).unwrap_err();
        assert!(matches!(err, AppError::InvalidField { .. }));

        assert_eq!(cache, before);
    }

    #[test]
    fn test_watch_uses_subscription_state() {
        let (mut cache, id) = cache_with(false, 5);
        let reconciler = Reconciler::default();

        let outcome = reconciler.apply(&mut cache, &Toggle::WATCH, &id, true).unwrap();
        assert_eq!(outcome.counter, 5);
        let entity = cache.read(&id).unwrap();
        assert_eq!(entity.data["watchers"]["totalCount"], json!(5));
        assert_eq!(entity.data["viewerSubscription"], json!("SUBSCRIBED"));
        // star counter untouched
        assert_eq!(stars(&cache, &id), json!(5));

        reconciler.apply(&mut cache, &Toggle::WATCH, &id, false).unwrap();
        let entity = cache.read(&id).unwrap();
        assert_eq!(entity.data["watchers"]["totalCount"], json!(4));
        assert_eq!(entity.data["viewerSubscription"], json!("UNSUBSCRIBED"));
    }

    #[test]
    fn test_clamp_at_zero() {
        let (mut cache, id) = cache_with(true, 0);
        let outcome = Reconciler::default()
            .apply(&mut cache, &Toggle::STAR, &id, false)
            .unwrap();
        assert_eq!(outcome.counter, 0);
        assert!(!outcome.flag);

        let (mut cache, id) = cache_with(true, 0);
        let outcome = Reconciler::new(false)
            .apply(&mut cache, &Toggle::STAR, &id, false)
            .unwrap();
        assert_eq!(outcome.counter, -1);
    }

    #[test]
    fn test_mutation_result_from_node() {
        let node = json!({ "id": "1", "viewerSubscription": "SUBSCRIBED" });
        let result = MutationResult::from_node("Repository", &Toggle::WATCH, node).unwrap();
        assert_eq!(result.entity_id.to_string(), "Repository:1");
        assert!(result.new_flag_value);
    }

    #[test]
    fn test_optimistic_confirm_and_rollback() {
        let (mut cache, id) = cache_with(false, 10);
        let reconciler = Reconciler::default();

        let pending = OptimisticMutation::flip(&cache, Toggle::STAR, id.clone()).unwrap();
        assert!(pending.predicted_flag());

        assert_eq!(pending.predict(&reconciler, &mut cache).unwrap().counter, 11);
        let confirmed = pending.confirm(&reconciler, &mut cache, true).unwrap();
        assert_eq!(confirmed.change, CounterChange::Unchanged);
        assert_eq!(stars(&cache, &id), json!(11));

        let rolled_back = pending.rollback(&reconciler, &mut cache).unwrap();
        assert_eq!(rolled_back.counter, 10);
        assert!(!rolled_back.flag);
    }

    #[test]
    fn test_negative_counter_not_raised() {
        let (mut cache, id) = cache_with(true, -3);
        let outcome = Reconciler::default()
            .apply(&mut cache, &Toggle::STAR, &id, false)
            .unwrap();
        assert_eq!(outcome.change, CounterChange::Unchanged);
        assert_eq!(outcome.counter, -3);
        assert!(!outcome.flag);
        assert_eq!(stars(&cache, &id), json!(-3));
        assert_eq!(cache.read(&id).unwrap().data["viewerHasStarred"], json!(false));
    }

    #[test]
    fn test_rollback_restores_ignored_subscription() {
        let (mut cache, id) = cache_with(false, 10);
        let ignored = cache
            .read(&id)
            .unwrap()
            .with_fields(&[
                (FieldPath::parse("viewerSubscription").unwrap(), json!("IGNORED")),
                (FieldPath::parse("watchers.totalCount").unwrap(), json!(3)),
            ])
            .unwrap();
        cache.replace(ignored);
        let reconciler = Reconciler::default();

        let pending = OptimisticMutation::flip(&cache, Toggle::WATCH, id.clone()).unwrap();
        assert!(pending.predicted_flag());
        let predicted = pending.predict(&reconciler, &mut cache).unwrap();
        assert_eq!(predicted.counter, 4);
        assert_eq!(cache.read(&id).unwrap().data["viewerSubscription"], json!("SUBSCRIBED"));

        let rolled_back = pending.rollback(&reconciler, &mut cache).unwrap();
        assert_eq!(rolled_back.change, CounterChange::Decremented);
        assert_eq!(rolled_back.counter, 3);
        let entity = cache.read(&id).unwrap();
        assert_eq!(entity.data["viewerSubscription"], json!("IGNORED"));
        assert_eq!(entity.data["watchers"]["totalCount"], json!(3));

        // a second rollback is a no-op
        let again = pending.rollback(&reconciler, &mut cache).unwrap();
        assert_eq!(again.change, CounterChange::Unchanged);
        assert_eq!(again.counter, 3);
    }

    #[test]
    fn test_predicted_result_feeds_apply_mutation() {
        let (mut cache, id) = cache_with(true, 5);
        let reconciler = Reconciler::default();

        let pending = OptimisticMutation::flip(&cache, Toggle::STAR, id.clone()).unwrap();
        let result = pending.predicted_result();
        assert_eq!(result.entity_id, id);
        assert!(!result.new_flag_value);

        let outcome = reconciler
            .apply_mutation(&mut cache, &Toggle::STAR, &result)
            .unwrap();
        assert_eq!(outcome.change, CounterChange::Decremented);
        assert_eq!(stars(&cache, &id), json!(4));
    }
}
