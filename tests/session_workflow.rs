//! Session workflow tests.
//!
//! Drives a running session the way a host application's fetch scheduler
//! would:
//! - Fetch the first page of an organization's repositories
//! - Fetch more until there is no next page
//! - Star a repository optimistically, then confirm
//! - Read resolved snapshots and change events
//! - Drop a query when its view goes away

use serde_json::{json, Value};
use stargazer_lib::models::{Entity, EntityId, Page, PageInfo, PageRequest, Repository};
use stargazer_lib::services::{
    CounterChange, MutationResult, QueryKey, Session, SessionEvent, Toggle,
};
use stargazer_lib::{AppError, SessionConfig};

/// Build a GraphQL repositories connection for the given ids.
fn connection(ids: &[&str], end_cursor: Option<&str>, has_next_page: bool) -> Value {
    let edges: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "node": {
                    "id": id,
                    "name": format!("repo-{}", id),
                    "url": format!("https://github.com/the-road-to-learn-react/repo-{}", id),
                    "stargazers": { "totalCount": 10 },
                    "watchers": { "totalCount": 1 },
                    "viewerHasStarred": false,
                    "viewerSubscription": null
                }
            })
        })
        .collect();

    json!({
        "edges": edges,
        "pageInfo": { "endCursor": end_cursor, "hasNextPage": has_next_page }
    })
}

fn page(ids: &[&str], end_cursor: Option<&str>, has_next_page: bool) -> Page<Entity> {
    Page::from_connection(
        Repository::TYPENAME,
        &connection(ids, end_cursor, has_next_page),
    )
    .unwrap()
}

fn names(list: &stargazer_lib::models::AccumulatedList<Entity>) -> Vec<String> {
    list.items
        .iter()
        .map(|entity| entity.data["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_fetch_more_until_last_page() {
    let session = Session::start(SessionConfig::default());
    let query = QueryKey::new("organization:the-road-to-learn-react/repositories");

    let info = session
        .page_fetched(query.clone(), page(&["1", "2"], Some("c2"), true))
        .await
        .unwrap();
    assert_eq!(info, PageInfo::more("c2"));

    let info = session
        .page_fetched(query.clone(), page(&["3"], Some("c3"), false))
        .await
        .unwrap();
    assert!(!info.has_next_page);

    let list = session.list(&query).await.unwrap();
    assert_eq!(names(&list), vec!["repo-1", "repo-2", "repo-3"]);
    assert_eq!(list.next_cursor(), None);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_next_request_follows_page_size_and_cursor() {
    let config = SessionConfig::from_json_str(r#"{"page_size": 2}"#).unwrap();
    let session = Session::start(config);
    let query = QueryKey::new("viewer/repositories");

    let request = session.next_request(&query).await.unwrap();
    assert_eq!(request, PageRequest { first: 2, after: None });

    session
        .page_fetched(query.clone(), page(&["1", "2"], Some("c2"), true))
        .await
        .unwrap();
    let request = session.next_request(&query).await.unwrap();
    assert_eq!(request.first, 2);
    assert_eq!(request.after.as_deref(), Some("c2"));

    session
        .page_fetched(query.clone(), page(&["3"], Some("c3"), false))
        .await
        .unwrap();
    assert!(session.next_request(&query).await.is_none());
}

#[tokio::test]
async fn test_empty_page_keeps_rendered_list() {
    let session = Session::start(SessionConfig::default());
    let query = QueryKey::new("viewer/repositories");

    session
        .page_fetched(query.clone(), page(&["1"], Some("c1"), true))
        .await
        .unwrap();
    let info = session
        .page_fetched(query.clone(), page(&[], Some("c1"), true))
        .await
        .unwrap();

    assert_eq!(info, PageInfo::more("c1"));
    assert_eq!(session.list(&query).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_page_reported_and_not_applied() {
    let session = Session::start(SessionConfig::default());
    let query = QueryKey::new("viewer/repositories");
    let mut events = session.subscribe();

    session
        .page_fetched(query.clone(), page(&["1"], Some("c1"), true))
        .await
        .unwrap();

    let bad = Page::new(
        vec![Entity::from_node(Repository::TYPENAME, json!({ "id": "2" })).unwrap()],
        PageInfo {
            end_cursor: None,
            has_next_page: true,
        },
    );
    let err = session.page_fetched(query.clone(), bad).await.unwrap_err();
    assert!(err.is_malformed_page());

    assert_eq!(session.list(&query).await.unwrap().len(), 1);
    assert!(session
        .entity(&EntityId::new(Repository::TYPENAME, "2"))
        .await
        .is_none());

    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::ListUpdated { len: 1, .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::CommandFailed { .. }
    ));
}

#[tokio::test]
async fn test_star_updates_list_snapshot() {
    let session = Session::start(SessionConfig::default());
    let query = QueryKey::new("viewer/repositories");
    let mut events = session.subscribe();

    session
        .page_fetched(query.clone(), page(&["1", "2"], None, false))
        .await
        .unwrap();
    let _ = events.recv().await.unwrap();

    let id = EntityId::new(Repository::TYPENAME, "2");
    let result = MutationResult::new(id.clone(), true);

    // optimistic, then confirmation
    let predicted = session
        .apply_mutation(Toggle::STAR, result.clone())
        .await
        .unwrap();
    assert_eq!(predicted.change, CounterChange::Incremented);
    let confirmed = session.apply_mutation(Toggle::STAR, result).await.unwrap();
    assert_eq!(confirmed.change, CounterChange::Unchanged);

    let list = session.list(&query).await.unwrap();
    let starred = Repository::try_from(&list.items[1]).unwrap();
    assert_eq!(starred.stargazers.total_count, 11);
    assert!(starred.viewer_has_starred);
    let other = Repository::try_from(&list.items[0]).unwrap();
    assert_eq!(other.stargazers.total_count, 10);

    match events.recv().await.unwrap() {
        SessionEvent::EntityUpdated { entity_id, outcome } => {
            assert_eq!(entity_id, id);
            assert_eq!(outcome.counter, 11);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_watch_toggle_through_session() {
    let session = Session::start(SessionConfig::default());
    let query = QueryKey::new("viewer/repositories");
    session
        .page_fetched(query, page(&["1"], None, false))
        .await
        .unwrap();

    let id = EntityId::new(Repository::TYPENAME, "1");
    session
        .apply_mutation(Toggle::WATCH, MutationResult::new(id.clone(), true))
        .await
        .unwrap();

    let entity = session.entity(&id).await.unwrap();
    assert_eq!(entity.data["watchers"]["totalCount"], json!(2));
    assert_eq!(entity.data["viewerSubscription"], json!("SUBSCRIBED"));
}

#[tokio::test]
async fn test_mutation_on_unknown_entity() {
    let session = Session::start(SessionConfig::default());
    let result = MutationResult::new(EntityId::new(Repository::TYPENAME, "nope"), true);

    let err = session
        .apply_mutation(Toggle::STAR, result)
        .await
        .unwrap_err();
    assert_eq!(err, AppError::entity_not_found("Repository:nope"));
}

#[tokio::test]
async fn test_reset_query_drops_list_but_keeps_cache() {
    let session = Session::start(SessionConfig::default());
    let query = QueryKey::new("viewer/repositories");
    session
        .page_fetched(query.clone(), page(&["1"], None, false))
        .await
        .unwrap();

    session.reset_query(query.clone()).await.unwrap();
    // a later command is processed after the reset
    session
        .page_fetched(QueryKey::new("other"), page(&[], None, false))
        .await
        .unwrap();

    assert!(session.list(&query).await.is_none());
    assert!(session
        .entity(&EntityId::new(Repository::TYPENAME, "1"))
        .await
        .is_some());
}

#[tokio::test]
async fn test_commands_after_stop_fail() {
    let session = Session::start(SessionConfig::default());
    session.stop().await.unwrap();

    let err = session
        .page_fetched(QueryKey::new("viewer/repositories"), page(&["1"], None, false))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Session { .. }));
}
