//! Inbound dispatch: exact handlers, wildcards, scopes and replacement.

mod common;

use std::sync::Arc;

use serde_json::{Value, json};
use tether_core::{HandlerError, Query, QueryError};
use tether_messenger::{FnHandler, FnWildcardHandler, WildcardHandler};

use common::Bridge;

/// Wildcard answering every query type under `prefix` with the rest of the
/// type name.
fn prefix_wildcard(prefix: &'static str) -> Arc<dyn WildcardHandler> {
    Arc::new(FnWildcardHandler::new(move |query: Query| {
        let answer = query
            .query_type
            .strip_prefix(prefix)
            .map(|rest| Ok(Some(json!(rest))));
        std::future::ready(answer)
    }))
}

#[tokio::test]
async fn test_declining_wildcard_falls_through_to_not_implemented() {
    let bridge = Bridge::launched();
    let _decline = bridge
        .page
        .register_wildcard_handler(Arc::new(FnWildcardHandler::new(|_query| async { None })));

    let err = bridge
        .host
        .send_query::<Value>("ghost", None)
        .await
        .unwrap_err();
    assert!(err.is_not_implemented());
}

#[tokio::test]
async fn test_wildcards_are_tried_in_order() {
    let bridge = Bridge::launched();
    let _settings = bridge.page.register_wildcard_handler(prefix_wildcard("settings."));
    let _fallback = bridge
        .page
        .register_wildcard_handler(Arc::new(FnWildcardHandler::new(|_query| async {
            Some(Ok(Some(json!("fallback"))))
        })));

    let claimed: String = bridge
        .host
        .send_query("settings.theme", None)
        .await
        .unwrap();
    assert_eq!(claimed, "theme");

    let fallback: String = bridge.host.send_query("other", None).await.unwrap();
    assert_eq!(fallback, "fallback");
}

#[tokio::test]
async fn test_exact_handler_wins_over_wildcard() {
    let bridge = Bridge::launched();
    let _wildcard = bridge.page.register_wildcard_handler(prefix_wildcard(""));
    let _exact = bridge
        .page
        .register_handler("status", |(): ()| async move { Ok("exact") });

    let status: String = bridge.host.send_query("status", None).await.unwrap();
    assert_eq!(status, "exact");
}

#[tokio::test]
async fn test_scope_unregisters_on_drop() {
    let bridge = Bridge::launched();
    let scope = bridge.page.scope();
    let _ = scope.register_handler("panelOpen", |(): ()| async move { Ok(true) });
    let _ = scope.register_wildcard_handler(prefix_wildcard("panel."));
    assert_eq!(scope.len(), 2);

    let open: bool = bridge.host.send_query("panelOpen", None).await.unwrap();
    assert!(open);

    drop(scope);
    for query_type in ["panelOpen", "panel.size"] {
        let err = bridge
            .host
            .send_query::<Value>(query_type, None)
            .await
            .unwrap_err();
        assert!(err.is_not_implemented(), "{query_type}: {err:?}");
    }
}

#[tokio::test]
async fn test_registration_replaces_previous_handler() {
    let bridge = Bridge::launched();
    let first = bridge
        .page
        .register_handler("version", |(): ()| async move { Ok(1) });
    let _second = bridge
        .page
        .register_handler("version", |(): ()| async move { Ok(2) });

    let version: u32 = bridge.host.send_query("version", None).await.unwrap();
    assert_eq!(version, 2);

    // The stale token no longer owns the registration.
    assert!(!bridge.page.unregister_handler(&first));
    let version: u32 = bridge.host.send_query("version", None).await.unwrap();
    assert_eq!(version, 2);
}

#[tokio::test]
async fn test_unregistered_handler_is_not_implemented() {
    let bridge = Bridge::launched();
    let token = bridge
        .page
        .register_handler("once", |(): ()| async move { Ok(()) });
    bridge.host.send_query::<()>("once", None).await.unwrap();

    assert!(bridge.page.unregister_handler(&token));
    let err = bridge.host.send_query::<()>("once", None).await.unwrap_err();
    assert!(err.is_not_implemented());
}

#[tokio::test]
async fn test_undecodable_payload_fails_with_diagnostic() {
    let bridge = Bridge::launched();
    let _add = bridge
        .page
        .register_handler("add", |(a, b): (i64, i64)| async move { Ok(a.saturating_add(b)) });

    let sum: i64 = bridge
        .host
        .send_query("add", Some(json!([2, 3])))
        .await
        .unwrap();
    assert_eq!(sum, 5);

    match bridge.host.send_query::<i64>("add", Some(json!("two"))).await {
        Err(QueryError::Failed { error, .. }) => {
            let message = error.as_str().unwrap();
            assert!(message.starts_with("invalid 'add' payload"), "{message}");
        },
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_raw_handler_sees_query() {
    let bridge = Bridge::launched();
    let _raw = bridge.page.register_query_handler(
        "describe",
        Arc::new(FnHandler::new(|query: Query| async move {
            if query.payload.is_none() {
                return Err(HandlerError::message("payload required"));
            }
            Ok(Some(json!({"type": query.query_type, "payload": query.payload})))
        })),
    );

    let description: Value = bridge
        .host
        .send_query("describe", Some(json!(1)))
        .await
        .unwrap();
    assert_eq!(description, json!({"type": "describe", "payload": 1}));

    let err = bridge
        .host
        .send_query::<Value>("describe", None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "'describe' query failed: payload required");
}
