// Rule cache visibility: writes through an engine are seen by that engine at
// once; writes made elsewhere on the same store show up after the TTL

use std::sync::Arc;
use std::time::Duration;
use ticket_flow::{
    default_repair_workflow, Action, CacheConfig, InMemoryStore, RuleSpec, TransitionEngine,
    TransitionError,
};

fn cache(enabled: bool, ttl_seconds: u64) -> CacheConfig {
    CacheConfig {
        enabled,
        ttl_seconds,
        max_capacity: 1_000,
    }
}

/// Two engines over one store, standing in for two processes
async fn shared_store(reader_cache: CacheConfig) -> (TransitionEngine<InMemoryStore>, TransitionEngine<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let writer = TransitionEngine::with_cache_config(Arc::clone(&store), &cache(true, 60));
    let reader = TransitionEngine::with_cache_config(store, &reader_cache);

    default_repair_workflow().apply(&writer).await.unwrap();
    writer
        .actions()
        .create(Action::new("ESCALATE", "Escalate").unwrap())
        .await
        .unwrap();
    writer
        .admin()
        .add(&RuleSpec {
            from_status: "OPEN".to_string(),
            action: "ESCALATE".to_string(),
            ticket_type: "REPAIR".to_string(),
            to_status: "IN_PROGRESS".to_string(),
            description: String::new(),
            is_default: false,
        })
        .await
        .unwrap();
    (writer, reader)
}

async fn deactivate_escalation(engine: &TransitionEngine<InMemoryStore>) {
    let views = engine
        .admin()
        .list(&ticket_flow::RuleQuery {
            from_status: Some("OPEN".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let rule = views
        .iter()
        .find(|view| view.action.as_str() == "ESCALATE")
        .unwrap();
    engine.admin().deactivate(rule.id).await.unwrap();
}

#[tokio::test]
async fn test_foreign_write_visible_after_ttl() {
    let (writer, reader) = shared_store(cache(true, 1)).await;

    reader
        .resolve_transition("OPEN", "ESCALATE", "REPAIR")
        .await
        .unwrap();
    deactivate_escalation(&writer).await;

    // Local write: visible to the writer immediately
    let err = writer
        .resolve_transition("OPEN", "ESCALATE", "REPAIR")
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::TransitionDisabled { .. }));

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let err = reader
        .resolve_transition("OPEN", "ESCALATE", "REPAIR")
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::TransitionDisabled { .. }));
}

#[tokio::test]
async fn test_disabled_cache_reads_through() {
    let (writer, reader) = shared_store(cache(false, 60)).await;

    reader
        .resolve_transition("OPEN", "ESCALATE", "REPAIR")
        .await
        .unwrap();
    deactivate_escalation(&writer).await;

    let err = reader
        .resolve_transition("OPEN", "ESCALATE", "REPAIR")
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::TransitionDisabled { .. }));
}

#[tokio::test]
async fn test_cached_miss_is_invalidated_by_add() {
    let (writer, _) = shared_store(cache(true, 60)).await;

    // (OPEN, RESUME, REPAIR) has no rule; the miss is cached
    let err = writer
        .resolve_transition("OPEN", "RESUME", "REPAIR")
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::NoMatchingTransition { .. }));

    writer
        .admin()
        .add(&RuleSpec {
            from_status: "OPEN".to_string(),
            action: "RESUME".to_string(),
            ticket_type: "REPAIR".to_string(),
            to_status: "IN_PROGRESS".to_string(),
            description: String::new(),
            is_default: false,
        })
        .await
        .unwrap();
    writer
        .resolve_transition("OPEN", "RESUME", "REPAIR")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_refresh_makes_foreign_write_visible() {
    let (writer, reader) = shared_store(cache(true, 60)).await;

    reader
        .resolve_transition("OPEN", "ESCALATE", "REPAIR")
        .await
        .unwrap();
    deactivate_escalation(&writer).await;
    reader.refresh_rules().await;

    let err = reader
        .resolve_transition("OPEN", "ESCALATE", "REPAIR")
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::TransitionDisabled { .. }));
}
