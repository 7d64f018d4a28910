// Property-based tests for the rule table
// Arbitrary sequences of administrative operations must never leave two
// rules on one (status, action, ticket type) triple, never create a rule out
// of a terminal status, and resolution must stay a pure function of the table.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use ticket_flow::{
    Action, CacheConfig, InMemoryStore, RuleFilter, RuleId, RulePatch, RuleSpec, Status,
    TicketType, TransitionEngine, TransitionError,
};

const STATUSES: [&str; 4] = ["OPEN", "IN_PROGRESS", "ON_HOLD", "CLOSED"];
const ACTIONS: [&str; 3] = ["START", "PAUSE", "FINISH"];
const TICKET_TYPES: [&str; 2] = ["REPAIR", "INSTALL"];

#[derive(Debug, Clone)]
enum Operation {
    Add {
        from: usize,
        action: usize,
        ticket_type: usize,
        to: usize,
    },
    Retarget {
        rule: usize,
        from: usize,
        action: usize,
    },
    Deactivate {
        rule: usize,
    },
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (0..STATUSES.len(), 0..ACTIONS.len(), 0..TICKET_TYPES.len(), 0..STATUSES.len())
            .prop_map(|(from, action, ticket_type, to)| Operation::Add {
                from,
                action,
                ticket_type,
                to,
            }),
        1 => (0..8usize, 0..STATUSES.len(), 0..ACTIONS.len())
            .prop_map(|(rule, from, action)| Operation::Retarget { rule, from, action }),
        1 => (0..8usize).prop_map(|rule| Operation::Deactivate { rule }),
    ]
}

async fn seeded_engine() -> TransitionEngine<InMemoryStore> {
    let engine =
        TransitionEngine::with_cache_config(Arc::new(InMemoryStore::new()), &CacheConfig::default());
    for code in STATUSES {
        let mut status = Status::new(code, code).unwrap();
        if code == "CLOSED" {
            status = status.terminal();
        }
        engine.statuses().create(status).await.unwrap();
    }
    for code in ACTIONS {
        engine
            .actions()
            .create(Action::new(code, code).unwrap())
            .await
            .unwrap();
    }
    for code in TICKET_TYPES {
        engine
            .ticket_types()
            .create(TicketType::new(code, code).unwrap())
            .await
            .unwrap();
    }
    engine
}

async fn apply(engine: &TransitionEngine<InMemoryStore>, created: &mut Vec<RuleId>, op: &Operation) {
    let result = match op {
        Operation::Add {
            from,
            action,
            ticket_type,
            to,
        } => engine
            .admin()
            .add(&RuleSpec {
                from_status: STATUSES[*from].to_string(),
                action: ACTIONS[*action].to_string(),
                ticket_type: TICKET_TYPES[*ticket_type].to_string(),
                to_status: STATUSES[*to].to_string(),
                description: String::new(),
                is_default: false,
            })
            .await
            .map(|id| created.push(id)),
        Operation::Retarget { rule, from, action } => match created.get(*rule) {
            Some(id) => engine
                .admin()
                .update(
                    *id,
                    &RulePatch {
                        from_status: Some(STATUSES[*from].to_string()),
                        action: Some(ACTIONS[*action].to_string()),
                        ..Default::default()
                    },
                )
                .await
                .map(|_| ()),
            None => Ok(()),
        },
        Operation::Deactivate { rule } => match created.get(*rule) {
            Some(id) => engine.admin().deactivate(*id).await.map(|_| ()),
            None => Ok(()),
        },
    };

    // Only validation failures are expected; the store never fails here
    if let Err(err) = result {
        assert!(
            matches!(
                err,
                TransitionError::DuplicateTransition { .. }
                    | TransitionError::TerminalStatusHasNoOutgoingRule { .. }
            ),
            "unexpected error: {err}"
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_rule_triples_stay_unique(ops in prop::collection::vec(operation_strategy(), 1..40)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let engine = seeded_engine().await;
            let closed = engine.statuses().get_by_code("CLOSED").await.unwrap();
            let mut created = Vec::new();

            for op in &ops {
                apply(&engine, &mut created, op).await;

                let rules = engine.rules().list_rules(&RuleFilter::default()).await.unwrap();
                let keys: HashSet<_> = rules.iter().map(|rule| rule.key()).collect();
                assert_eq!(keys.len(), rules.len(), "duplicate triple after {op:?}");
                assert!(rules.iter().all(|rule| rule.from_status != closed.id));
            }
        });
    }

    #[test]
    fn prop_resolution_is_deterministic(
        ops in prop::collection::vec(operation_strategy(), 1..20),
        status in 0..STATUSES.len(),
        action in 0..ACTIONS.len(),
        ticket_type in 0..TICKET_TYPES.len(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let engine = seeded_engine().await;
            let mut created = Vec::new();
            for op in &ops {
                apply(&engine, &mut created, op).await;
            }

            let (status, action, ticket_type) =
                (STATUSES[status], ACTIONS[action], TICKET_TYPES[ticket_type]);
            let first = engine.resolve_transition(status, action, ticket_type).await;
            let second = engine.resolve_transition(status, action, ticket_type).await;
            match (first, second) {
                (Ok(a), Ok(b)) => assert_eq!(a, b),
                (Err(a), Err(b)) => assert_eq!(a.code(), b.code()),
                (a, b) => panic!("outcomes differ: {a:?} vs {b:?}"),
            }

            if status == "CLOSED" {
                let err = engine
                    .resolve_transition(status, action, ticket_type)
                    .await
                    .unwrap_err();
                assert!(matches!(err, TransitionError::TerminalStatus { .. }));
            }
        });
    }
}
