//! End-to-end activation behavior against the in-memory store

use async_trait::async_trait;
use dispatch_activation::telemetry::{PAYLOAD_NOT_FOUND, SEARCHES, STORAGE_FAILURES};
use dispatch_activation::{
    ActivationConfig, ActivationEngine, ActivationError, ActivationStrategy, DispatchConfig,
    InMemoryUnitRegistry, RandomSource, UnitRegistry,
};
use dispatch_storage::{InMemoryKeyValueStore, KeyValueStore, StorageError, StorageResult};
use dispatch_types::{
    ArgKind, ArgValue, ExecutionContext, Payload, Signature, UnitDescriptor, UnitId,
};
use std::collections::HashSet;
use std::sync::Arc;

struct FirstMatch;

impl RandomSource for FirstMatch {
    fn pick(&self, _len: usize) -> usize {
        0
    }
}

/// Always takes the second match
struct SecondMatch;

impl RandomSource for SecondMatch {
    fn pick(&self, len: usize) -> usize {
        1.min(len - 1)
    }
}

/// Reads succeed, writes fail
struct ReadOnlyStore;

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::Timeout("write deadline exceeded".to_string()))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Timeout("write deadline exceeded".to_string()))
    }
}

fn sum(id: &str) -> UnitDescriptor {
    UnitDescriptor::new(id, Signature::new(vec![ArgKind::Float64, ArgKind::Float64]))
}

fn emit(destination: &str, source: &str, arg: ArgValue) -> Payload {
    Payload::new(
        ExecutionContext::new().with_session(source),
        vec![arg],
        UnitId::new(destination),
        UnitId::new(source),
    )
}

fn engine_with_store(store: Arc<InMemoryKeyValueStore>) -> ActivationEngine {
    ActivationEngine::new(store, ActivationConfig::default()).with_random(Arc::new(FirstMatch))
}

fn sources(activation_sources: &[UnitId]) -> Vec<&str> {
    activation_sources.iter().map(UnitId::as_str).collect()
}

#[tokio::test]
async fn test_sum_waits_then_activates_and_learns_binding() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let engine = engine_with_store(store.clone());
    let unit = sum("sum");

    let first = emit("sum", "x", ArgValue::Float64(3.0));
    let first_context = first.context.clone();
    let result = engine.activate(&unit, first).await;
    assert!(matches!(result, Err(ActivationError::PayloadNotFound { .. })));

    let activation = engine
        .activate(&unit, emit("sum", "y", ArgValue::Float64(4.0)))
        .await
        .unwrap();

    assert_eq!(activation.strategy, ActivationStrategy::Search);
    assert_eq!(activation.payload.destination, UnitId::new("sum"));
    assert_eq!(
        activation.payload.args,
        vec![ArgValue::Float64(3.0), ArgValue::Float64(4.0)]
    );
    assert_eq!(activation.payload.context, first_context);
    assert_eq!(sources(&activation.binding), vec!["x", "y"]);

    assert_eq!(
        store
            .get("activate:configuration:sum:source-ids")
            .await
            .unwrap(),
        Some("x,y".to_string())
    );
    assert_eq!(
        store.get("activate:queue:sum:payload").await.unwrap(),
        Some("[]".to_string())
    );
}

#[tokio::test]
async fn test_cached_binding_replays_in_either_arrival_order() {
    let engine = engine_with_store(Arc::new(InMemoryKeyValueStore::new()));
    let unit = sum("sum");

    let _ = engine
        .activate(&unit, emit("sum", "x", ArgValue::Float64(1.0)))
        .await;
    engine
        .activate(&unit, emit("sum", "y", ArgValue::Float64(2.0)))
        .await
        .unwrap();

    // x first
    let _ = engine
        .activate(&unit, emit("sum", "x", ArgValue::Float64(10.0)))
        .await;
    let searches_before = engine.telemetry().snapshot().counter(SEARCHES);
    let activation = engine
        .activate(&unit, emit("sum", "y", ArgValue::Float64(20.0)))
        .await
        .unwrap();
    assert_eq!(activation.strategy, ActivationStrategy::CachedBinding);
    assert_eq!(
        activation.payload.args,
        vec![ArgValue::Float64(10.0), ArgValue::Float64(20.0)]
    );
    assert_eq!(
        engine.telemetry().snapshot().counter(SEARCHES),
        searches_before
    );

    // y first: the binding order still decides argument order
    let _ = engine
        .activate(&unit, emit("sum", "y", ArgValue::Float64(200.0)))
        .await;
    let searches_before = engine.telemetry().snapshot().counter(SEARCHES);
    let activation = engine
        .activate(&unit, emit("sum", "x", ArgValue::Float64(100.0)))
        .await
        .unwrap();
    assert_eq!(activation.strategy, ActivationStrategy::CachedBinding);
    assert_eq!(
        activation.payload.args,
        vec![ArgValue::Float64(100.0), ArgValue::Float64(200.0)]
    );
    assert_eq!(sources(&activation.binding), vec!["x", "y"]);
    assert_eq!(
        engine.telemetry().snapshot().counter(SEARCHES),
        searches_before
    );
}

#[tokio::test]
async fn test_backlog_never_exceeds_bound() {
    let engine = engine_with_store(Arc::new(InMemoryKeyValueStore::new()));
    let unit = sum("sum");
    let bound = engine.config().backlog_bound(unit.input_count());
    assert_eq!(bound, 3);

    for i in 0..10 {
        let payload = emit("sum", &format!("label-{i}"), ArgValue::String(format!("v{i}")));
        let result = engine.activate(&unit, payload).await;
        assert!(matches!(result, Err(ActivationError::PayloadNotFound { .. })));

        let backlog = engine.backlog(&unit.id).await.unwrap();
        assert!(backlog.len() <= bound);
    }

    let backlog = engine.backlog(&unit.id).await.unwrap();
    let kept = backlog
        .iter()
        .filter_map(|p| p.args[0].as_str())
        .collect::<Vec<_>>();
    assert_eq!(kept, vec!["v7", "v8", "v9"]);
    assert_eq!(
        engine.telemetry().snapshot().not_found_for(&unit.id),
        10
    );
    assert_eq!(engine.telemetry().snapshot().counter(PAYLOAD_NOT_FOUND), 10);
}

#[tokio::test]
async fn test_stale_binding_falls_back_to_search_after_reregistration() {
    let engine = engine_with_store(Arc::new(InMemoryKeyValueStore::new()));
    let mut registry = InMemoryUnitRegistry::new();
    registry.register(sum("fmt")).unwrap();

    let _ = engine
        .dispatch(&registry, emit("fmt", "x", ArgValue::Float64(1.0)))
        .await;
    engine
        .dispatch(&registry, emit("fmt", "y", ArgValue::Float64(2.0)))
        .await
        .unwrap();

    // Same unit, new input signature
    registry
        .register(UnitDescriptor::new(
            "fmt",
            Signature::new(vec![ArgKind::Float64, ArgKind::String]),
        ))
        .unwrap();

    let _ = engine
        .dispatch(&registry, emit("fmt", "x", "label".into()))
        .await;
    let activation = engine
        .dispatch(&registry, emit("fmt", "y", ArgValue::Float64(4.0)))
        .await
        .unwrap();

    assert_eq!(activation.strategy, ActivationStrategy::Search);
    assert_eq!(sources(&activation.binding), vec!["y", "x"]);
    assert_eq!(
        activation.payload.args,
        vec![ArgValue::Float64(4.0), ArgValue::String("label".into())]
    );
    assert_eq!(
        engine.binding(&UnitId::new("fmt")).await.unwrap(),
        Some(vec![UnitId::new("y"), UnitId::new("x")])
    );
}

#[tokio::test]
async fn test_concurrent_activations_never_share_contributors() {
    let engine = Arc::new(engine_with_store(Arc::new(InMemoryKeyValueStore::new())));
    let mut registry = InMemoryUnitRegistry::new();
    registry.register(sum("sum")).unwrap();
    for i in 0..4 {
        registry.register(sum(&format!("other-{i}"))).unwrap();
    }
    let registry = Arc::new(registry);

    let mut handles = Vec::new();
    for i in 0..20 {
        for (source, offset) in [("x", 0.0), ("y", 1000.0)] {
            let engine = engine.clone();
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let payload = emit("sum", source, ArgValue::Float64(offset + i as f64));
                engine.dispatch(registry.as_ref(), payload).await
            }));
        }
        let engine = engine.clone();
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let payload = emit(
                &format!("other-{}", i % 4),
                &format!("src-{}", i % 2),
                ArgValue::Float64(i as f64),
            );
            engine.dispatch(registry.as_ref(), payload).await
        }));
    }

    let mut seen = HashSet::new();
    let mut consumed = 0;
    for result in futures::future::join_all(handles).await {
        match result.unwrap() {
            Ok(activation) => {
                assert_eq!(activation.payload.args.len(), 2);
                if activation.payload.destination == UnitId::new("sum") {
                    for arg in &activation.payload.args {
                        let value = arg.as_f64().unwrap();
                        assert!(seen.insert(value.to_bits()), "payload consumed twice");
                    }
                    consumed += 2;
                }
            }
            Err(e) => assert!(e.is_payload_not_found(), "unexpected error: {e}"),
        }
    }

    let remaining = engine.backlog(&UnitId::new("sum")).await.unwrap();
    assert!(remaining.len() <= 3);
    assert!(consumed + remaining.len() <= 40);
    for payload in &remaining {
        let value = payload.args[0].as_f64().unwrap();
        assert!(!seen.contains(&value.to_bits()));
    }

    for i in 0..4 {
        let unit = registry.unit(&UnitId::new(format!("other-{i}"))).unwrap();
        assert!(engine.backlog(&unit.id).await.unwrap().len() <= 3);
    }
}

#[tokio::test]
async fn test_storage_failure_is_reported_with_context() {
    let engine = ActivationEngine::new(Arc::new(ReadOnlyStore), ActivationConfig::default());

    let result = engine
        .activate(&sum("sum"), emit("sum", "x", ArgValue::Float64(1.0)))
        .await;
    match result {
        Err(ActivationError::Storage {
            destination,
            backlog_len,
            source,
        }) => {
            assert_eq!(destination, UnitId::new("sum"));
            assert_eq!(backlog_len, 1);
            assert!(matches!(source, StorageError::Timeout(_)));
        }
        other => panic!("expected storage error, got {other:?}"),
    }
    assert_eq!(engine.telemetry().snapshot().counter(STORAGE_FAILURES), 1);
}

#[tokio::test]
async fn test_seeded_engines_choose_identically() -> anyhow::Result<()> {
    let config = DispatchConfig {
        activation: ActivationConfig {
            rng_seed: Some(7),
            ..ActivationConfig::default()
        },
        ..DispatchConfig::default()
    };
    let a = ActivationEngine::from_config(&config).await?;
    let b = ActivationEngine::from_config(&config).await?;

    let mut chosen = (Vec::new(), Vec::new());
    for round in 0..16 {
        let unit = sum(&format!("sum-{round}"));
        let id = unit.id.as_str().to_string();
        for (engine, out) in [(&a, &mut chosen.0), (&b, &mut chosen.1)] {
            let _ = engine
                .activate(&unit, emit(&id, "x", ArgValue::Float64(1.0)))
                .await;
            let activation = engine
                .activate(&unit, emit(&id, "y", ArgValue::Float64(2.0)))
                .await?;
            out.push(activation.binding);
        }
    }

    assert_eq!(chosen.0, chosen.1);
    Ok(())
}

#[tokio::test]
async fn test_random_pick_decides_binding_and_argument_order() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let engine = ActivationEngine::new(store.clone(), ActivationConfig::default())
        .with_random(Arc::new(SecondMatch));
    let unit = sum("sum");

    let _ = engine
        .activate(&unit, emit("sum", "x", ArgValue::Float64(3.0)))
        .await;
    let activation = engine
        .activate(&unit, emit("sum", "y", ArgValue::Float64(4.0)))
        .await
        .unwrap();

    assert_eq!(activation.strategy, ActivationStrategy::Search);
    assert_eq!(sources(&activation.binding), vec!["y", "x"]);
    assert_eq!(
        activation.payload.args,
        vec![ArgValue::Float64(4.0), ArgValue::Float64(3.0)]
    );
    assert_eq!(activation.payload.context.session_id.as_deref(), Some("y"));
    assert_eq!(
        store
            .get("activate:configuration:sum:source-ids")
            .await
            .unwrap(),
        Some("y,x".to_string())
    );
}

#[tokio::test]
async fn test_non_finite_payload_is_rejected_without_touching_backlog() {
    let engine = engine_with_store(Arc::new(InMemoryKeyValueStore::new()));
    let unit = sum("sum");

    let result = engine
        .activate(&unit, emit("sum", "x", ArgValue::Float64(f64::NAN)))
        .await;
    match result {
        Err(e @ ActivationError::InvalidPayload { .. }) => assert!(e.is_contract_violation()),
        other => panic!("expected invalid payload, got {other:?}"),
    }
    let result = engine
        .activate(
            &unit,
            emit("sum", "x", ArgValue::Float64List(vec![1.0, f64::INFINITY])),
        )
        .await;
    assert!(matches!(result, Err(ActivationError::InvalidPayload { .. })));
    assert!(engine.backlog(&unit.id).await.unwrap().is_empty());

    let result = engine
        .activate(&unit, emit("sum", "y", ArgValue::Float64(4.0)))
        .await;
    assert!(matches!(result, Err(ActivationError::PayloadNotFound { .. })));
    let activation = engine
        .activate(&unit, emit("sum", "z", ArgValue::Float64(5.0)))
        .await
        .unwrap();
    assert_eq!(
        activation.payload.args,
        vec![ArgValue::Float64(4.0), ArgValue::Float64(5.0)]
    );
}

#[tokio::test]
async fn test_source_with_binding_separator_is_rejected_at_ingestion() {
    let engine = engine_with_store(Arc::new(InMemoryKeyValueStore::new()));
    let unit = sum("sum");

    let result = engine
        .activate(&unit, emit("sum", "a,b", ArgValue::Float64(1.0)))
        .await;
    match result {
        Err(ActivationError::InvalidSources { backlog_len, .. }) => assert_eq!(backlog_len, 0),
        other => panic!("expected invalid sources, got {other:?}"),
    }
    assert!(engine.backlog(&unit.id).await.unwrap().is_empty());

    let _ = engine
        .activate(&unit, emit("sum", "y", ArgValue::Float64(4.0)))
        .await;
    let activation = engine
        .activate(&unit, emit("sum", "x", ArgValue::Float64(3.0)))
        .await
        .unwrap();
    assert_eq!(sources(&activation.binding), vec!["y", "x"]);
    assert!(engine.backlog(&unit.id).await.unwrap().is_empty());
}
