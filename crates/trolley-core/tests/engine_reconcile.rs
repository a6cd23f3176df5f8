// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end reconciliation passes over the public engine API.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{CatalogResolver, CountingHost, MemStore};
use trolley_core::{
    decode_items, AddOk, CartEngine, CartUpdate, EngineConfig, PassMode, ReconcileMode, Sku,
    CART_STATE_KEY,
};

fn engine_with(
    resolver: CatalogResolver,
    config: EngineConfig,
) -> (
    CartEngine<CatalogResolver, CountingHost, MemStore>,
    Arc<MemStore>,
) {
    let store = Arc::new(MemStore::default());
    let engine = CartEngine::new(resolver, CountingHost::default(), Arc::clone(&store), config);
    (engine, store)
}

fn sku(raw: &str) -> Sku {
    Sku::parse(raw).unwrap()
}

#[tokio::test]
async fn remove_then_reconcile_reports_the_removed_id() {
    let resolver = CatalogResolver::new()
        .ready("a", 1.0, 9)
        .ready("b", 2.0, 9)
        .ready("c", 3.0, 9);
    let (mut engine, _store) = engine_with(resolver, EngineConfig::default());

    let updates: Arc<Mutex<Vec<CartUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    engine.subscribe(move |update| sink.lock().unwrap().push(update.clone()));

    for id in ["a", "b", "c"] {
        engine.add(id, 1).unwrap();
    }
    let _ = engine.reconcile().await;

    assert!(engine.remove("b"));
    let _ = engine.reconcile().await;

    let last = updates.lock().unwrap().last().cloned().unwrap();
    assert!(last.changed.contains(&sku("b")));
    assert_eq!(last.total_count, 2);
    assert!((last.total_sum - 4.0).abs() < f64::EPSILON);

    // Index for the survivors is intact.
    assert!(engine.cart().get(&sku("a")).is_some());
    assert!(engine.cart().get(&sku("c")).is_some());
    let mounted: Vec<&str> = engine.rows().mounted_skus().map(Sku::as_str).collect();
    assert_eq!(mounted, vec!["a", "c"]);
}

#[tokio::test]
async fn reconciling_twice_without_mutation_patches_nothing() {
    let resolver = CatalogResolver::new().ready("a", 1.0, 5).ready("b", 1.0, 5);
    let (mut engine, _store) = engine_with(resolver, EngineConfig::default());
    engine.add("a", 1).unwrap();
    engine.add("b", 2).unwrap();

    let _ = engine.reconcile().await;
    let report = engine.reconcile().await;
    assert_eq!(report.mode, PassMode::Noop);
    assert_eq!(report.patches(), 0);
}

#[tokio::test]
async fn deferred_resolution_corrects_an_optimistic_add() {
    let resolver = CatalogResolver::new().deferred("slow", 4.0, 2);
    let (mut engine, _store) = engine_with(resolver, EngineConfig::default());

    assert_eq!(engine.add("slow", 5), Ok(AddOk::AddedUnresolved));
    assert_eq!(engine.cart().get(&sku("slow")).unwrap().quantity, 5);

    let _ = engine.reconcile().await;
    let item = engine.cart().get(&sku("slow")).unwrap();
    assert_eq!(item.quantity, 2, "clamped once stock resolved");
    assert_eq!(item.stock_limit, 2);
    assert!((item.unit_price - 4.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn failed_deferred_lookup_does_not_abort_the_batch() {
    let resolver = CatalogResolver::new().failing("broken").deferred("ok", 2.0, 3);
    let (mut engine, _store) = engine_with(resolver, EngineConfig::default());

    engine.add("broken", 2).unwrap();
    engine.add("ok", 9).unwrap();
    let _ = engine.reconcile().await;

    // The failed lookup left its item untouched; the good one applied.
    assert_eq!(engine.cart().get(&sku("broken")).unwrap().stock_limit, 0);
    assert_eq!(engine.cart().get(&sku("broken")).unwrap().quantity, 2);
    assert_eq!(engine.cart().get(&sku("ok")).unwrap().quantity, 3);
}

#[tokio::test]
async fn sequential_refresh_applies_the_same_corrections() {
    let resolver = CatalogResolver::new().deferred("x", 1.0, 1).deferred("y", 1.0, 2);
    let config = EngineConfig {
        refresh: trolley_core::RefreshStrategy::Sequential,
        ..EngineConfig::default()
    };
    let (mut engine, _store) = engine_with(resolver, config);

    engine.add("x", 5).unwrap();
    engine.add("y", 5).unwrap();
    let _ = engine.reconcile().await;
    assert_eq!(engine.cart().get(&sku("x")).unwrap().quantity, 1);
    assert_eq!(engine.cart().get(&sku("y")).unwrap().quantity, 2);
}

#[tokio::test]
async fn rapid_mutations_collapse_into_one_persisted_write() {
    let resolver = CatalogResolver::new().ready("a", 2.0, 9);
    let config = EngineConfig {
        debounce_ms: 30,
        ..EngineConfig::default()
    };
    let (mut engine, store) = engine_with(resolver, config);

    engine.add("a", 1).unwrap();
    let _ = engine.reconcile().await;
    engine.change_qty("a", 2);
    let _ = engine.reconcile().await;
    engine.change_qty("a", 3);
    let _ = engine.reconcile().await;

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(store.write_count(), 1, "three windows coalesced into one write");

    let items = decode_items(&store.bytes(CART_STATE_KEY).unwrap()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 3, "the write carries the final state");
}

#[tokio::test]
async fn shutdown_flushes_the_pending_write_immediately() {
    let resolver = CatalogResolver::new().ready("a", 2.0, 9);
    let config = EngineConfig {
        debounce_ms: 10_000,
        ..EngineConfig::default()
    };
    let (mut engine, store) = engine_with(resolver, config);

    engine.add("a", 2).unwrap();
    let _ = engine.reconcile().await;
    assert_eq!(store.write_count(), 0, "debounce window still open");

    engine.shutdown();
    assert_eq!(store.write_count(), 1);
    let items = decode_items(&store.bytes(CART_STATE_KEY).unwrap()).unwrap();
    assert_eq!(items[0].quantity, 2);
}

#[tokio::test]
async fn load_collapses_duplicates_and_clamps_to_stock() {
    let resolver = CatalogResolver::new().ready("a", 2.0, 3);
    let (mut engine, store) = engine_with(resolver, EngineConfig::default());
    store.seed(
        CART_STATE_KEY,
        br#"[
            {"id": "A", "quantity": 2, "unitPrice": 2.0},
            {"id": " a ", "quantity": 4, "unitPrice": 2.0},
            {"not": "an item"}
        ]"#,
    );

    let loaded = engine.load().unwrap();
    assert_eq!(loaded, 1);
    let item = engine.cart().get(&sku("a")).unwrap();
    assert_eq!(item.quantity, 3, "summed then clamped to known stock");
}

#[tokio::test]
async fn cross_context_reload_replaces_the_cart_wholesale() {
    let resolver = CatalogResolver::new().ready("a", 1.0, 9).ready("x", 5.0, 9);
    let (mut engine, store) = engine_with(resolver, EngineConfig::default());

    engine.add("a", 1).unwrap();
    let _ = engine.reconcile().await;

    // Another context rewrote the persisted cart.
    store.seed(
        CART_STATE_KEY,
        br#"[{"id": "x", "quantity": 2, "unitPrice": 5.0}]"#,
    );
    let report = engine.reload_from_store().await.unwrap();
    assert_ne!(report.mode, PassMode::Noop);

    assert!(engine.cart().get(&sku("a")).is_none());
    assert_eq!(engine.cart().get(&sku("x")).unwrap().quantity, 2);
    let mounted: Vec<&str> = engine.rows().mounted_skus().map(Sku::as_str).collect();
    assert_eq!(mounted, vec!["x"]);
}

#[tokio::test]
async fn legacy_mode_rebuilds_every_pass() {
    let resolver = CatalogResolver::new().ready("a", 1.0, 5).ready("b", 1.0, 5);
    let config = EngineConfig {
        reconcile: ReconcileMode::FullRebuild,
        ..EngineConfig::default()
    };
    let (mut engine, _store) = engine_with(resolver, config);

    engine.add("a", 1).unwrap();
    engine.add("b", 1).unwrap();
    let first = engine.reconcile().await;
    assert_eq!(first.mode, PassMode::Rebuilt);

    engine.change_qty("a", 2);
    let second = engine.reconcile().await;
    assert_eq!(second.mode, PassMode::Rebuilt);
    assert_eq!(second.built, 2, "degraded mode rebuilds both rows");
}

#[tokio::test]
async fn clear_drops_every_row_and_broadcasts_the_prior_ids() {
    let resolver = CatalogResolver::new().ready("a", 1.0, 5).ready("b", 1.0, 5);
    let (mut engine, _store) = engine_with(resolver, EngineConfig::default());

    let updates: Arc<Mutex<Vec<CartUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    engine.subscribe(move |update| sink.lock().unwrap().push(update.clone()));

    engine.add("a", 1).unwrap();
    engine.add("b", 1).unwrap();
    let _ = engine.reconcile().await;

    engine.clear();
    let _ = engine.reconcile().await;

    let last = updates.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.total_count, 0);
    assert!(last.changed.contains(&sku("a")));
    assert!(last.changed.contains(&sku("b")));
    assert_eq!(engine.rows().mounted_skus().count(), 0);
}

#[tokio::test]
async fn limit_reached_controls_reach_the_row_host() {
    let resolver = CatalogResolver::new().ready("a", 1.0, 2);
    let (mut engine, _store) = engine_with(resolver, EngineConfig::default());

    engine.add("a", 2).unwrap();
    let _ = engine.reconcile().await;

    let controls = engine.rows().host().last_controls.unwrap();
    assert!(controls.limit_reached);
    assert!(!controls.can_increment);
    assert!(controls.can_decrement);
    assert_eq!(controls.qty_max, 2);
}
