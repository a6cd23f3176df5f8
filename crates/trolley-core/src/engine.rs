// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cart engine: mutation entry points and the reconciliation pass.
//!
//! Mutations are synchronous against the model and the dirty set; the
//! embedder then drives [`CartEngine::reconcile`], an async pass that
//! refreshes stock data, patches only the changed rows, schedules a
//! debounced persistence write, and broadcasts one consolidated summary.
//! Overlapping passes are tolerated: every pass drains the live dirty set
//! and re-reads the live cart rather than capturing stale snapshots.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;

use crate::broadcast::{CartUpdate, UpdateBus};
use crate::cart::Cart;
use crate::config::{EngineConfig, ReconcileMode};
use crate::dirty::DirtySet;
use crate::item::LineItem;
use crate::persist::{self, DebouncedWriter, StateError, StateStore};
use crate::resolver::{apply_snapshot, ProductSnapshot, RefreshStrategy, Resolution, StockResolver};
use crate::sku::Sku;
use crate::view::{RowHost, RowPassReport, RowReconciler};

/// Store key under which the cart is persisted.
pub const CART_STATE_KEY: &str = "cart";
/// Store key under which favorites are persisted.
pub const FAVORITES_STATE_KEY: &str = "favorites";
/// Store key under which the engine configuration is persisted.
pub const CONFIG_STATE_KEY: &str = "engine";

/// Successful outcome of an add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOk {
    /// The full requested quantity was granted.
    Added,
    /// The item was admitted optimistically with zero known stock; the next
    /// pass's batch refresh is the correction point.
    AddedUnresolved,
    /// Stock covered only part of the request; the cart holds `available`.
    Partial {
        /// Quantity originally requested.
        requested: u32,
        /// Known stock actually granted.
        available: u32,
    },
}

/// Domain-level rejection of an add. The only user-visible failures the
/// engine produces; infrastructure failures are logged, never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AddReject {
    /// The id normalized to an empty string.
    #[error("empty or invalid item id")]
    InvalidId,
    /// Known stock is zero.
    #[error("item is out of stock")]
    OutOfStock,
    /// Merging into the existing entry would exceed known stock; the whole
    /// merge is rejected, no partial merge.
    #[error("requested quantity exceeds available stock ({available})")]
    ExceedsStock {
        /// The stock ceiling the merge was checked against.
        available: u32,
    },
}

/// The reconciliation engine: cart model, dirty tracking, stock refresh,
/// row patching, debounced persistence, and update broadcast.
pub struct CartEngine<R, H, S>
where
    H: RowHost,
{
    cart: Cart,
    dirty: DirtySet,
    resolver: R,
    rows: RowReconciler<H>,
    bus: UpdateBus,
    store: Arc<S>,
    writer: DebouncedWriter<S>,
    config: EngineConfig,
}

impl<R, H, S> CartEngine<R, H, S>
where
    R: StockResolver,
    H: RowHost,
    S: StateStore + Send + Sync + 'static,
{
    /// Creates an engine with an empty cart.
    pub fn new(resolver: R, host: H, store: Arc<S>, config: EngineConfig) -> Self {
        let writer = DebouncedWriter::new(Arc::clone(&store), CART_STATE_KEY, config.debounce());
        Self {
            cart: Cart::new(),
            dirty: DirtySet::new(),
            resolver,
            rows: RowReconciler::new(host),
            bus: UpdateBus::new(),
            store,
            writer,
            config,
        }
    }

    /// The live cart model.
    #[must_use]
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The row reconciler (and through it, the row host).
    #[must_use]
    pub fn rows(&self) -> &RowReconciler<H> {
        &self.rows
    }

    /// Returns `true` while mutations are waiting for a pass.
    #[must_use]
    pub fn needs_reconcile(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Registers an update subscriber (badge, mini-list, totals display).
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: Fn(&CartUpdate) + Send + 'static,
    {
        self.bus.subscribe(subscriber);
    }

    /// One-time load from the persister. Malformed entries are dropped,
    /// duplicates collapse, and quantities reduce to synchronously
    /// resolvable stock. A missing key leaves the cart empty.
    pub fn load(&mut self) -> Result<usize, StateError> {
        let items = match self.store.load_raw(CART_STATE_KEY) {
            Ok(bytes) => decode_items_lossy(&bytes),
            Err(StateError::NotFound) => return Ok(0),
            Err(err) => return Err(err),
        };
        self.install_items(items);
        Ok(self.cart.len())
    }

    /// Adds `qty` units of the item identified by `raw`.
    ///
    /// Stock resolution that is deferred or unknown admits the item
    /// optimistically with zero known stock; known-zero stock rejects; known
    /// stock below the request grants a clamped partial add. Adding to an
    /// existing entry sums quantities and reclamps against the larger of the
    /// existing and newly-resolved stock — exceeding it rejects the whole
    /// merge.
    pub fn add(&mut self, raw: &str, qty: u32) -> Result<AddOk, AddReject> {
        let Some(sku) = Sku::parse(raw) else {
            return Err(AddReject::InvalidId);
        };
        let requested = qty.max(1);
        let snapshot = match self.resolver.lookup(&sku) {
            Resolution::Ready(snap) => Some(snap),
            Resolution::Deferred(_) | Resolution::Unknown => None,
        };
        if snapshot.as_ref().is_some_and(|s| s.stock_limit == 0) {
            return Err(AddReject::OutOfStock);
        }

        if let Some(item) = self.cart.get_mut(&sku) {
            // Merge path: sum and reclamp against the larger of the existing
            // and newly-resolved stock; exceeding it rejects the whole merge.
            let resolved_stock = snapshot.as_ref().map_or(0, |s| s.stock_limit);
            let stock = item.stock_limit.max(resolved_stock);
            let merged = item.quantity.saturating_add(requested);
            if stock > 0 && merged > stock {
                return Err(AddReject::ExceedsStock { available: stock });
            }
            item.quantity = merged;
            let unresolved = stock == 0;
            if let Some(snap) = &snapshot {
                let _ = apply_snapshot(item, snap);
            }
            self.dirty.mark(sku);
            return if unresolved {
                Ok(AddOk::AddedUnresolved)
            } else {
                Ok(AddOk::Added)
            };
        }

        match snapshot {
            Some(snap) => {
                let available = snap.stock_limit;
                let granted = requested.min(available);
                let mut item = LineItem::new(sku.clone(), granted);
                let _ = apply_snapshot(&mut item, &snap);
                self.cart.push(item);
                self.dirty.mark(sku);
                if granted < requested {
                    Ok(AddOk::Partial {
                        requested,
                        available,
                    })
                } else {
                    Ok(AddOk::Added)
                }
            }
            None => {
                self.cart.push(LineItem::new(sku.clone(), requested));
                self.dirty.mark(sku);
                Ok(AddOk::AddedUnresolved)
            }
        }
    }

    /// Removes the entry for `raw`. Returns whether anything was removed.
    pub fn remove(&mut self, raw: &str) -> bool {
        let Some(sku) = Sku::parse(raw) else {
            return false;
        };
        if self.cart.remove(&sku).is_none() {
            return false;
        }
        self.dirty.mark(sku);
        true
    }

    /// Sets the quantity for `raw`, clamped to ≥ 1 and to synchronously
    /// resolvable stock. No-ops (returns `false`) when the id is absent.
    pub fn change_qty(&mut self, raw: &str, new_qty: u32) -> bool {
        let Some(sku) = Sku::parse(raw) else {
            return false;
        };
        let snapshot = match self.resolver.lookup(&sku) {
            Resolution::Ready(snap) => Some(snap),
            Resolution::Deferred(_) | Resolution::Unknown => None,
        };
        let Some(item) = self.cart.get_mut(&sku) else {
            return false;
        };
        let stock = snapshot.as_ref().map_or(item.stock_limit, |s| s.stock_limit);
        let mut qty = new_qty.max(1);
        if stock > 0 {
            qty = qty.min(stock);
        }
        item.quantity = qty;
        if let Some(snap) = &snapshot {
            let _ = apply_snapshot(item, snap);
        }
        self.dirty.mark(sku);
        true
    }

    /// Empties the cart, marking every prior id dirty so their rows drop on
    /// the next pass.
    pub fn clear(&mut self) {
        let prior = self.cart.clear();
        self.dirty.mark_all(prior);
    }

    /// Runs one reconciliation pass.
    ///
    /// Drains the dirty set, refreshes stock for every line item (tolerating
    /// per-item failures), patches only the changed rows (or rebuilds, per
    /// the configured mode), schedules a persistence write when anything
    /// changed, and broadcasts one consolidated summary — on the patched,
    /// rebuilt, and no-op paths alike.
    pub async fn reconcile(&mut self) -> RowPassReport {
        let mut changed = self.dirty.drain();
        changed.extend(self.refresh_stock().await);

        let report = match self.config.reconcile {
            ReconcileMode::Patch => self.rows.reconcile(&self.cart, &changed).await,
            ReconcileMode::FullRebuild => self.rows.rebuild_all(&self.cart).await,
        };

        if !changed.is_empty() {
            match persist::encode_items(self.cart.items()) {
                Ok(bytes) => self.writer.schedule(bytes),
                Err(err) => tracing::warn!(error = %err, "failed to encode cart for persistence"),
            }
        }
        self.bus.publish(&CartUpdate::capture(&self.cart, changed));
        report
    }

    /// Cross-context notification handler: reloads the full cart from the
    /// store (a missing key now means "emptied elsewhere") and runs a full
    /// pass. No partial merge across contexts.
    pub async fn reload_from_store(&mut self) -> Result<RowPassReport, StateError> {
        let prior: Vec<Sku> = self.cart.items().iter().map(|it| it.sku.clone()).collect();
        let items = match self.store.load_raw(CART_STATE_KEY) {
            Ok(bytes) => decode_items_lossy(&bytes),
            Err(StateError::NotFound) => Vec::new(),
            Err(err) => return Err(err),
        };
        self.install_items(items);
        self.dirty.mark_all(prior);
        Ok(self.reconcile().await)
    }

    /// Teardown hook: cancels any pending debounce and writes the cart
    /// immediately so no mutation is lost.
    pub fn shutdown(&mut self) {
        match persist::encode_items(self.cart.items()) {
            Ok(bytes) => self.writer.flush(&bytes),
            Err(err) => tracing::warn!(error = %err, "failed to encode cart for flush"),
        }
    }

    fn install_items(&mut self, items: Vec<LineItem>) {
        let mut cart = Cart::from_items(items);
        let skus: Vec<Sku> = cart.items().iter().map(|it| it.sku.clone()).collect();
        for sku in &skus {
            if let Resolution::Ready(snap) = self.resolver.lookup(sku) {
                if let Some(item) = cart.get_mut(sku) {
                    let _ = apply_snapshot(item, &snap);
                }
            }
        }
        self.cart = cart;
        self.dirty.mark_all(skus);
    }

    /// Batch refresh: one lookup per line item, applied as results land.
    /// A failed or missing resolution is "no update" for that item and
    /// never aborts the batch; an item that left the cart while its lookup
    /// was in flight is skipped.
    async fn refresh_stock(&mut self) -> BTreeSet<Sku> {
        let mut changed = BTreeSet::new();
        let mut deferred = Vec::new();
        let skus: Vec<Sku> = self.cart.items().iter().map(|it| it.sku.clone()).collect();
        for sku in skus {
            match self.resolver.lookup(&sku) {
                Resolution::Ready(snap) => {
                    if self.apply_to_item(&sku, &snap) {
                        changed.insert(sku);
                    }
                }
                Resolution::Deferred(fut) => deferred.push((sku, fut)),
                Resolution::Unknown => {}
            }
        }

        match self.config.refresh {
            RefreshStrategy::Sequential => {
                for (sku, fut) in deferred {
                    if let Some(snap) = fut.await {
                        if self.apply_to_item(&sku, &snap) {
                            changed.insert(sku);
                        }
                    }
                }
            }
            RefreshStrategy::Concurrent => {
                let settled =
                    join_all(deferred.into_iter().map(|(sku, fut)| async move {
                        (sku, fut.await)
                    }))
                    .await;
                for (sku, outcome) in settled {
                    if let Some(snap) = outcome {
                        if self.apply_to_item(&sku, &snap) {
                            changed.insert(sku);
                        }
                    }
                }
            }
        }
        changed
    }

    fn apply_to_item(&mut self, sku: &Sku, snapshot: &ProductSnapshot) -> bool {
        let Some(item) = self.cart.get_mut(sku) else {
            return false;
        };
        apply_snapshot(item, snapshot).changed
    }
}

/// An unreadable cart blob starts the cart empty instead of failing the
/// load; per-entry leniency lives in [`persist::decode_items`].
fn decode_items_lossy(bytes: &[u8]) -> Vec<LineItem> {
    persist::decode_items(bytes).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "persisted cart unreadable; starting empty");
        Vec::new()
    })
}
