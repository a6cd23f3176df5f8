// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Row reconciler: maps cart state onto a rendered row list with minimal
//! patching.
//!
//! The reconciler owns the one-directional id → rendered-row association
//! (arena-style: the normalized id is the stable key, the association drops
//! with the row). The row host never holds a back-reference into the model;
//! it only builds, syncs, and removes rows on request.

use std::collections::BTreeSet;
use std::future::Future;

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::cart::Cart;
use crate::item::LineItem;
use crate::sku::Sku;

/// Interactive affordance state for one row, derived from the model.
///
/// Rows are always synchronized from the *model*, never from their own
/// prior visual state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowControls {
    /// Lower quantity bound (always 1).
    pub qty_min: u32,
    /// Upper quantity bound (the known stock ceiling).
    pub qty_max: u32,
    /// Increment enabled only below a known positive stock ceiling.
    pub can_increment: bool,
    /// Decrement enabled only above one unit.
    pub can_decrement: bool,
    /// Stock-unavailable indicator (`stock_limit ≤ 0`).
    pub out_of_stock: bool,
    /// Transient limit-reached indicator (`quantity == stock_limit > 0`).
    pub limit_reached: bool,
}

impl RowControls {
    /// Derives the affordance state for `item`.
    #[must_use]
    pub fn for_item(item: &LineItem) -> Self {
        let stock = item.stock_limit;
        Self {
            qty_min: 1,
            qty_max: stock,
            can_increment: stock > 0 && item.quantity < stock,
            can_decrement: item.quantity > 1,
            out_of_stock: stock == 0,
            limit_reached: stock > 0 && item.quantity == stock,
        }
    }
}

/// Error from building a row's visual structure.
///
/// Never user-visible: a build failure escalates the pass to a full
/// rebuild instead of leaving a partially-patched list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row build failed: {0}")]
pub struct RowBuildError(pub String);

/// View mount contract: a container of individually addressable rows.
///
/// Implemented by the rendering collaborator. Rows expose a quantity
/// control with numeric bounds, increment/decrement controls, a
/// stock-unavailable indicator, and a favorite-toggle affordance — the
/// host owns all of that visual structure; the reconciler only drives it
/// through this port.
pub trait RowHost {
    /// Opaque rendered row handle.
    type Row;

    /// Builds a fresh row for `item`.
    fn build_row(&mut self, item: &LineItem, controls: &RowControls)
        -> Result<Self::Row, RowBuildError>;

    /// Synchronizes an existing row's affordances from the model.
    fn sync_row(&mut self, row: &mut Self::Row, item: &LineItem, controls: &RowControls);

    /// Removes a row from the surface.
    fn remove_row(&mut self, row: Self::Row);

    /// Drops every row from the surface.
    fn clear(&mut self);

    /// Resolves at the next paint opportunity; patch batches apply after
    /// this boundary to avoid layout thrash.
    fn next_frame(&mut self) -> impl Future<Output = ()>;
}

/// How a pass touched the rendered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Nothing changed and the mounted list matched the cart.
    Noop,
    /// Only the changed rows were patched.
    Patched,
    /// The whole list was rebuilt from the cart.
    Rebuilt,
}

/// Summary of one reconciliation pass over the rendered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPassReport {
    /// Which path the pass took.
    pub mode: PassMode,
    /// Rows freshly built (replacements, insertions, or rebuild).
    pub built: usize,
    /// Rows removed.
    pub removed: usize,
    /// Rows whose affordances were synchronized.
    pub synced: usize,
}

impl RowPassReport {
    const fn noop() -> Self {
        Self {
            mode: PassMode::Noop,
            built: 0,
            removed: 0,
            synced: 0,
        }
    }

    /// Total number of row patches applied this pass.
    #[must_use]
    pub fn patches(&self) -> usize {
        self.built + self.removed
    }
}

struct Mounted<R> {
    sku: Sku,
    row: R,
}

enum Planned<R> {
    Replace { sku: Sku, row: R },
    Insert { sku: Sku, row: R },
    Remove { sku: Sku },
}

/// Reconciles the cart against the mounted row list.
pub struct RowReconciler<H: RowHost> {
    host: H,
    mounted: Vec<Mounted<H::Row>>,
    syncing: FxHashSet<Sku>,
}

impl<H: RowHost> RowReconciler<H> {
    /// Creates a reconciler over `host` with nothing mounted.
    pub fn new(host: H) -> Self {
        Self {
            host,
            mounted: Vec::new(),
            syncing: FxHashSet::default(),
        }
    }

    /// Shared access to the row host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the row host.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Ids currently mounted, in render order.
    pub fn mounted_skus(&self) -> impl Iterator<Item = &Sku> {
        self.mounted.iter().map(|m| &m.sku)
    }

    /// Runs one pass: no-op when nothing changed and the list matches the
    /// cart; full rebuild on first render, an empty cart, or any partial
    /// failure; otherwise patches only the changed rows.
    pub async fn reconcile(&mut self, cart: &Cart, changed: &BTreeSet<Sku>) -> RowPassReport {
        if changed.is_empty() {
            if self.matches(cart) {
                return RowPassReport::noop();
            }
            return self.rebuild_all(cart).await;
        }
        if cart.is_empty() {
            return self.rebuild_all(cart).await;
        }
        match self.patch(cart, changed).await {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(error = %err, "row patch failed; falling back to full rebuild");
                self.rebuild_all(cart).await
            }
        }
    }

    /// Discards the entire rendered list and rebuilds it from the cart, in
    /// order. Individually failing rows are logged and skipped so the rest
    /// of the list still renders.
    pub async fn rebuild_all(&mut self, cart: &Cart) -> RowPassReport {
        self.host.next_frame().await;
        let removed = self.mounted.len();
        self.mounted.clear();
        self.host.clear();
        let mut built = 0usize;
        for item in cart.items() {
            let controls = RowControls::for_item(item);
            match self.host.build_row(item, &controls) {
                Ok(mut row) => {
                    self.host.sync_row(&mut row, item, &controls);
                    self.mounted.push(Mounted {
                        sku: item.sku.clone(),
                        row,
                    });
                    built += 1;
                }
                Err(err) => {
                    tracing::warn!(sku = %item.sku, error = %err, "row build failed during rebuild; skipping row");
                }
            }
        }
        RowPassReport {
            mode: PassMode::Rebuilt,
            built,
            removed,
            synced: built,
        }
    }

    async fn patch(
        &mut self,
        cart: &Cart,
        changed: &BTreeSet<Sku>,
    ) -> Result<RowPassReport, RowBuildError> {
        let removed_dupes = self.prune_duplicates();

        // Plan first: every replacement row is built before anything is
        // touched, so a build failure escalates with the mounted list
        // still intact.
        let mut plan: Vec<Planned<H::Row>> = Vec::with_capacity(changed.len());
        for sku in changed {
            match cart.get(sku) {
                Some(item) => {
                    let controls = RowControls::for_item(item);
                    let row = self.host.build_row(item, &controls)?;
                    if self.mounted_index(sku).is_some() {
                        plan.push(Planned::Replace {
                            sku: sku.clone(),
                            row,
                        });
                    } else {
                        plan.push(Planned::Insert {
                            sku: sku.clone(),
                            row,
                        });
                    }
                }
                None => {
                    if self.mounted_index(sku).is_some() {
                        plan.push(Planned::Remove { sku: sku.clone() });
                    }
                }
            }
        }

        // Apply as one batch at the next paint boundary.
        self.host.next_frame().await;
        let mut built = 0usize;
        let mut removed = removed_dupes;
        for op in plan {
            match op {
                Planned::Replace { sku, row } => {
                    if let Some(at) = self.mounted_index(&sku) {
                        let old = std::mem::replace(&mut self.mounted[at].row, row);
                        self.host.remove_row(old);
                    } else {
                        self.insert_in_order(cart, sku, row);
                    }
                    built += 1;
                }
                Planned::Insert { sku, row } => {
                    self.insert_in_order(cart, sku, row);
                    built += 1;
                }
                Planned::Remove { sku } => {
                    if let Some(at) = self.mounted_index(&sku) {
                        let gone = self.mounted.remove(at);
                        self.host.remove_row(gone.row);
                        removed += 1;
                    }
                }
            }
        }

        // Row sync from the model, fresh and surviving rows alike.
        let mut synced = 0usize;
        for sku in changed {
            if self.sync_one(cart, sku) {
                synced += 1;
            }
        }

        Ok(RowPassReport {
            mode: PassMode::Patched,
            built,
            removed,
            synced,
        })
    }

    /// Synchronizes one mounted row's affordances from the model.
    ///
    /// Non-reentrant per row: a nested call for a row already being
    /// synchronized returns `false` without touching the host.
    fn sync_one(&mut self, cart: &Cart, sku: &Sku) -> bool {
        let Some(item) = cart.get(sku) else {
            return false;
        };
        let Some(at) = self.mounted_index(sku) else {
            return false;
        };
        if !self.syncing.insert(sku.clone()) {
            return false;
        }
        let controls = RowControls::for_item(item);
        self.host.sync_row(&mut self.mounted[at].row, item, &controls);
        self.syncing.remove(sku);
        true
    }

    /// More than one mounted row for the same id is a corruption signal:
    /// keep the first, discard the rest.
    fn prune_duplicates(&mut self) -> usize {
        let mut seen: FxHashSet<Sku> = FxHashSet::default();
        let mut at = 0usize;
        let mut removed = 0usize;
        while at < self.mounted.len() {
            if seen.insert(self.mounted[at].sku.clone()) {
                at += 1;
            } else {
                let dupe = self.mounted.remove(at);
                tracing::warn!(sku = %dupe.sku, "duplicate mounted row; discarding");
                self.host.remove_row(dupe.row);
                removed += 1;
            }
        }
        removed
    }

    fn mounted_index(&self, sku: &Sku) -> Option<usize> {
        self.mounted.iter().position(|m| m.sku == *sku)
    }

    fn insert_in_order(&mut self, cart: &Cart, sku: Sku, row: H::Row) {
        let pos = cart.position(&sku).unwrap_or(usize::MAX);
        let at = self
            .mounted
            .iter()
            .position(|m| cart.position(&m.sku).is_none_or(|p| p > pos))
            .unwrap_or(self.mounted.len());
        self.mounted.insert(at, Mounted { sku, row });
    }

    fn matches(&self, cart: &Cart) -> bool {
        self.mounted.len() == cart.len()
            && self
                .mounted
                .iter()
                .zip(cart.items())
                .all(|(m, item)| m.sku == item.sku)
    }
}
