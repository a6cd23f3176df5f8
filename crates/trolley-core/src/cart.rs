// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ordered cart model with an id → position index.
//!
//! The sequence is the source of truth; the index is a derived accelerator
//! maintained incrementally on insert/remove. A lookup that disagrees with
//! the sequence triggers a logged full rebuild of the index — the repair
//! path is always available, the model never panics over a desync.

use rustc_hash::FxHashMap;

use crate::item::LineItem;
use crate::sku::Sku;

/// Ordered collection of line items plus the derived id → position index.
///
/// Exclusively owned by the engine; observers receive defensive copies via
/// the broadcast summary, never references into this structure.
#[derive(Debug, Default, Clone)]
pub struct Cart {
    items: Vec<LineItem>,
    index: FxHashMap<Sku, usize>,
}

impl Cart {
    /// Creates an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cart from loaded entries, collapsing duplicate ids.
    #[must_use]
    pub fn from_items(items: Vec<LineItem>) -> Self {
        let mut cart = Self {
            index: FxHashMap::default(),
            items,
        };
        cart.dedupe();
        cart
    }

    /// Number of distinct line items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when the cart holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The ordered line items.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Sum of quantities across all items.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.items.iter().map(|it| u64::from(it.quantity)).sum()
    }

    /// Sum of line subtotals across all items.
    #[must_use]
    pub fn total_sum(&self) -> f64 {
        self.items.iter().map(LineItem::subtotal).sum()
    }

    /// Validated position lookup. Returns `None` when the id is absent *or*
    /// the index entry disagrees with the sequence (callers that can repair
    /// should use [`Cart::locate`]).
    #[must_use]
    pub fn position(&self, sku: &Sku) -> Option<usize> {
        self.index
            .get(sku)
            .copied()
            .filter(|&pos| self.items.get(pos).is_some_and(|it| it.sku == *sku))
    }

    /// Position lookup with the repair path: an index entry that disagrees
    /// with the sequence rebuilds the whole index before retrying.
    pub fn locate(&mut self, sku: &Sku) -> Option<usize> {
        let pos = *self.index.get(sku)?;
        if self.items.get(pos).is_some_and(|it| it.sku == *sku) {
            return Some(pos);
        }
        tracing::warn!(sku = %sku, "cart index desync detected; rebuilding index");
        self.rebuild_index();
        self.index.get(sku).copied()
    }

    /// Shared access to an item by id.
    #[must_use]
    pub fn get(&self, sku: &Sku) -> Option<&LineItem> {
        self.position(sku).and_then(|pos| self.items.get(pos))
    }

    /// Mutable access to an item by id (repairing lookup).
    pub fn get_mut(&mut self, sku: &Sku) -> Option<&mut LineItem> {
        let pos = self.locate(sku)?;
        self.items.get_mut(pos)
    }

    /// Appends an item, replacing any stale index entry for its id.
    ///
    /// Callers are expected to have merged duplicates already; this is the
    /// structural insert, not the dedupe policy.
    pub fn push(&mut self, item: LineItem) {
        self.insert_at(self.items.len(), item);
    }

    /// Inserts an item at `pos`, shifting every indexed position at or above
    /// the insertion point up by one.
    pub fn insert_at(&mut self, pos: usize, item: LineItem) {
        let pos = pos.min(self.items.len());
        for slot in self.index.values_mut() {
            if *slot >= pos {
                *slot += 1;
            }
        }
        self.index.insert(item.sku.clone(), pos);
        self.items.insert(pos, item);
    }

    /// Removes the entry for `sku`, shifting every indexed position above
    /// the removed slot down by one. Returns the removed item, if any.
    pub fn remove(&mut self, sku: &Sku) -> Option<LineItem> {
        let pos = self.locate(sku)?;
        let item = self.items.remove(pos);
        self.index.remove(sku);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(item)
    }

    /// Empties the cart and returns the ids that were present.
    pub fn clear(&mut self) -> Vec<Sku> {
        let prior = self.items.iter().map(|it| it.sku.clone()).collect();
        self.items.clear();
        self.index.clear();
        prior
    }

    /// Collapses entries sharing a normalized id.
    ///
    /// The merge target keeps the first-seen position; quantities sum and
    /// descriptive fields follow [`LineItem::absorb`]. Returns how many
    /// duplicates were folded away.
    pub fn dedupe(&mut self) -> usize {
        let mut kept: Vec<LineItem> = Vec::with_capacity(self.items.len());
        let mut seen: FxHashMap<Sku, usize> = FxHashMap::default();
        let mut folded = 0usize;
        for item in self.items.drain(..) {
            if let Some(&at) = seen.get(&item.sku) {
                kept[at].absorb(item);
                folded += 1;
            } else {
                seen.insert(item.sku.clone(), kept.len());
                kept.push(item);
            }
        }
        self.items = kept;
        self.rebuild_index();
        folded
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (pos, item) in self.items.iter().enumerate() {
            self.index.insert(item.sku.clone(), pos);
        }
    }
}
