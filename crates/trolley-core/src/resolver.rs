// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stock resolver port: sync-or-deferred product snapshots and the merge
//! rule that folds a resolved snapshot back into a line item.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::item::LineItem;
use crate::sku::Sku;

/// Resolved product data contributed by the lookup collaborator.
///
/// Every field overwrites the line item's corresponding field on merge
/// except the identifier; `None` descriptive fields leave the item's value
/// untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSnapshot {
    /// Current unit price.
    pub unit_price: f64,
    /// Current stock ceiling. `0` means sold out.
    pub stock_limit: u32,
    /// Product name, when the lookup provides one.
    pub display_name: Option<String>,
    /// Image reference, when the lookup provides one.
    pub image_ref: Option<String>,
    /// Descriptive attributes, merged key-wise into the item.
    pub spec_attributes: BTreeMap<String, String>,
}

/// A snapshot that resolves later (the lookup went to a backend).
pub type DeferredSnapshot = Pin<Box<dyn Future<Output = Option<ProductSnapshot>> + Send>>;

/// Outcome of one lookup: value now, value later, or nothing known.
pub enum Resolution {
    /// Snapshot available synchronously.
    Ready(ProductSnapshot),
    /// Snapshot available after an await; `None` on lookup failure, which
    /// is treated as "no update" for that item, never a batch error.
    Deferred(DeferredSnapshot),
    /// The resolver knows nothing about this id.
    Unknown,
}

/// External stock/price lookup collaborator.
pub trait StockResolver {
    /// Looks up the product snapshot for `sku`.
    fn lookup(&self, sku: &Sku) -> Resolution;
}

/// How a reconciliation pass awaits its deferred lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStrategy {
    /// Fire every lookup together and apply results as they land. Default:
    /// interactive surfaces care about the slowest item, not the sum.
    #[default]
    Concurrent,
    /// Await and apply one lookup at a time.
    Sequential,
}

/// What a snapshot merge did to the item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotEffect {
    /// Any field (or the quantity, via clamping) changed.
    pub changed: bool,
    /// The quantity was clamped down to the newly known stock.
    pub clamped: bool,
}

/// Merges a resolved snapshot into `item`.
///
/// Price and stock limit are overwritten, descriptive fields overwrite when
/// present, and spec attributes merge key-wise. If the quantity exceeds the
/// newly known positive stock it clamps down to `max(1, stock_limit)`.
pub fn apply_snapshot(item: &mut LineItem, snapshot: &ProductSnapshot) -> SnapshotEffect {
    let mut changed = false;
    if (item.unit_price - snapshot.unit_price).abs() > f64::EPSILON {
        item.unit_price = snapshot.unit_price;
        changed = true;
    }
    if item.stock_limit != snapshot.stock_limit {
        item.stock_limit = snapshot.stock_limit;
        changed = true;
    }
    if let Some(name) = &snapshot.display_name {
        if item.display_name != *name {
            item.display_name = name.clone();
            changed = true;
        }
    }
    if let Some(image) = &snapshot.image_ref {
        if item.image_ref != *image {
            item.image_ref = image.clone();
            changed = true;
        }
    }
    for (key, value) in &snapshot.spec_attributes {
        if item.spec_attributes.get(key) != Some(value) {
            item.spec_attributes.insert(key.clone(), value.clone());
            changed = true;
        }
    }

    let mut clamped = false;
    if item.stock_limit > 0 && item.quantity > item.stock_limit {
        item.quantity = item.stock_limit.max(1);
        clamped = true;
        changed = true;
    }
    SnapshotEffect { changed, clamped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(price: f64, stock: u32) -> ProductSnapshot {
        ProductSnapshot {
            unit_price: price,
            stock_limit: stock,
            display_name: Some("Widget".into()),
            image_ref: None,
            spec_attributes: BTreeMap::from([("color".into(), "red".into())]),
        }
    }

    #[test]
    fn merge_overwrites_fields_and_clamps_quantity() {
        let mut item = LineItem::new(Sku::parse("a").unwrap(), 5);
        let effect = apply_snapshot(&mut item, &snapshot(2.5, 3));
        assert!(effect.changed);
        assert!(effect.clamped);
        assert_eq!(item.quantity, 3);
        assert_eq!(item.stock_limit, 3);
        assert_eq!(item.display_name, "Widget");
        assert_eq!(item.spec_attributes.get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn merge_is_a_noop_when_nothing_differs() {
        let mut item = LineItem::new(Sku::parse("a").unwrap(), 2);
        let snap = snapshot(2.5, 3);
        let _ = apply_snapshot(&mut item, &snap);
        let effect = apply_snapshot(&mut item, &snap);
        assert!(!effect.changed);
        assert!(!effect.clamped);
    }

    #[test]
    fn zero_stock_freezes_quantity_instead_of_clamping() {
        let mut item = LineItem::new(Sku::parse("a").unwrap(), 4);
        item.stock_limit = 9;
        let effect = apply_snapshot(
            &mut item,
            &ProductSnapshot {
                stock_limit: 0,
                ..ProductSnapshot::default()
            },
        );
        assert!(effect.changed);
        assert!(!effect.clamped);
        assert_eq!(item.quantity, 4);
        assert_eq!(item.stock_limit, 0);
    }
}
