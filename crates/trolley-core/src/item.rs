// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Line items: one purchasable entry in the cart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sku::Sku;

/// One purchasable entry in the cart.
///
/// Serde attributes double as the persisted wire shape: an ordered array of
/// camelCase objects (`{id, displayName, unitPrice, quantity, imageRef,
/// stockLimit, specAttributes}`). Everything except `id` and `quantity` is
/// defaulted on load so partially-resolved entries round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Normalized identity key. Exactly one live entry per `Sku`.
    #[serde(rename = "id")]
    pub sku: Sku,
    /// Human-readable product name.
    #[serde(default)]
    pub display_name: String,
    /// Unit price. Non-negative; overwritten wholesale by resolution.
    #[serde(default)]
    pub unit_price: f64,
    /// Units in the cart. Always ≥ 1 for a live entry; clamped to
    /// `stock_limit` whenever the limit is known and positive.
    pub quantity: u32,
    /// Product image reference.
    #[serde(default)]
    pub image_ref: String,
    /// Known stock ceiling. `0` means unknown/unavailable until resolved;
    /// such an entry may stay in the cart with its quantity frozen.
    #[serde(default)]
    pub stock_limit: u32,
    /// Descriptive attribute map. Merged key-wise on update, not replaced.
    #[serde(default)]
    pub spec_attributes: BTreeMap<String, String>,
}

impl LineItem {
    /// Creates a bare entry for an optimistic add: quantity only, zero known
    /// stock, descriptive fields pending resolution.
    #[must_use]
    pub fn new(sku: Sku, quantity: u32) -> Self {
        Self {
            sku,
            display_name: String::new(),
            unit_price: 0.0,
            quantity: quantity.max(1),
            image_ref: String::new(),
            stock_limit: 0,
            spec_attributes: BTreeMap::new(),
        }
    }

    /// Line subtotal (`unit_price × quantity`).
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }

    /// Folds a later duplicate of the same `Sku` into this entry.
    ///
    /// Quantities sum; the most-recent non-empty descriptive fields win and
    /// spec attributes merge key-wise; the price is overwritten by the
    /// latest. The stock limit becomes the lowest *known* limit among the
    /// duplicates and the merged quantity reclamps against it.
    pub(crate) fn absorb(&mut self, later: Self) {
        self.quantity = self.quantity.saturating_add(later.quantity);
        if !later.display_name.is_empty() {
            self.display_name = later.display_name;
        }
        if !later.image_ref.is_empty() {
            self.image_ref = later.image_ref;
        }
        self.spec_attributes.extend(later.spec_attributes);
        self.unit_price = later.unit_price;
        self.stock_limit = match (self.stock_limit, later.stock_limit) {
            (0, other) | (other, 0) => other,
            (mine, theirs) => mine.min(theirs),
        };
        if self.stock_limit > 0 && self.quantity > self.stock_limit {
            self.quantity = self.stock_limit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sku: &str, qty: u32, stock: u32) -> LineItem {
        let mut it = LineItem::new(Sku::parse(sku).unwrap(), qty);
        it.stock_limit = stock;
        it
    }

    #[test]
    fn absorb_sums_quantities_and_clamps_to_lowest_known_stock() {
        let mut first = item("a", 2, 5);
        let mut later = item("a", 4, 3);
        later.display_name = "Widget".into();
        later.unit_price = 9.5;
        first.absorb(later);
        assert_eq!(first.quantity, 3);
        assert_eq!(first.stock_limit, 3);
        assert_eq!(first.display_name, "Widget");
        assert!((first.unit_price - 9.5).abs() < f64::EPSILON);
    }

    #[test]
    fn absorb_keeps_known_stock_over_unknown() {
        let mut first = item("a", 1, 0);
        first.absorb(item("a", 1, 4));
        assert_eq!(first.stock_limit, 4);

        let mut known = item("b", 1, 4);
        known.absorb(item("b", 1, 0));
        assert_eq!(known.stock_limit, 4);
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let it = item("sku-1", 2, 7);
        let json = serde_json::to_value(&it).unwrap();
        assert_eq!(json["id"], "sku-1");
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["stockLimit"], 7);
        assert!(json.get("specAttributes").is_some());
    }
}
