// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Consolidated update summaries published once per reconciliation pass.

use std::collections::BTreeSet;

use crate::cart::Cart;
use crate::item::LineItem;
use crate::sku::Sku;

/// One consolidated summary of a reconciliation pass.
///
/// `items` is a defensive copy — subscribers never see references into the
/// live model.
#[derive(Debug, Clone, PartialEq)]
pub struct CartUpdate {
    /// Snapshot of the cart contents after the pass.
    pub items: Vec<LineItem>,
    /// Sum of quantities.
    pub total_count: u64,
    /// Sum of `unit_price × quantity`.
    pub total_sum: f64,
    /// Ids touched by this pass.
    pub changed: BTreeSet<Sku>,
}

impl CartUpdate {
    /// Captures the post-pass state of `cart`.
    #[must_use]
    pub fn capture(cart: &Cart, changed: BTreeSet<Sku>) -> Self {
        Self {
            items: cart.items().to_vec(),
            total_count: cart.total_count(),
            total_sum: cart.total_sum(),
            changed,
        }
    }
}

type Subscriber = Box<dyn Fn(&CartUpdate) + Send>;

/// Explicit, finite fan-out of pass summaries.
///
/// Subscribers are pure observers (badge, mini-list, totals display); the
/// engine invokes them synchronously at the end of each pass and never
/// depends on their success or ordering. There is no ambient event bus.
#[derive(Default)]
pub struct UpdateBus {
    subscribers: Vec<Subscriber>,
}

impl UpdateBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber callback.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: Fn(&CartUpdate) + Send + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns `true` when nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Delivers `update` to every subscriber in registration order.
    pub fn publish(&self, update: &CartUpdate) {
        for subscriber in &self.subscribers {
            subscriber(update);
        }
    }
}
