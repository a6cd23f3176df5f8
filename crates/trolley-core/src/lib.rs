// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! trolley-core: shopping-cart reconciliation engine.
//!
//! The engine owns an authoritative in-memory line-item model, keeps it
//! consistent with externally-resolved stock data (sync or deferred),
//! patches only the changed rendered rows through a host port, coalesces
//! persistence writes behind a debounce window, and broadcasts one
//! consolidated summary per reconciliation pass.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod broadcast;
mod cart;
mod config;
mod dirty;
mod engine;
mod favorites;
mod item;
mod persist;
mod resolver;
mod sku;
mod view;

// Re-exports for stable public API
/// Consolidated pass summaries and their subscriber fan-out.
pub use broadcast::{CartUpdate, UpdateBus};
/// Ordered cart model with its id → position index.
pub use cart::Cart;
/// Engine tunables and the reconciliation variant switch.
pub use config::{EngineConfig, ReconcileMode};
/// Change tracker drained once per pass.
pub use dirty::DirtySet;
/// The engine facade, its domain signals, and the persistence keys.
pub use engine::{
    AddOk, AddReject, CartEngine, CART_STATE_KEY, CONFIG_STATE_KEY, FAVORITES_STATE_KEY,
};
/// Favorites sibling store and its overflow policies.
pub use favorites::{
    decode_ids, encode_ids, FavoriteToggle, Favorites, FavoritesStore, OverflowPolicy,
};
/// Line items: one purchasable entry.
pub use item::LineItem;
/// Durable key-value port, typed state service, and the debounced writer.
pub use persist::{
    decode_items, encode_items, DebouncedWriter, StateError, StateService, StateStore,
};
/// Stock resolver port: sync-or-deferred snapshots and the merge rule.
pub use resolver::{
    apply_snapshot, DeferredSnapshot, ProductSnapshot, RefreshStrategy, Resolution,
    SnapshotEffect, StockResolver,
};
/// Normalized identity keys.
pub use sku::Sku;
/// Row host port and the reconciler that patches the rendered list.
pub use view::{
    PassMode, RowBuildError, RowControls, RowHost, RowPassReport, RowReconciler,
};
