// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Favorites sibling store: an ordered unique id set with an optional size
//! bound, persisted with the same debounce discipline as the cart.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::persist::{DebouncedWriter, StateError, StateStore};
use crate::sku::Sku;

/// What happens when an add would exceed the configured maximum size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the oldest favorite to make room.
    #[default]
    DropOldest,
    /// Reject the new favorite.
    RejectNew,
}

/// Result of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteToggle {
    /// The id was added.
    Added,
    /// The id was removed.
    Removed,
    /// The add was rejected by the overflow policy.
    Rejected,
}

/// Ordered unique id set with an optional maximum size.
#[derive(Debug, Clone, Default)]
pub struct Favorites {
    ids: Vec<Sku>,
    limit: Option<usize>,
    overflow: OverflowPolicy,
}

impl Favorites {
    /// Creates an unbounded list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list bounded to `limit` entries with the given policy.
    #[must_use]
    pub fn bounded(limit: Option<usize>, overflow: OverflowPolicy) -> Self {
        Self {
            ids: Vec::new(),
            limit,
            overflow,
        }
    }

    /// The favorite ids, oldest first.
    #[must_use]
    pub fn ids(&self) -> &[Sku] {
        &self.ids
    }

    /// Number of favorites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` when no favorites are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns `true` when `sku` is a favorite.
    #[must_use]
    pub fn contains(&self, sku: &Sku) -> bool {
        self.ids.contains(sku)
    }

    /// Adds `sku`. Returns `false` for duplicates and overflow rejections.
    pub fn add(&mut self, sku: Sku) -> bool {
        if self.contains(&sku) {
            return false;
        }
        if let Some(limit) = self.limit {
            if self.ids.len() >= limit {
                match self.overflow {
                    OverflowPolicy::RejectNew => return false,
                    OverflowPolicy::DropOldest => {
                        self.ids.remove(0);
                    }
                }
            }
        }
        self.ids.push(sku);
        true
    }

    /// Removes `sku`. Returns whether it was present.
    pub fn remove(&mut self, sku: &Sku) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| id != sku);
        self.ids.len() != before
    }

    /// Adds the id when absent, removes it when present.
    pub fn toggle(&mut self, sku: Sku) -> FavoriteToggle {
        if self.remove(&sku) {
            FavoriteToggle::Removed
        } else if self.add(sku) {
            FavoriteToggle::Added
        } else {
            FavoriteToggle::Rejected
        }
    }

    /// Replaces the list with `ids` (deduplicated, size bound re-applied).
    /// Returns `true` when the stored list actually differs from the prior
    /// in-memory one.
    pub fn reload(&mut self, ids: Vec<Sku>) -> bool {
        let mut fresh: Vec<Sku> = Vec::with_capacity(ids.len());
        for sku in ids {
            if !fresh.contains(&sku) {
                fresh.push(sku);
            }
        }
        if let Some(limit) = self.limit {
            if fresh.len() > limit {
                match self.overflow {
                    OverflowPolicy::RejectNew => fresh.truncate(limit),
                    OverflowPolicy::DropOldest => {
                        fresh.drain(..fresh.len() - limit);
                    }
                }
            }
        }
        if fresh == self.ids {
            return false;
        }
        self.ids = fresh;
        true
    }
}

type FavoritesSubscriber = Box<dyn Fn(&[Sku]) + Send>;

/// Favorites with the cart's persistence discipline attached: debounced
/// writes, flush on teardown, lenient load, and a change event that fires
/// only when the list actually differs.
pub struct FavoritesStore<S> {
    favorites: Favorites,
    store: Arc<S>,
    key: String,
    writer: DebouncedWriter<S>,
    subscribers: Vec<FavoritesSubscriber>,
}

impl<S> FavoritesStore<S>
where
    S: StateStore + Send + Sync + 'static,
{
    /// Creates a store over `favorites` persisting under `key`.
    pub fn new(favorites: Favorites, store: Arc<S>, key: impl Into<String>, delay: Duration) -> Self {
        let key = key.into();
        let writer = DebouncedWriter::new(Arc::clone(&store), key.clone(), delay);
        Self {
            favorites,
            store,
            key,
            writer,
            subscribers: Vec::new(),
        }
    }

    /// The in-memory list.
    #[must_use]
    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    /// Registers a change subscriber.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: Fn(&[Sku]) + Send + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Loads the persisted list, dropping malformed entries. A missing key
    /// leaves the list empty.
    pub fn load(&mut self) -> Result<(), StateError> {
        let bytes = match self.store.load_raw(&self.key) {
            Ok(bytes) => bytes,
            Err(StateError::NotFound) => return Ok(()),
            Err(err) => return Err(err),
        };
        let _ = self.favorites.reload(decode_ids_lossy(&bytes));
        Ok(())
    }

    /// Adds `sku`; persists and notifies on success.
    pub fn add(&mut self, sku: Sku) -> bool {
        let added = self.favorites.add(sku);
        if added {
            self.touched();
        }
        added
    }

    /// Removes `sku`; persists and notifies on success.
    pub fn remove(&mut self, sku: &Sku) -> bool {
        let removed = self.favorites.remove(sku);
        if removed {
            self.touched();
        }
        removed
    }

    /// Toggles `sku`; persists and notifies unless the toggle was rejected.
    pub fn toggle(&mut self, sku: Sku) -> FavoriteToggle {
        let outcome = self.favorites.toggle(sku);
        if outcome != FavoriteToggle::Rejected {
            self.touched();
        }
        outcome
    }

    /// Cross-context reload: re-reads the persisted list and fires the
    /// change event only when it differs from the in-memory one.
    pub fn reload_from_store(&mut self) -> Result<bool, StateError> {
        let bytes = match self.store.load_raw(&self.key) {
            Ok(bytes) => bytes,
            Err(StateError::NotFound) => return Ok(false),
            Err(err) => return Err(err),
        };
        let differed = self.favorites.reload(decode_ids_lossy(&bytes));
        if differed {
            self.notify();
        }
        Ok(differed)
    }

    /// Cancels any pending debounce and writes the list immediately.
    pub fn shutdown(&mut self) {
        match encode_ids(self.favorites.ids()) {
            Ok(bytes) => self.writer.flush(&bytes),
            Err(err) => tracing::warn!(error = %err, "failed to encode favorites for flush"),
        }
    }

    fn touched(&mut self) {
        match encode_ids(self.favorites.ids()) {
            Ok(bytes) => self.writer.schedule(bytes),
            Err(err) => tracing::warn!(error = %err, "failed to encode favorites"),
        }
        self.notify();
    }

    fn notify(&self) {
        for subscriber in &self.subscribers {
            subscriber(self.favorites.ids());
        }
    }
}

/// Serializes favorite ids as an ordered JSON array of strings.
pub fn encode_ids(ids: &[Sku]) -> Result<Vec<u8>, StateError> {
    Ok(serde_json::to_vec_pretty(ids)?)
}

/// An unreadable favorites blob reads as empty instead of failing.
fn decode_ids_lossy(bytes: &[u8]) -> Vec<Sku> {
    decode_ids(bytes).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "persisted favorites unreadable; starting empty");
        Vec::new()
    })
}

/// Deserializes favorite ids leniently: non-string or blank entries are
/// dropped with a debug log.
pub fn decode_ids(bytes: &[u8]) -> Result<Vec<Sku>, StateError> {
    let raw: Vec<serde_json::Value> = serde_json::from_slice(bytes)?;
    let mut out = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<Sku>(value) {
            Ok(sku) => out.push(sku),
            Err(err) => tracing::debug!(error = %err, "dropping malformed favorite entry"),
        }
    }
    Ok(out)
}
