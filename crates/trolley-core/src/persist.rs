// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Durable key-value store port, typed state service, and the debounced
//! writer that coalesces rapid mutations into one delayed write.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::item::LineItem;

/// Storage port for raw state blobs (keyed by logical name).
pub trait StateStore {
    /// Load a raw state blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, StateError>;
    /// Persist a raw state blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), StateError>;
}

/// Error type for state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Thin service that serializes state values and delegates storage to a
/// [`StateStore`].
pub struct StateService<S> {
    store: S,
}

impl<S> StateService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> StateService<S>
where
    S: StateStore,
{
    /// Load and deserialize a state value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, StateError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(StateError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a state value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), StateError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

/// Debounced, coalescing writer for one store key.
///
/// Each [`DebouncedWriter::schedule`] call cancels any pending write and
/// arms a fresh one for `delay` later, so rapid mutations collapse into a
/// single write carrying the final payload. Teardown cancels the pending
/// task and writes immediately via [`DebouncedWriter::flush`]. Write errors
/// are logged and swallowed; the next window retries — persistence never
/// blocks a mutation.
///
/// Scheduling spawns onto the ambient tokio runtime, so `schedule` must be
/// called from within one; `flush` and `cancel` have no such requirement.
pub struct DebouncedWriter<S> {
    store: Arc<S>,
    key: String,
    delay: Duration,
    pending: Option<tokio::task::JoinHandle<()>>,
}

impl<S> DebouncedWriter<S>
where
    S: StateStore + Send + Sync + 'static,
{
    /// Creates a writer for `key` with the given debounce window.
    pub fn new(store: Arc<S>, key: impl Into<String>, delay: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            delay,
            pending: None,
        }
    }

    /// Schedules `payload` to be written after the debounce window,
    /// canceling any previously scheduled write.
    pub fn schedule(&mut self, payload: Vec<u8>) {
        self.cancel();
        let store = Arc::clone(&self.store);
        let key = self.key.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = store.save_raw(&key, &payload) {
                tracing::warn!(key = %key, error = %err, "debounced write failed; retrying next window");
            }
        }));
    }

    /// Cancels any pending write without issuing one.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Cancels any pending write and writes `payload` immediately.
    pub fn flush(&mut self, payload: &[u8]) {
        self.cancel();
        if let Err(err) = self.store.save_raw(&self.key, payload) {
            tracing::warn!(key = %self.key, error = %err, "flush write failed");
        }
    }

    /// Returns `true` while a write is scheduled but not yet issued.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Serializes line items into the persisted wire shape (ordered JSON array).
pub fn encode_items(items: &[LineItem]) -> Result<Vec<u8>, StateError> {
    Ok(serde_json::to_vec_pretty(items)?)
}

/// Deserializes the persisted wire shape leniently.
///
/// Entries that fail to parse — or carry a non-finite/negative price — are
/// dropped with a debug log rather than propagated; a zero quantity is
/// lifted to 1. Only a top-level shape that is not an array is an error.
pub fn decode_items(bytes: &[u8]) -> Result<Vec<LineItem>, StateError> {
    let raw: Vec<serde_json::Value> = serde_json::from_slice(bytes)?;
    let mut out = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<LineItem>(value) {
            Ok(mut item) => {
                if !item.unit_price.is_finite() || item.unit_price < 0.0 {
                    tracing::debug!(sku = %item.sku, "dropping persisted entry with invalid price");
                    continue;
                }
                item.quantity = item.quantity.max(1);
                out.push(item);
            }
            Err(err) => {
                tracing::debug!(error = %err, "dropping malformed persisted cart entry");
            }
        }
    }
    Ok(out)
}
