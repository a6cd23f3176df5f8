// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::{ready, Future};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use trolley_core::{
    LineItem, ProductSnapshot, Resolution, RowBuildError, RowControls, RowHost, Sku, StateError,
    StateStore, StockResolver,
};

/// In-memory state store that counts writes.
#[derive(Default)]
pub struct MemStore {
    pub entries: Mutex<BTreeMap<String, Vec<u8>>>,
    pub writes: AtomicUsize,
}

impl MemStore {
    /// Raw bytes currently stored under `key`.
    pub fn bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Pre-seeds `key` without counting a write.
    pub fn seed(&self, key: &str, data: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), data.to_vec());
    }

    /// Number of writes issued so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StateStore for MemStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, StateError> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(StateError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), StateError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

/// Builds a snapshot with just price and stock set.
pub fn snapshot(price: f64, stock: u32) -> ProductSnapshot {
    ProductSnapshot {
        unit_price: price,
        stock_limit: stock,
        ..ProductSnapshot::default()
    }
}

/// Scripted catalog: per-id ready, deferred, or failing resolutions.
#[derive(Default)]
pub struct CatalogResolver {
    ready: HashMap<String, ProductSnapshot>,
    deferred: HashMap<String, ProductSnapshot>,
    failing: HashSet<String>,
}

impl CatalogResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `id` synchronously.
    pub fn ready(mut self, id: &str, price: f64, stock: u32) -> Self {
        self.ready.insert(id.to_owned(), snapshot(price, stock));
        self
    }

    /// Resolves `id` after one yield point.
    pub fn deferred(mut self, id: &str, price: f64, stock: u32) -> Self {
        self.deferred.insert(id.to_owned(), snapshot(price, stock));
        self
    }

    /// `id`'s deferred lookup resolves to nothing (a failed backend call).
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_owned());
        self
    }
}

impl StockResolver for CatalogResolver {
    fn lookup(&self, sku: &Sku) -> Resolution {
        if let Some(snap) = self.ready.get(sku.as_str()) {
            return Resolution::Ready(snap.clone());
        }
        if let Some(snap) = self.deferred.get(sku.as_str()) {
            let snap = snap.clone();
            return Resolution::Deferred(Box::pin(async move {
                tokio::task::yield_now().await;
                Some(snap)
            }));
        }
        if self.failing.contains(sku.as_str()) {
            return Resolution::Deferred(Box::pin(async move {
                tokio::task::yield_now().await;
                None
            }));
        }
        Resolution::Unknown
    }
}

/// Row host that records every call; rows carry their id for sanity checks.
#[derive(Default)]
pub struct CountingHost {
    pub builds: usize,
    pub removes: usize,
    pub syncs: usize,
    pub clears: usize,
    pub frames: usize,
    pub last_controls: Option<RowControls>,
}

impl RowHost for CountingHost {
    type Row = String;

    fn build_row(
        &mut self,
        item: &LineItem,
        _controls: &RowControls,
    ) -> Result<String, RowBuildError> {
        self.builds += 1;
        Ok(item.sku.as_str().to_owned())
    }

    fn sync_row(&mut self, row: &mut String, item: &LineItem, controls: &RowControls) {
        assert_eq!(row.as_str(), item.sku.as_str());
        self.syncs += 1;
        self.last_controls = Some(*controls);
    }

    fn remove_row(&mut self, _row: String) {
        self.removes += 1;
    }

    fn clear(&mut self) {
        self.clears += 1;
    }

    fn next_frame(&mut self) -> impl Future<Output = ()> {
        self.frames += 1;
        ready(())
    }
}
