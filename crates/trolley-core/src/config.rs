// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine configuration, loadable through the state service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::favorites::OverflowPolicy;
use crate::resolver::RefreshStrategy;

/// Which reconciliation variant the engine runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Patch only the changed rows, falling back to a full rebuild on any
    /// inconsistency. The intended behavior.
    #[default]
    Patch,
    /// Degraded/legacy mode: rebuild the whole row list every pass.
    FullRebuild,
}

/// Tunables for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Debounce window for persistence writes, in milliseconds.
    pub debounce_ms: u64,
    /// How deferred stock lookups are awaited.
    pub refresh: RefreshStrategy,
    /// Reconciliation variant.
    pub reconcile: ReconcileMode,
    /// Optional maximum number of favorites.
    pub favorites_limit: Option<usize>,
    /// Overflow policy once the favorites limit is reached.
    pub favorites_overflow: OverflowPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 400,
            refresh: RefreshStrategy::Concurrent,
            reconcile: ReconcileMode::Patch,
            favorites_limit: None,
            favorites_overflow: OverflowPolicy::DropOldest,
        }
    }
}

impl EngineConfig {
    /// The debounce window as a [`Duration`].
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
