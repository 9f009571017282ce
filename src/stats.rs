//! Ingestion counters
//!
//! Counters are fire-and-forget: recording never fails and never blocks on
//! another request.

use dashmap::{DashMap, DashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};

/// Observability sink used by the ingest service
pub trait StatsSink: Send + Sync {
    /// Increment the named counter by one
    fn inc(&self, name: &str);

    /// Record that the application with this name hash ingested data
    fn add_app(&self, app_hash: u64);
}

/// Hash an application name for [`StatsSink::add_app`]
pub fn hash_app_name(name: &str) -> u64 {
    let mut hasher = fxhash::FxHasher64::default();
    hasher.write(name.as_bytes());
    hasher.finish()
}

/// In-process counters
#[derive(Debug, Default)]
pub struct Stats {
    counters: DashMap<String, AtomicU64>,
    apps: DashSet<u64>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Number of distinct applications seen
    pub fn app_count(&self) -> usize {
        self.apps.len()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            counters: self
                .counters
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect(),
            apps: self.app_count(),
        }
    }
}

impl StatsSink for Stats {
    fn inc(&self, name: &str) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn add_app(&self, app_hash: u64) {
        self.apps.insert(app_hash);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub apps: usize,
}
