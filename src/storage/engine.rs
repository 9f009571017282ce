use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use super::input::{PutInput, StorageIngester};
use super::memory::{MemoryStats, MemoryTracker};
use crate::tree::Tree;

/// One stored series: everything ingested under a single normalized key
#[derive(Debug, Clone)]
pub struct Series {
    pub app_name: String,
    pub tree: Tree,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub spy_name: String,
    pub sample_rate: u32,
    pub units: String,
    pub aggregation_type: String,
    pub writes: u64,
}

impl Series {
    fn new(input: &PutInput<'_>) -> Self {
        Self {
            app_name: input.key.app_name().to_string(),
            tree: Tree::new(),
            start_time: input.start_time,
            end_time: input.end_time,
            spy_name: input.spy_name.to_string(),
            sample_rate: input.sample_rate,
            units: input.units.to_string(),
            aggregation_type: input.aggregation_type.to_string(),
            writes: 0,
        }
    }

    fn apply(&mut self, input: &PutInput<'_>) {
        self.tree.merge(input.tree);
        self.start_time = self.start_time.min(input.start_time);
        self.end_time = self.end_time.max(input.end_time);
        self.spy_name = input.spy_name.to_string();
        self.sample_rate = input.sample_rate;
        self.units = input.units.to_string();
        self.aggregation_type = input.aggregation_type.to_string();
        self.writes += 1;
    }
}

/// Summary of a stored series for listings
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSummary {
    pub key: String,
    pub app_name: String,
    pub samples: u64,
    pub stacks: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub spy_name: String,
    pub sample_rate: u32,
    pub units: String,
    pub aggregation_type: String,
    pub writes: u64,
}

/// In-memory storage merging every write into its series tree
pub struct MemoryStorage {
    /// Series indexed by normalized key
    series: DashMap<String, Series>,
    memory: Arc<MemoryTracker>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            series: DashMap::new(),
            memory: Arc::new(MemoryTracker::default()),
        }
    }

    pub fn with_memory_limit(max_bytes: usize) -> Self {
        Self {
            series: DashMap::new(),
            memory: Arc::new(MemoryTracker::new(max_bytes)),
        }
    }

    /// Merged tree for a normalized key
    pub fn tree(&self, key: &str) -> Option<Tree> {
        self.series.get(key).map(|s| s.tree.clone())
    }

    pub fn series(&self, key: &str) -> Option<SeriesSummary> {
        self.series.get(key).map(|s| summarize(s.key(), s.value()))
    }

    /// All series, sorted by key
    pub fn all_series(&self) -> Vec<SeriesSummary> {
        let mut all: Vec<_> = self
            .series
            .iter()
            .map(|e| summarize(e.key(), e.value()))
            .collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn memory_stats(&self) -> MemoryStats {
        MemoryStats::from(self.memory.as_ref())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageIngester for MemoryStorage {
    fn put(&self, input: &PutInput<'_>) -> Result<(), StorageError> {
        // The incoming tree's footprint bounds the growth of the merged tree.
        let reserve = input.tree.memory_usage();
        if !self.memory.try_allocate(reserve) {
            return Err(StorageError::MemoryLimitExceeded {
                requested: reserve,
                available: self.memory.max().saturating_sub(self.memory.current()),
            });
        }

        let mut series = self
            .series
            .entry(input.key.normalized())
            .or_insert_with(|| Series::new(input));
        let before = series.tree.memory_usage();
        series.apply(input);
        let grown = series.tree.memory_usage().saturating_sub(before);

        self.memory.free(reserve.saturating_sub(grown));
        Ok(())
    }
}

fn summarize(key: &str, series: &Series) -> SeriesSummary {
    SeriesSummary {
        key: key.to_string(),
        app_name: series.app_name.clone(),
        samples: series.tree.samples(),
        stacks: series.tree.len(),
        start_time: series.start_time,
        end_time: series.end_time,
        spy_name: series.spy_name.clone(),
        sample_rate: series.sample_rate,
        units: series.units.clone(),
        aggregation_type: series.aggregation_type.clone(),
        writes: series.writes,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Memory limit exceeded: {requested} bytes requested, {available} available")]
    MemoryLimitExceeded { requested: usize, available: usize },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Key;
    use chrono::TimeZone;

    fn make_tree(stacks: &[(&str, u64)]) -> Tree {
        let mut tree = Tree::new();
        for (stack, count) in stacks {
            tree.insert(stack.as_bytes(), *count);
        }
        tree
    }

    fn put(storage: &MemoryStorage, key: &Key, tree: &Tree, from: i64, until: i64) -> Result<(), StorageError> {
        storage.put(&PutInput {
            start_time: Utc.timestamp_opt(from, 0).single().unwrap(),
            end_time: Utc.timestamp_opt(until, 0).single().unwrap(),
            key,
            tree,
            spy_name: "rbspy",
            sample_rate: 100,
            units: "samples",
            aggregation_type: "sum",
        })
    }

    #[test]
    fn test_put_creates_series() {
        let storage = MemoryStorage::new();
        let key = Key::parse("app.cpu{env=prod}").unwrap();

        put(&storage, &key, &make_tree(&[("main;work", 3)]), 100, 110).unwrap();

        let summary = storage.series("app.cpu{env=prod}").unwrap();
        assert_eq!(summary.app_name, "app.cpu");
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.writes, 1);
        assert_eq!(summary.spy_name, "rbspy");
        assert!(storage.memory_stats().current_bytes > 0);
    }

    #[test]
    fn test_writes_merge_and_widen_span() {
        let storage = MemoryStorage::new();
        let key = Key::parse("app.cpu").unwrap();

        put(&storage, &key, &make_tree(&[("a;b", 1)]), 100, 110).unwrap();
        put(&storage, &key, &make_tree(&[("a;b", 2), ("a;c", 5)]), 90, 105).unwrap();

        let tree = storage.tree("app.cpu{}").unwrap();
        assert_eq!(tree.get(b"a;b"), Some(3));
        assert_eq!(tree.get(b"a;c"), Some(5));

        let summary = storage.series("app.cpu{}").unwrap();
        assert_eq!(summary.start_time.timestamp(), 90);
        assert_eq!(summary.end_time.timestamp(), 110);
        assert_eq!(summary.writes, 2);
    }

    #[test]
    fn test_repeated_stacks_do_not_grow_memory() {
        let storage = MemoryStorage::new();
        let key = Key::parse("app.cpu").unwrap();
        let tree = make_tree(&[("a;b", 1)]);

        put(&storage, &key, &tree, 0, 1).unwrap();
        let after_first = storage.memory_stats().current_bytes;
        put(&storage, &key, &tree, 0, 1).unwrap();

        assert_eq!(storage.memory_stats().current_bytes, after_first);
    }

    #[test]
    fn test_memory_limit_rejects_write() {
        let storage = MemoryStorage::with_memory_limit(16);
        let key = Key::parse("app.cpu").unwrap();

        let result = put(&storage, &key, &make_tree(&[("main;work", 3)]), 0, 1);
        assert!(matches!(
            result,
            Err(StorageError::MemoryLimitExceeded { .. })
        ));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_all_series_sorted() {
        let storage = MemoryStorage::new();
        let tree = make_tree(&[("x", 1)]);

        put(&storage, &Key::parse("b.cpu").unwrap(), &tree, 0, 1).unwrap();
        put(&storage, &Key::parse("a.cpu").unwrap(), &tree, 0, 1).unwrap();

        let keys: Vec<_> = storage.all_series().into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec!["a.cpu{}", "b.cpu{}"]);
    }
}
