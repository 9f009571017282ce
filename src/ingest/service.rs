use axum::http::HeaderMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::params::ParamResolver;
use super::IngestError;
use crate::pool::{BufferPool, PoolStats, ScratchBuffer};
use crate::stats::{hash_app_name, StatsSink};
use crate::storage::{PutInput, StorageIngester};

/// What a successful ingest stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub samples: u64,
    pub stacks: usize,
}

/// Per-request ingestion pipeline.
///
/// Holds no per-request state; the pool and the stats sink are the only
/// things shared between concurrent requests.
pub struct IngestService {
    params: ParamResolver,
    pool: Arc<dyn BufferPool>,
    storage: Arc<dyn StorageIngester>,
    stats: Arc<dyn StatsSink>,
}

impl IngestService {
    pub fn new(
        params: ParamResolver,
        pool: Arc<dyn BufferPool>,
        storage: Arc<dyn StorageIngester>,
        stats: Arc<dyn StatsSink>,
    ) -> Self {
        Self {
            params,
            pool,
            storage,
            stats,
        }
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Resolve parameters, decode `body`, store the tree and bump counters.
    pub fn ingest(
        &self,
        query: &HashMap<String, String>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<IngestOutcome, IngestError> {
        let params = self.params.resolve(query, headers)?;

        // The lease ends with this block, on success and on decode failure alike.
        let tree = {
            let mut scratch = ScratchBuffer::lease(self.pool.as_ref());
            let mut reader = body;
            params.format.parser().parse(&mut reader, &mut scratch)?
        };

        let input = PutInput {
            start_time: params.from,
            end_time: params.until,
            key: &params.key,
            tree: &tree,
            spy_name: &params.spy_name,
            sample_rate: params.sample_rate,
            units: &params.units,
            aggregation_type: &params.aggregation_type,
        };
        self.storage.put(&input).map_err(|e| {
            tracing::error!("Failed to store profile for {}: {}", params.key, e);
            e
        })?;

        self.stats.inc("ingest");
        self.stats.inc(&format!("ingest:{}", params.spy_name));
        self.stats.add_app(hash_app_name(params.key.app_name()));

        tracing::debug!(
            "Ingested {} samples ({} stacks, format {}) into {}",
            tree.samples(),
            tree.len(),
            params.format,
            params.key
        );

        Ok(IngestOutcome {
            samples: tree.samples(),
            stacks: tree.len(),
        })
    }
}
