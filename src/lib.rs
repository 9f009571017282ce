//! flamegate: ingestion front-end for a continuous-profiling service
//!
//! Receives raw stack-sample payloads over HTTP, resolves request metadata
//! into a fully defaulted ingest context, decodes the body into an aggregated
//! call tree and hands the result to storage.
//!
//! # Features
//!
//! - **Four payload formats**: collapsed groups (default), individual lines,
//!   binary prefix trie and binary tree, selected by `format` or `Content-Type`
//! - **Lenient metadata**: every optional parameter has a default; only the
//!   storage key (`name`) can reject a request
//! - **Scratch-buffer pool**: decode buffers are reused across requests
//! - **Counters**: total ingests, per-agent ingests and distinct applications
//!
//! # Example
//!
//! ```no_run
//! use flamegate::ingest::{IngestService, ParamResolver};
//! use flamegate::pool::ScratchPool;
//! use flamegate::stats::Stats;
//! use flamegate::storage::MemoryStorage;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let service = IngestService::new(
//!     ParamResolver::default(),
//!     Arc::new(ScratchPool::default()),
//!     storage.clone(),
//!     Arc::new(Stats::new()),
//! );
//!
//! let mut query = HashMap::new();
//! query.insert("name".to_string(), "app.cpu{env=prod}".to_string());
//! service
//!     .ingest(&query, &Default::default(), b"main;work 3\nmain;idle 1\n")
//!     .unwrap();
//!
//! println!("{:?}", storage.series("app.cpu{env=prod}"));
//! ```

pub mod api;
pub mod attime;
pub mod convert;
pub mod ingest;
pub mod pool;
pub mod segment;
pub mod stats;
pub mod storage;
pub mod tree;

// Re-export commonly used types
pub use ingest::{IngestError, IngestService};
pub use segment::Key;
pub use storage::{MemoryStorage, StorageError};
pub use tree::Tree;
