//! Profile ingestion
//!
//! A request flows through three stages:
//! - [`params`] resolves the query string and headers into [`IngestParams`]
//! - [`parser`] decodes the body into a [`Tree`](crate::tree::Tree) with the selected format
//! - [`service`] ties both together with the scratch-buffer pool, storage and counters

pub mod params;
pub mod parser;
pub mod service;

pub use params::{IngestParams, ParamResolver, ParamWarning, DEFAULT_SAMPLE_RATE};
pub use parser::{Format, Parser};
pub use service::{IngestOutcome, IngestService};

use crate::convert::DecodeError;
use crate::segment::KeyError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// A parameter the request cannot proceed without is missing or malformed
    #[error("{field}: {source}")]
    InvalidParameter {
        field: &'static str,
        #[source]
        source: KeyError,
    },

    #[error("error happened while parsing request body: {0}")]
    Decode(#[from] DecodeError),

    #[error("error happened while ingesting data: {0}")]
    Storage(#[from] StorageError),
}
