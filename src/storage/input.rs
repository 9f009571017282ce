use chrono::{DateTime, Utc};

use super::StorageError;
use crate::segment::Key;
use crate::tree::Tree;

/// A fully resolved write, built once per ingested profile
#[derive(Debug, Clone, Copy)]
pub struct PutInput<'a> {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub key: &'a Key,
    pub tree: &'a Tree,
    pub spy_name: &'a str,
    pub sample_rate: u32,
    pub units: &'a str,
    pub aggregation_type: &'a str,
}

/// Persists ingested profiles
pub trait StorageIngester: Send + Sync {
    fn put(&self, input: &PutInput<'_>) -> Result<(), StorageError>;
}
