pub mod engine;
pub mod input;
pub mod memory;

pub use engine::{MemoryStorage, Series, SeriesSummary, StorageError};
pub use input::{PutInput, StorageIngester};
pub use memory::{MemoryStats, MemoryTracker};
