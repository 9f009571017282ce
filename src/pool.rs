//! Reusable scratch buffers for payload decoding

use parking_lot::Mutex;
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default capacity of a freshly allocated scratch buffer
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Default number of idle buffers kept for reuse
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Source of scratch buffers shared by concurrent requests.
///
/// `acquire` never blocks on scarcity; an empty pool allocates.
pub trait BufferPool: Send + Sync {
    fn acquire(&self) -> Vec<u8>;

    fn release(&self, buf: Vec<u8>);

    fn stats(&self) -> PoolStats;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
    pub allocated: u64,
    pub idle: usize,
}

impl PoolStats {
    /// Buffers currently lent out
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// Growable pool backed by a mutex-guarded free list
#[derive(Debug)]
pub struct ScratchPool {
    free: Mutex<Vec<Vec<u8>>>,
    buffer_capacity: usize,
    max_idle: usize,
    acquired: AtomicU64,
    released: AtomicU64,
    allocated: AtomicU64,
}

impl ScratchPool {
    pub fn new(buffer_capacity: usize, max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_idle)),
            buffer_capacity,
            max_idle,
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
        }
    }
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_IDLE)
    }
}

impl BufferPool for ScratchPool {
    fn acquire(&self) -> Vec<u8> {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        if let Some(buf) = self.free.lock().pop() {
            return buf;
        }
        self.allocated.fetch_add(1, Ordering::Relaxed);
        Vec::with_capacity(self.buffer_capacity)
    }

    fn release(&self, mut buf: Vec<u8>) {
        self.released.fetch_add(1, Ordering::Relaxed);
        buf.clear();

        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(buf);
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            idle: self.free.lock().len(),
        }
    }
}

/// A buffer borrowed from a [`BufferPool`], handed back exactly once when dropped.
pub struct ScratchBuffer<'a> {
    pool: &'a dyn BufferPool,
    buf: Vec<u8>,
}

impl<'a> ScratchBuffer<'a> {
    pub fn lease(pool: &'a dyn BufferPool) -> Self {
        Self {
            buf: pool.acquire(),
            pool,
        }
    }
}

impl Deref for ScratchBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for ScratchBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for ScratchBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
