use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks bytes held by stored series against a fixed budget
#[derive(Debug)]
pub struct MemoryTracker {
    current_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    max_bytes: usize,
}

impl MemoryTracker {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            current_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            max_bytes,
        }
    }

    /// Reserve `bytes` if the budget allows it. Returns true on success.
    pub fn try_allocate(&self, bytes: usize) -> bool {
        let reserved = self
            .current_bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current
                    .checked_add(bytes)
                    .filter(|&next| next <= self.max_bytes)
            });

        match reserved {
            Ok(previous) => {
                self.peak_bytes
                    .fetch_max(previous + bytes, Ordering::SeqCst);
                true
            }
            Err(_) => false,
        }
    }

    /// Return bytes that were reserved but not used
    pub fn free(&self, bytes: usize) {
        self.current_bytes.fetch_sub(bytes, Ordering::SeqCst);
    }

    pub fn current(&self) -> usize {
        self.current_bytes.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak_bytes.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> usize {
        self.max_bytes
    }

    /// Usage as a fraction of the budget (0.0 to 1.0)
    pub fn usage_ratio(&self) -> f64 {
        if self.max_bytes == 0 {
            return 0.0;
        }
        self.current() as f64 / self.max_bytes as f64
    }
}

impl Default for MemoryTracker {
    fn default() -> Self {
        // Default to 1GB
        Self::new(1024 * 1024 * 1024)
    }
}

/// Memory statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryStats {
    pub current_bytes: usize,
    pub peak_bytes: usize,
    pub max_bytes: usize,
    pub usage_ratio: f64,
}

impl From<&MemoryTracker> for MemoryStats {
    fn from(tracker: &MemoryTracker) -> Self {
        Self {
            current_bytes: tracker.current(),
            peak_bytes: tracker.peak(),
            max_bytes: tracker.max(),
            usage_ratio: tracker.usage_ratio(),
        }
    }
}
