use std::sync::{Mutex, MutexGuard};

/// Retention limits for a [`BufferPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PoolOpts {
    /// Maximum number of idle buffers kept per capacity bucket.
    pub max_buffers_per_bucket: usize,
    /// Maximum total element capacity retained across all buckets.
    pub max_retained_elements: usize,
}

impl Default for PoolOpts {
    fn default() -> Self {
        Self {
            max_buffers_per_bucket: 16,
            max_retained_elements: 1 << 16,
        }
    }
}

/// Counters describing pool traffic since construction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Idle buffers currently held by the pool.
    pub retained_buffers: usize,
    /// Sum of the capacities of idle buffers.
    pub retained_elements: usize,
    /// Total `rent` calls.
    pub rented: u64,
    /// Total `give_back` calls.
    pub returned: u64,
    /// Rents that had to allocate a fresh buffer.
    pub allocated: u64,
    /// Returned buffers dropped because a retention cap was hit.
    pub dropped_on_return: u64,
}

impl PoolStats {
    /// Buffers rented and not yet given back.
    pub fn outstanding(&self) -> u64 {
        self.rented.saturating_sub(self.returned)
    }
}

struct PoolInner<T> {
    stats: PoolStats,
    // Index k holds idle buffers whose capacity is at least 2^k.
    buckets: Vec<Vec<Vec<T>>>,
}

/// Thread-safe pool of growable buffers, bucketed by power-of-two capacity.
///
/// Rent/return happens once per operator per frame, never per element. Rented buffers are always
/// empty; callers track their own logical length through `Vec::len`.
pub struct BufferPool<T> {
    opts: PoolOpts,
    inner: Mutex<PoolInner<T>>,
}

impl<T> BufferPool<T> {
    /// Empty pool with the given limits.
    pub fn new(opts: PoolOpts) -> Self {
        Self {
            opts,
            inner: Mutex::new(PoolInner {
                stats: PoolStats::default(),
                buckets: Vec::new(),
            }),
        }
    }

    /// Limits this pool was built with.
    pub fn opts(&self) -> PoolOpts {
        self.opts
    }

    /// Snapshot of the traffic counters.
    pub fn stats(&self) -> PoolStats {
        self.lock().stats.clone()
    }

    /// Rent an empty buffer with capacity of at least `min_capacity`.
    pub fn rent(&self, min_capacity: usize) -> Vec<T> {
        let want = min_capacity.max(1).next_power_of_two();
        let first_bucket = want.trailing_zeros() as usize;

        let mut inner = self.lock();
        inner.stats.rented = inner.stats.rented.saturating_add(1);

        let hit = (first_bucket..inner.buckets.len()).find(|&k| !inner.buckets[k].is_empty());
        if let Some(k) = hit
            && let Some(buf) = inner.buckets[k].pop()
        {
            inner.stats.retained_buffers = inner.stats.retained_buffers.saturating_sub(1);
            inner.stats.retained_elements =
                inner.stats.retained_elements.saturating_sub(buf.capacity());
            return buf;
        }

        inner.stats.allocated = inner.stats.allocated.saturating_add(1);
        drop(inner);
        tracing::trace!(capacity = want, "buffer pool allocating");
        Vec::with_capacity(want)
    }

    /// Return a buffer to the pool. Its contents are dropped immediately.
    pub fn give_back(&self, mut buf: Vec<T>) {
        buf.clear();
        let cap = buf.capacity();

        let mut inner = self.lock();
        inner.stats.returned = inner.stats.returned.saturating_add(1);

        if cap == 0 || self.opts.max_buffers_per_bucket == 0 {
            inner.stats.dropped_on_return = inner.stats.dropped_on_return.saturating_add(1);
            return;
        }
        if inner.stats.retained_elements.saturating_add(cap) > self.opts.max_retained_elements {
            inner.stats.dropped_on_return = inner.stats.dropped_on_return.saturating_add(1);
            return;
        }

        let k = (usize::BITS - 1 - cap.leading_zeros()) as usize;
        if inner.buckets.len() <= k {
            inner.buckets.resize_with(k + 1, Vec::new);
        }
        if inner.buckets[k].len() >= self.opts.max_buffers_per_bucket {
            inner.stats.dropped_on_return = inner.stats.dropped_on_return.saturating_add(1);
            return;
        }

        inner.buckets[k].push(buf);
        inner.stats.retained_buffers = inner.stats.retained_buffers.saturating_add(1);
        inner.stats.retained_elements = inner.stats.retained_elements.saturating_add(cap);
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new(PoolOpts::default())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/pool.rs"]
mod tests;
