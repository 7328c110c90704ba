//! Fixed-size byte buffer pool.
//!
//! # Responsibilities
//! - Hand out buffers of exactly `size` bytes for response body copies
//! - Take buffers back, discarding any whose capacity drifted
//! - Track checked-out buffers and trim the free list after idle periods
//!
//! # Design Decisions
//! - Explicit free list plus checked-out counter behind one mutex; the lock
//!   is held for bookkeeping only, never across I/O
//! - `acquire` never blocks: an empty free list means a fresh allocation
//! - Idle cleanup is a spawned task armed when `active` drops to zero and
//!   aborted on the next `acquire`

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::config::BufferConfig;
use crate::observability::metrics;

/// Upper bound on buffers dropped by a single idle cleanup.
const IDLE_DRAIN_LIMIT: usize = 10;

#[derive(Debug, Default)]
struct PoolState {
    free: Vec<Vec<u8>>,
    active: usize,
    idle_task: Option<AbortHandle>,
    /// Bumped on every acquire and every arm; a cleanup only acts if it
    /// still carries the current value.
    idle_generation: u64,
}

#[derive(Debug)]
struct PoolInner {
    size: usize,
    max_idle: usize,
    idle_timeout: Duration,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Bookkeeping stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn idle_cleanup(&self, generation: u64) {
        let mut state = self.lock();
        if state.idle_generation != generation {
            return;
        }
        state.idle_task = None;
        if state.active > 0 {
            return;
        }

        let keep = state.free.len().saturating_sub(IDLE_DRAIN_LIMIT);
        let drained = state.free.len() - keep;
        state.free.truncate(keep);
        state.free.shrink_to_fit();
        let remaining = state.free.len();
        drop(state);

        metrics::record_buffer_pool(0, remaining);
        tracing::info!(drained, remaining, "Buffer pool cleaned after idle timeout");
    }
}

/// Pool of reusable `size`-byte buffers. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new(size: usize, idle_timeout: Duration, max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                size,
                max_idle,
                idle_timeout,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    pub fn from_config(config: &BufferConfig) -> Self {
        Self::new(config.size_bytes, config.idle_timeout(), config.max_idle)
    }

    /// Check out a buffer of exactly [`size`](Self::size) bytes.
    pub fn acquire(&self) -> PooledBuffer {
        let (reused, active, pooled) = {
            let mut state = self.inner.lock();
            if let Some(task) = state.idle_task.take() {
                task.abort();
            }
            state.idle_generation += 1;
            state.active += 1;
            let reused = state.free.pop();
            (reused, state.active, state.free.len())
        };
        metrics::record_buffer_pool(active, pooled);

        let buf = reused.unwrap_or_else(|| vec![0; self.inner.size]);
        PooledBuffer {
            buf: Some(buf),
            pool: self.clone(),
        }
    }

    /// Return a buffer. Buffers whose capacity is not `size` are dropped.
    pub fn release(&self, mut buf: Vec<u8>) {
        let size = self.inner.size;
        let reusable = buf.capacity() == size;
        if reusable {
            buf.resize(size, 0);
        }

        let (active, pooled) = {
            let mut state = self.inner.lock();
            if reusable && state.free.len() < self.inner.max_idle {
                state.free.push(buf);
            }
            state.active = state.active.saturating_sub(1);
            if state.active == 0 {
                self.arm_idle_cleanup(&mut state);
            }
            (state.active, state.free.len())
        };
        metrics::record_buffer_pool(active, pooled);
    }

    fn arm_idle_cleanup(&self, state: &mut PoolState) {
        if let Some(task) = state.idle_task.take() {
            task.abort();
        }
        // Outside a runtime there is nothing to schedule on; buffers stay pooled.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        state.idle_generation += 1;
        let generation = state.idle_generation;
        let weak: Weak<PoolInner> = Arc::downgrade(&self.inner);
        let timeout = self.inner.idle_timeout;
        let task = handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.idle_cleanup(generation);
            }
        });
        state.idle_task = Some(task.abort_handle());
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Buffers currently checked out.
    pub fn active(&self) -> usize {
        self.inner.lock().active
    }

    /// Buffers currently held for reuse.
    pub fn pooled(&self) -> usize {
        self.inner.lock().free.len()
    }
}

/// A checked-out buffer. Returned to its pool on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Option<Vec<u8>>,
    pool: BufferPool,
}

impl PooledBuffer {
    /// Detach the buffer from the pool without returning it. The checkout
    /// stays counted until the vector is handed to [`BufferPool::release`].
    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.take().unwrap_or_default()
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
