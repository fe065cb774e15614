//! Pooled packet buffers with guaranteed release on every exit path.

use parking_lot::Mutex;
use std::sync::Arc;

/// Default capacity reserved for a freshly allocated buffer.
const DEFAULT_BUF_CAPACITY: usize = 1500;

struct Inner {
    free: Mutex<Vec<Vec<u8>>>,
}

/// A free-list of reusable byte buffers.
///
/// `alloc()` pops a buffer from the free list or allocates a fresh one.
/// The returned [`PooledPacket`] returns its buffer to the pool on `Drop`,
/// so release happens on every exit path — including an error propagated
/// through `?` — without relying on call sites to remember an explicit free.
#[derive(Clone)]
pub struct PacketPool {
    inner: Arc<Inner>,
}

impl PacketPool {
    pub fn new() -> Self {
        PacketPool {
            inner: Arc::new(Inner {
                free: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Allocate a buffer, reusing one from the free list when available.
    pub fn alloc(&self) -> PooledPacket {
        let buf = self
            .inner
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(DEFAULT_BUF_CAPACITY));
        PooledPacket {
            buf: Some(buf),
            pool: self.inner.clone(),
        }
    }

    /// Number of buffers currently sitting idle in the free list.
    pub fn idle_count(&self) -> usize {
        self.inner.free.lock().len()
    }
}

impl Default for PacketPool {
    fn default() -> Self {
        Self::new()
    }
}

/// An owned, scoped packet buffer borrowed from a [`PacketPool`].
///
/// Derefs to `Vec<u8>` for reading/writing; the buffer is cleared and
/// returned to the pool's free list when this value is dropped.
pub struct PooledPacket {
    buf: Option<Vec<u8>>,
    pool: Arc<Inner>,
}

impl std::ops::Deref for PooledPacket {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        self.buf.as_ref().expect("buffer taken before drop")
    }
}

impl std::ops::DerefMut for PooledPacket {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.as_mut().expect("buffer taken before drop")
    }
}

impl Drop for PooledPacket {
    fn drop(&mut self) {
        if let Some(mut buf) = self.buf.take() {
            buf.clear();
            self.pool.free.lock().push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_drop_returns_to_pool() {
        let pool = PacketPool::new();
        assert_eq!(pool.idle_count(), 0);
        {
            let mut packet = pool.alloc();
            packet.extend_from_slice(&[1, 2, 3]);
        }
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn reused_buffer_is_cleared() {
        let pool = PacketPool::new();
        {
            let mut packet = pool.alloc();
            packet.extend_from_slice(&[9, 9, 9]);
        }
        let packet = pool.alloc();
        assert!(packet.is_empty());
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn no_leak_across_many_alloc_free_cycles() {
        let pool = PacketPool::new();
        for _ in 0..100 {
            let _packet = pool.alloc();
        }
        assert_eq!(pool.idle_count(), 100);
    }
}
