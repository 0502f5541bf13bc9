use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::BytesMut;
use crossbeam::queue::ArrayQueue;

/// A bounded set of block sized buffers shared by every transfer.
///
/// Buffers are allocated lazily up to `capacity`. Once they are all out,
/// [`BufferPool::acquire`] fails until some are released.
pub struct BufferPool {
    free: ArrayQueue<BytesMut>,
    allocated: AtomicUsize,
    buffer_size: usize,
}

impl BufferPool {
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        Self {
            free: ArrayQueue::new(capacity.max(1)),
            allocated: AtomicUsize::new(0),
            buffer_size,
        }
    }

    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// An empty buffer with room for one block, `None` when the pool is
    /// exhausted.
    pub fn acquire(&self) -> Option<BytesMut> {
        if let Some(buf) = self.free.pop() {
            return Some(buf);
        }

        let reserved = self
            .allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity()).then_some(n + 1)
            })
            .is_ok();

        reserved.then(|| BytesMut::with_capacity(self.buffer_size))
    }

    pub fn release(&self, mut buf: BytesMut) {
        buf.clear();
        // full only if the buffer didn't come from this pool
        let _ = self.free.push(buf);
    }

    pub fn release_all(&self, bufs: impl IntoIterator<Item = BytesMut>) {
        for buf in bufs {
            self.release(buf);
        }
    }

    /// Buffers that can still be acquired.
    pub fn available(&self) -> usize {
        self.free.len() + self.capacity().saturating_sub(self.allocated.load(Ordering::Acquire))
    }

    /// Buffers currently out of the pool.
    pub fn in_use(&self) -> usize {
        self.capacity().saturating_sub(self.available())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_is_bounded() {
        let pool = BufferPool::new(2, 4);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(a.capacity() >= 4);
        assert!(pool.acquire().is_none());
        assert_eq!(pool.in_use(), 2);

        pool.release(a);
        assert_eq!(pool.available(), 1);
        let a = pool.acquire().unwrap();
        assert!(a.is_empty());

        pool.release_all([a, b]);
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn released_buffers_are_cleared() {
        let pool = BufferPool::new(1, 4);
        let mut buf = pool.acquire().unwrap();
        buf.extend_from_slice(b"AAAA");
        pool.release(buf);
        assert!(pool.acquire().unwrap().is_empty());
    }
}
