//! Device buffer cache
//!
//! Inference calls the multiply with the same three tags and the same sizes
//! on every layer, so device buffers are allocated once per distinct
//! `(tag, len)` and reused for the lifetime of the session.

use std::collections::HashMap;

use crate::error::Result;
use crate::runtime::DeviceBuffer;

/// Cache key: logical tag plus element count
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferKey {
    /// Logical tag ("xout", "x", "w", ...)
    pub tag: &'static str,
    /// Element count
    pub len: usize,
}

impl BufferKey {
    /// Create a key
    pub fn new(tag: &'static str, len: usize) -> Self {
        Self { tag, len }
    }
}

/// Registry of reusable device buffers keyed by [`BufferKey`].
///
/// Lookup is exact on both tag and length. At most one buffer exists per
/// key; buffers are never freed individually, only drained at release.
pub struct BufferCache<B> {
    buffers: HashMap<BufferKey, B>,
}

impl<B: DeviceBuffer> BufferCache<B> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
        }
    }

    /// Return the buffer for `(tag, len)`, allocating it with `alloc` on a miss.
    ///
    /// A failed allocation is not registered and leaves the cache unchanged.
    pub fn acquire<F>(&mut self, tag: &'static str, len: usize, alloc: F) -> Result<B>
    where
        F: FnOnce(&'static str, usize) -> Result<B>,
    {
        let key = BufferKey::new(tag, len);
        if let Some(buffer) = self.buffers.get(&key) {
            log::trace!("BufferCache: reused buffer tag={} len={}", tag, len);
            return Ok(buffer.clone());
        }

        let buffer = alloc(tag, len)?;
        log::trace!("BufferCache: created buffer tag={} len={}", tag, len);
        self.buffers.insert(key, buffer.clone());
        Ok(buffer)
    }

    /// Look up a buffer without allocating
    pub fn get(&self, tag: &'static str, len: usize) -> Option<&B> {
        self.buffers.get(&BufferKey::new(tag, len))
    }

    /// Number of cached buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the cache holds no buffers
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Total device memory held by the cache, in bytes
    pub fn size_bytes(&self) -> usize {
        self.buffers.values().map(DeviceBuffer::size_bytes).sum()
    }

    /// Remove and return every cached buffer
    pub fn drain(&mut self) -> impl Iterator<Item = (BufferKey, B)> + '_ {
        self.buffers.drain()
    }
}

impl<B: DeviceBuffer> Default for BufferCache<B> {
    fn default() -> Self {
        Self::new()
    }
}
