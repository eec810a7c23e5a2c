//! Temporary-resource pool shared by the backends.
//!
//! Intermediate buffers are requested by descriptor every frame and handed
//! back at cleanup. The [`TemporaryPool`] keeps released storage in buckets
//! keyed by descriptor so the next request of the same shape reuses it, and
//! tracks allocated and in-use bytes against an optional budget.

use std::collections::HashMap;

use crate::error::PassError;
use crate::target::BufferDesc;

/// A pool of released buffers bucketed by descriptor.
pub struct TemporaryPool<T> {
    free: HashMap<BufferDesc, Vec<T>>,
    /// Total bytes currently allocated (in-use + pooled).
    total_allocated: u64,
    /// Total bytes currently handed out.
    in_use: u64,
    /// Upper bound on `total_allocated`, if any.
    budget: Option<u64>,
    outstanding: usize,
}

impl<T> TemporaryPool<T> {
    /// Create an empty, unbounded pool.
    pub fn new() -> Self {
        Self {
            free: HashMap::new(),
            total_allocated: 0,
            in_use: 0,
            budget: None,
            outstanding: 0,
        }
    }

    /// Create an empty pool that refuses to grow past `bytes`.
    pub fn with_budget(bytes: u64) -> Self {
        Self {
            budget: Some(bytes),
            ..Self::new()
        }
    }

    /// Acquire a buffer matching `desc`.
    ///
    /// Returns pooled storage if available, otherwise calls `create`. When the
    /// budget would be exceeded, pooled buffers of other shapes are dropped
    /// first; if that is not enough the request fails.
    pub fn acquire(
        &mut self,
        desc: &BufferDesc,
        create: impl FnOnce() -> Result<T, PassError>,
    ) -> Result<T, PassError> {
        let size = desc.byte_size();

        if let Some(item) = self.free.get_mut(desc).and_then(Vec::pop) {
            self.in_use += size;
            self.outstanding += 1;
            log::trace!("Reused pooled {} ({}x{})", desc.label, desc.width, desc.height);
            return Ok(item);
        }

        if let Some(budget) = self.budget {
            if self.total_allocated + size > budget {
                self.drop_free();
            }
            if self.total_allocated + size > budget {
                return Err(PassError::ResourceAllocation {
                    width: desc.width,
                    height: desc.height,
                    reason: format!(
                        "temporary budget of {budget} bytes exhausted ({} in use)",
                        self.in_use
                    ),
                });
            }
        }

        let item = create()?;
        self.total_allocated += size;
        self.in_use += size;
        self.outstanding += 1;
        log::debug!(
            "Allocated {} ({}x{}, {} bytes)",
            desc.label,
            desc.width,
            desc.height,
            size
        );
        Ok(item)
    }

    /// Return a buffer to the pool for reuse.
    pub fn release(&mut self, desc: &BufferDesc, item: T) {
        self.in_use = self.in_use.saturating_sub(desc.byte_size());
        self.outstanding = self.outstanding.saturating_sub(1);
        self.free.entry(*desc).or_default().push(item);
    }

    /// Drop every pooled (not in-use) buffer.
    pub fn drop_free(&mut self) {
        for (desc, items) in self.free.drain() {
            let freed = desc.byte_size() * items.len() as u64;
            self.total_allocated = self.total_allocated.saturating_sub(freed);
        }
    }

    /// Bytes currently handed out.
    pub fn memory_in_use(&self) -> u64 {
        self.in_use
    }

    /// Bytes allocated, including pooled free buffers.
    pub fn memory_allocated(&self) -> u64 {
        self.total_allocated
    }

    /// Number of pooled buffers ready for reuse.
    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Buffers acquired and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }
}

impl<T> Default for TemporaryPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
