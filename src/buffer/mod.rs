//! Fixed-capacity buffer pool
//!
//! A window owns a small pool of pixel buffers. Each slot carries a busy flag
//! that is set when the buffer is handed to the compositor and cleared only
//! by the compositor's release notification. Slots are backed lazily: the
//! first time a free slot is acquired, its buffer is allocated.
//!
//! ```
//! use shmview::buffer::BufferPool;
//!
//! let mut pool: BufferPool<Vec<u8>, 2> = BufferPool::new();
//! let slot = pool
//!     .acquire_with(|_| Ok::<_, ()>(vec![0xff; 16]))
//!     .unwrap()
//!     .expect("fresh pool has a free slot");
//! pool.mark_busy(slot);
//! assert_eq!(pool.busy_count(), 1);
//! pool.release(slot);
//! assert_eq!(pool.busy_count(), 0);
//! ```

pub mod canvas;
pub mod shm;

use log::trace;

pub use canvas::Canvas;
pub use shm::ShmBuffer;

/// Number of buffers a window cycles through
pub const DOUBLE_BUFFERED: usize = 2;

#[derive(Debug)]
struct Slot<T> {
    buffer: Option<T>,
    busy: bool,
}

/// Pool of at most `N` lazily allocated buffers with per-slot busy flags
#[derive(Debug)]
pub struct BufferPool<T, const N: usize> {
    slots: [Slot<T>; N],
}

impl<T, const N: usize> BufferPool<T, N> {
    /// Create a pool with every slot free and unallocated
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot {
                buffer: None,
                busy: false,
            }),
        }
    }

    /// Number of slots in the pool
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Select the first slot that is not busy, allocating its buffer with
    /// `alloc` if the slot has never been backed.
    ///
    /// Returns `Ok(None)` when every slot is busy. An allocation error leaves
    /// the slot unallocated.
    pub fn acquire_with<E>(
        &mut self,
        alloc: impl FnOnce(usize) -> Result<T, E>,
    ) -> Result<Option<usize>, E> {
        let Some(index) = self.slots.iter().position(|slot| !slot.busy) else {
            return Ok(None);
        };

        let slot = &mut self.slots[index];
        if slot.buffer.is_none() {
            trace!("allocating buffer for slot {}", index);
            slot.buffer = Some(alloc(index)?);
        }
        Ok(Some(index))
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.buffer.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.buffer.as_mut()
    }

    /// Mark a slot as held by the compositor
    pub fn mark_busy(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.busy = true;
        }
    }

    /// Clear a slot's busy flag. Returns whether it was busy.
    pub fn release(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => std::mem::replace(&mut slot.busy, false),
            None => false,
        }
    }

    pub fn is_busy(&self, index: usize) -> bool {
        self.slots.get(index).map_or(false, |slot| slot.busy)
    }

    /// Slots currently held by the compositor
    pub fn busy_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.busy).count()
    }

    /// Slots that have backing memory
    pub fn allocated(&self) -> usize {
        self.slots.iter().filter(|slot| slot.buffer.is_some()).count()
    }

    /// Remove every allocated buffer, leaving the pool empty and idle
    pub fn drain(&mut self) -> Vec<T> {
        self.slots
            .iter_mut()
            .filter_map(|slot| {
                slot.busy = false;
                slot.buffer.take()
            })
            .collect()
    }
}

impl<T, const N: usize> Default for BufferPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
