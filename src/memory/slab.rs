//! Heap slab shared by the row and string arenas: a fixed-capacity,
//! aligned allocation with a bump cursor. Slabs never move or shrink, so
//! every address handed out stays valid until the owning arena is cleared.

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

pub(crate) struct Slab {
    ptr: NonNull<u8>,
    layout: Layout,
    used: usize,
}

impl Slab {
    /// Allocates a slab of `capacity` bytes aligned to `align`.
    ///
    /// Panics on allocation failure, matching the global allocator
    /// contract; capacity and alignment are container-derived constants.
    pub(crate) fn new(capacity: usize, align: usize) -> Self {
        debug_assert!(align.is_power_of_two());
        let layout = Layout::from_size_align(capacity, align).expect("slab layout");
        // SAFETY: layout has non-zero size; alloc failure is checked below.
        let raw = unsafe { alloc(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
        Self {
            ptr,
            layout,
            used: 0,
        }
    }

    #[inline]
    pub(crate) fn base(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.used
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.layout.size() - self.used
    }

    /// Bumps the cursor by `size` bytes and returns the slot address.
    /// The caller has verified `size <= remaining()`.
    pub(crate) fn bump(&mut self, size: usize) -> *mut u8 {
        debug_assert!(size <= self.remaining());
        // SAFETY: used + size <= capacity, so the offset stays in bounds.
        let slot = unsafe { self.ptr.as_ptr().add(self.used) };
        self.used += size;
        slot
    }
}

impl Drop for Slab {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with this exact layout in Slab::new.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

// Slabs are plain byte buffers; the owning arena enforces the
// single-writer contract.
unsafe impl Send for Slab {}
unsafe impl Sync for Slab {}
