//! # String Arena
//!
//! Multi-piece arena owning every variable-width byte referenced from row
//! fields. Values are stored as chains of blocks; each block is a 16-byte
//! header followed by its payload:
//!
//! ```text
//! Offset  Size  Description
//! ------  ----  -----------------------------------------------
//! 0       4     len: payload bytes used in this piece
//! 4       4     capacity: payload bytes this block can hold
//! 8       8     next: address of the next piece header (0 = none)
//! ```
//!
//! A value is stored whole when it fits the current slab; otherwise it is
//! fragmented across pieces, which readers reassemble through
//! [`PieceStream`]. Freed blocks are recycled through power-of-two
//! size-class free lists, so erase-then-insert workloads reuse space
//! instead of growing the arena.
//!
//! ## Accounting
//!
//! - `retained_bytes`: heap bytes reserved in slabs
//! - `free_space`: reusable bytes (free-listed blocks + current slab tail)
//! - `cumulative_allocated`: monotonic count of block bytes handed out,
//!   consumed by the per-row size tracker

use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::{MIN_PIECE_PAYLOAD, PIECE_HEADER_SIZE, STRING_SLAB_SIZE};
use crate::memory::slab::Slab;

const NUM_CLASSES: usize = 32;

/// Header preceding every block payload. Alignment 1 by construction, so
/// headers can sit at any carve offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PieceHeader {
    len: U32,
    capacity: U32,
    next: U64,
}

impl PieceHeader {
    zerocopy_accessors! {
        len: u32,
        capacity: u32,
        next: u64,
    }
}

const _: () = assert!(size_of::<PieceHeader>() == PIECE_HEADER_SIZE);
const _: () = assert!(align_of::<PieceHeader>() == 1);

pub struct StringArena {
    slabs: Vec<Slab>,
    slab_size: usize,
    /// Free blocks by size class: class `i` holds blocks whose payload
    /// capacity is at least `1 << i`.
    free_lists: Vec<Vec<*mut u8>>,
    free_list_bytes: usize,
    cumulative_allocated: u64,
}

impl StringArena {
    pub fn new() -> Self {
        Self::with_slab_size(STRING_SLAB_SIZE)
    }

    /// A custom slab size, mainly for tests that want to force
    /// fragmentation across slab boundaries.
    pub fn with_slab_size(slab_size: usize) -> Self {
        debug_assert!(slab_size > PIECE_HEADER_SIZE + MIN_PIECE_PAYLOAD);
        Self {
            slabs: Vec::new(),
            slab_size,
            free_lists: vec![Vec::new(); NUM_CLASSES],
            free_list_bytes: 0,
            cumulative_allocated: 0,
        }
    }

    /// Copies `data` into the arena, fragmenting across pieces as needed,
    /// and returns the address of the first piece's payload.
    pub fn copy_multipart(&mut self, data: &[u8]) -> *const u8 {
        debug_assert!(!data.is_empty());
        let mut remaining = data;
        let mut first_payload: *const u8 = std::ptr::null();
        let mut prev_header: *mut u8 = std::ptr::null_mut();
        while !remaining.is_empty() {
            let (header, capacity) = self.alloc_block(remaining.len());
            let take = remaining.len().min(capacity);
            // SAFETY: alloc_block returned a block with at least `capacity`
            // payload bytes after a PIECE_HEADER_SIZE header; header
            // alignment is 1.
            unsafe {
                let hdr = &mut *(header as *mut PieceHeader);
                hdr.set_len(take as u32);
                hdr.set_capacity(capacity as u32);
                hdr.set_next(0);
                let payload = header.add(PIECE_HEADER_SIZE);
                std::ptr::copy_nonoverlapping(remaining.as_ptr(), payload, take);
                if first_payload.is_null() {
                    first_payload = payload;
                } else {
                    (*(prev_header as *mut PieceHeader)).set_next(header as u64);
                }
            }
            prev_header = header;
            remaining = &remaining[take..];
        }
        first_payload
    }

    /// Returns the whole chain starting at `data` to the free lists.
    ///
    /// # Safety
    ///
    /// `data` must be a payload address previously returned by
    /// `copy_multipart` on this arena and not freed since.
    pub unsafe fn free(&mut self, data: *const u8) {
        let mut header = (data as *mut u8).sub(PIECE_HEADER_SIZE);
        while !header.is_null() {
            let (capacity, next) = {
                let hdr = &*(header as *const PieceHeader);
                (hdr.capacity() as usize, hdr.next())
            };
            let class = Self::free_class(capacity);
            self.free_lists[class].push(header);
            self.free_list_bytes += PIECE_HEADER_SIZE + capacity;
            header = next as usize as *mut u8;
        }
    }

    /// True when the value starting at `data` is stored in one piece.
    ///
    /// # Safety
    ///
    /// `data` must be a live payload address of this arena.
    pub unsafe fn is_contiguous(&self, data: *const u8, len: usize) -> bool {
        let header = &*(data.sub(PIECE_HEADER_SIZE) as *const PieceHeader);
        header.len() as usize >= len
    }

    /// Borrows a contiguous value. Callers check `is_contiguous` first.
    ///
    /// # Safety
    ///
    /// `data` must point at a live payload of this arena holding at least
    /// `len` contiguous bytes.
    pub unsafe fn contiguous_slice(&self, data: *const u8, len: usize) -> &[u8] {
        std::slice::from_raw_parts(data, len)
    }

    /// Streams the pieces of the value starting at `data`.
    ///
    /// # Safety
    ///
    /// `data` must be a live payload address of this arena.
    pub unsafe fn stream(&self, data: *const u8) -> PieceStream<'_> {
        PieceStream {
            header: data.sub(PIECE_HEADER_SIZE),
            _arena: std::marker::PhantomData,
        }
    }

    /// Reassembles `len` bytes starting at `data` into `out`.
    ///
    /// # Safety
    ///
    /// `data` must be a live payload address of this arena holding at
    /// least `len` logical bytes.
    pub unsafe fn read_into(&self, data: *const u8, len: usize, out: &mut Vec<u8>) {
        out.reserve(len);
        let mut left = len;
        for piece in self.stream(data) {
            if left == 0 {
                break;
            }
            let take = piece.len().min(left);
            out.extend_from_slice(&piece[..take]);
            left -= take;
        }
        debug_assert_eq!(left, 0, "value chain shorter than recorded length");
    }

    pub fn retained_bytes(&self) -> usize {
        self.slabs.iter().map(Slab::capacity).sum()
    }

    pub fn free_space(&self) -> usize {
        let tail = self.slabs.last().map_or(0, Slab::remaining);
        tail + self.free_list_bytes
    }

    /// Monotonic count of block bytes handed out. Never decreases; the
    /// row-size tracker charges deltas of this counter to rows.
    pub fn cumulative_allocated(&self) -> u64 {
        self.cumulative_allocated
    }

    /// Releases all slabs and free lists. Every address handed out by
    /// this arena dies here.
    pub fn clear(&mut self) {
        self.slabs.clear();
        for list in &mut self.free_lists {
            list.clear();
        }
        self.free_list_bytes = 0;
    }

    /// Hands out a block with at least `MIN_PIECE_PAYLOAD` and at most
    /// `desired` payload capacity, preferring recycled blocks.
    fn alloc_block(&mut self, desired: usize) -> (*mut u8, usize) {
        let want = desired.max(MIN_PIECE_PAYLOAD);
        for class in Self::alloc_class(want)..NUM_CLASSES {
            if let Some(header) = self.free_lists[class].pop() {
                // SAFETY: free-listed headers belong to this arena.
                let capacity = unsafe { (*(header as *const PieceHeader)).capacity() as usize };
                self.free_list_bytes -= PIECE_HEADER_SIZE + capacity;
                self.cumulative_allocated += (PIECE_HEADER_SIZE + capacity) as u64;
                return (header, capacity);
            }
        }

        let needs_new = match self.slabs.last() {
            Some(slab) => slab.remaining() < PIECE_HEADER_SIZE + MIN_PIECE_PAYLOAD,
            None => true,
        };
        if needs_new {
            self.slabs.push(Slab::new(self.slab_size, 1));
        }
        let slab = self.slabs.last_mut().unwrap();
        let capacity = want.min(slab.remaining() - PIECE_HEADER_SIZE);
        let header = slab.bump(PIECE_HEADER_SIZE + capacity);
        self.cumulative_allocated += (PIECE_HEADER_SIZE + capacity) as u64;
        (header, capacity)
    }

    /// Smallest class whose blocks are guaranteed to hold `size` bytes.
    fn alloc_class(size: usize) -> usize {
        (usize::BITS - (size - 1).leading_zeros()) as usize
    }

    /// Class a freed block of `capacity` payload bytes files under.
    fn free_class(capacity: usize) -> usize {
        ((usize::BITS - 1) - capacity.leading_zeros()) as usize
    }
}

impl Default for StringArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the payload slices of one value chain.
pub struct PieceStream<'a> {
    header: *const u8,
    _arena: std::marker::PhantomData<&'a StringArena>,
}

impl<'a> Iterator for PieceStream<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.header.is_null() {
            return None;
        }
        // SAFETY: the chain was written by copy_multipart; each header is
        // followed by at least `len` payload bytes, and `next` is either 0
        // or another live header in the same arena.
        unsafe {
            let hdr = &*(self.header as *const PieceHeader);
            let payload =
                std::slice::from_raw_parts(self.header.add(PIECE_HEADER_SIZE), hdr.len() as usize);
            let next = hdr.next();
            self.header = next as usize as *const u8;
            Some(payload)
        }
    }
}
