//! # rowpack Configuration Constants
//!
//! This module centralizes size constants, grouping interdependent values
//! together and documenting their relationships. Constants that depend on
//! each other are co-located to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! ROW_SLAB_SIZE (64 KiB)
//!       |
//!       +-> grown per-allocation when a single row (plus its normalized
//!           key prefix) would not fit; the arena never splits a row
//!
//! STRING_SLAB_SIZE (64 KiB)
//!       |
//!       +-> PIECE_HEADER_SIZE (16 bytes, fixed by the PieceHeader struct)
//!       |
//!       +-> MIN_PIECE_PAYLOAD (32 bytes)
//!             A slab tail smaller than PIECE_HEADER_SIZE +
//!             MIN_PIECE_PAYLOAD is abandoned rather than carved into a
//!             uselessly small piece.
//!
//! STRING_INLINE_MAX (12 bytes)
//!       |
//!       +-> STRING_DESC_SIZE (16 bytes): 4-byte length + 12 bytes that
//!           hold either inline data or a 4-byte prefix and 8-byte pointer
//!
//! SIMD_BATCH (32 bytes)
//!       |
//!       +-> PARTITION_RUN_SIZE (4096): partition-id runs must be a
//!           multiple of SIMD_BATCH so a compare batch never straddles
//!           two runs
//!
//! HUGE_PAGE_SIZE (2 MiB)
//!       |
//!       +-> size_increment() rounds its answer up to this unit; spill
//!           planning reserves whole huge pages
//! ```
//!
//! ## Critical Invariants
//!
//! Enforced by compile-time assertions below:
//!
//! 1. `PARTITION_RUN_SIZE % SIMD_BATCH == 0` (batches never straddle runs)
//! 2. `STRING_INLINE_MAX + 4 == STRING_DESC_SIZE` (descriptor layout)
//! 3. Slab sizes are powers of two

/// Default slab size for the row arena.
pub const ROW_SLAB_SIZE: usize = 64 * 1024;

/// Default slab size for the string arena.
pub const STRING_SLAB_SIZE: usize = 64 * 1024;

/// Size of the piece header that precedes every string-arena block.
pub const PIECE_HEADER_SIZE: usize = 16;

/// Smallest payload worth carving out of a slab tail.
pub const MIN_PIECE_PAYLOAD: usize = 32;

/// Maximum string length stored inline in a `StringDesc`.
pub const STRING_INLINE_MAX: usize = 12;

/// Size of the in-row string descriptor.
pub const STRING_DESC_SIZE: usize = 16;

/// Width of one partition-scan compare batch, in bytes (one row per byte).
pub const SIMD_BATCH: usize = 32;

/// Size of one run of the partition-id vector.
pub const PARTITION_RUN_SIZE: usize = 4096;

/// Rounding unit for `size_increment`: the practical minimum growth step
/// once a container is a spill candidate.
pub const HUGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// Number of rows destroyed per batch while clearing a container whose
/// accumulators hold external memory.
pub const CLEAR_BATCH: usize = 1000;

/// Width of the normalized-key prefix before alignment rounding.
pub const NORMALIZED_KEY_WIDTH: usize = 8;

const _: () = assert!(PARTITION_RUN_SIZE % SIMD_BATCH == 0);
const _: () = assert!(STRING_INLINE_MAX + 4 == STRING_DESC_SIZE);
const _: () = assert!(ROW_SLAB_SIZE.is_power_of_two());
const _: () = assert!(STRING_SLAB_SIZE.is_power_of_two());
const _: () = assert!(HUGE_PAGE_SIZE.is_power_of_two());
