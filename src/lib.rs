//! # rowpack - Packed Row Container for Analytic Operators
//!
//! rowpack is the in-memory working set of stateful query operators: hash
//! aggregation, hash-join build sides, order-by and similar operators
//! materialize their state as packed binary tuples ("rows") inside a
//! `RowContainer`. Rows are laid out contiguously so that hashing,
//! comparison and aggregate updates touch as few cache lines as possible,
//! and so that a whole row can be referenced by a single raw address.
//!
//! ## Row Anatomy
//!
//! ```text
//!         -8        0
//!          |        |
//! +--------+--------+-----------+-------+--------------+------------+------+------+
//! | norm.  | key    | flag bits | accu- | dependent    | row size   | next |align |
//! | key    | fields | (nulls,   | mu-   | fields       | tracker    | row  | pad  |
//! | prefix |        | probed,   | lators|              | (u32, opt) | (opt)|      |
//! | (opt)  |        | free)     |       |              |            |      |      |
//! +--------+--------+-----------+-------+--------------+------------+------+------+
//! ```
//!
//! The free list is threaded through the first pointer-sized slot of freed
//! rows, and duplicate-key chains (hash-join build sides) through the
//! optional next-row slot. Both overlays live inside container-owned slab
//! memory; the container owns every row from allocation to `clear`.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------+
//! |            RowContainer (container)        |
//! |  store / extract / hash / compare / spill  |
//! +------------------+-------------------------+
//! |  RowLayout       |  RowPartitions + SIMD   |
//! |  (layout)        |  partition scan         |
//! +------------------+-------------------------+
//! |  RowArena (slabs)  |  StringArena (pieces) |
//! +--------------------+-----------------------+
//! |      TypeKind / Value / Column (types)     |
//! +--------------------------------------------+
//! ```
//!
//! ## Module Overview
//!
//! - [`types`]: closed type-kind enumeration, decoded values and columns
//! - [`memory`]: slab arena for rows, multi-piece arena for strings
//! - [`layout`]: pure row-layout planner (offsets, flag bits, alignment)
//! - [`container`]: the row container, typed value I/O, hash and compare,
//!   partitioned enumeration, column statistics
//! - [`config`]: size constants shared across the crate
//!
//! ## Concurrency Contract
//!
//! The container is single-writer. Readers that only hash, compare or
//! extract may run concurrently on a frozen container; callers provide
//! external synchronization. There are no internal locks.

#[macro_use]
mod macros;

pub mod config;
pub mod container;
pub mod layout;
pub mod memory;
pub mod types;

pub use container::{
    Accumulator, AccumulatorOps, ColumnStats, CompareFlags, RowComparator, RowContainer,
    RowContainerIterator, RowContainerParams, RowListMode, RowPartitions, RowPtr, SortOrder,
    NULL_HASH,
};
pub use layout::{RowColumn, RowLayout};
pub use types::{Column, ColumnType, CustomComparator, StringDesc, TypeKind, Value};
