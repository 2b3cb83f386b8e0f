//! # Row Container
//!
//! The packed, in-memory store of heterogeneously typed tuples backing
//! hash aggregation, hash-join build sides and order-by. Rows are
//! allocated out of a slab arena at a fixed per-container size computed by
//! the layout planner, recycled through a free list threaded through the
//! freed rows themselves, and referenced externally by raw address.
//!
//! ## Lifecycle
//!
//! A container is created with a fixed schema and accumulator set. Rows
//! are added with [`RowContainer::new_row`], populated column by column
//! through the typed value I/O, optionally probed and marked, and finally
//! erased in bulk or released wholesale via [`RowContainer::clear`].
//! Calling [`RowContainer::create_row_partitions`] freezes the container:
//! a one-way transition after which mutation fails.
//!
//! ## Safety Model
//!
//! Rows are raw addresses ([`RowPtr`]) into container-owned slabs.
//! Methods that dereference caller-supplied row pointers are `unsafe`;
//! their shared contract is:
//!
//! - the pointer was returned by `new_row` on **this** container,
//! - the row has not been erased since, and
//! - the container has not been cleared since.
//!
//! [`RowContainer::find_rows`] exists to validate addresses of unknown
//! provenance before trusting them.
//!
//! ## Module Structure
//!
//! - `mod`: row allocation, erasure, free list, sizing, probed flags
//! - `store`: typed value store and extract
//! - `serde`: self-describing value serde and the spill row format
//! - `hash`: per-kind hashing with the fixed mix function
//! - `compare`: three-way compare and `RowComparator`
//! - `stats`: per-column running statistics
//! - `iterator`: arena iteration in insertion order
//! - `partitions`: partition map and SIMD partitioned enumeration
//! - `accumulator`: accumulator descriptor and callbacks

pub mod accumulator;
pub mod compare;
pub mod hash;
pub mod iterator;
pub mod partitions;
pub mod serde;
pub mod simd_scan;
pub mod stats;
pub mod store;

#[cfg(test)]
mod tests;

pub use accumulator::{Accumulator, AccumulatorOps};
pub use compare::{CompareFlags, RowComparator, SortOrder};
pub use hash::{hash_mix, NULL_HASH};
pub use iterator::{RowContainerIterator, RowListMode};
pub use partitions::RowPartitions;
pub use stats::ColumnStats;

use eyre::{ensure, Result};

use crate::config::{CLEAR_BATCH, HUGE_PAGE_SIZE};
use crate::layout::{round_up, LayoutParams, RowColumn, RowLayout};
use crate::memory::{RowArena, StringArena};
use crate::types::{ColumnType, DataDesc, StringDesc, TypeKind};

/// A row address. Stable from allocation until erase or clear.
pub type RowPtr = *mut u8;

/// Creation parameters for a [`RowContainer`].
pub struct RowContainerParams {
    pub key_types: Vec<ColumnType>,
    pub nullable_keys: bool,
    pub accumulators: Vec<Accumulator>,
    pub dependent_types: Vec<ColumnType>,
    /// Reserve a next-row slot for chaining duplicate keys.
    pub has_next: bool,
    /// This container is a hash-join build side.
    pub is_join_build: bool,
    /// Reserve a probed bit per row.
    pub has_probed_flag: bool,
    /// Prefix rows with the 8-byte normalized key while cardinality permits.
    pub has_normalized_keys: bool,
}

pub struct RowContainer {
    /// Value column types: keys then dependents.
    types: Vec<ColumnType>,
    key_count: usize,
    nullable_keys: bool,
    is_join_build: bool,
    accumulators: Vec<Accumulator>,
    layout: RowLayout,
    rows: RowArena,
    strings: StringArena,
    num_rows: usize,
    num_free_rows: usize,
    first_free_row: RowPtr,
    num_rows_with_normalized_key: usize,
    /// Prefix size for new allocations; zero once normalized keys are
    /// disabled. `layout.original_normalized_key_size()` stays available
    /// for iteration over the prefixed segment.
    normalized_key_size: usize,
    uses_external_memory: bool,
    frozen: bool,
    /// Per-column running stats; `None` once invalidated (after `clear`).
    stats: Option<Vec<ColumnStats>>,
}

// Rows live in slabs owned by this container and the free list is an
// overlay inside them, so the container can move between threads. Shared
// (&self) use from several readers is allowed only on a frozen container;
// callers provide the synchronization (single-writer contract).
unsafe impl Send for RowContainer {}
unsafe impl Sync for RowContainer {}

impl RowContainer {
    pub fn new(params: RowContainerParams) -> Result<Self> {
        let layout = RowLayout::plan(&LayoutParams {
            key_types: &params.key_types,
            nullable_keys: params.nullable_keys,
            accumulators: &params.accumulators,
            dependent_types: &params.dependent_types,
            has_next: params.has_next,
            has_probed_flag: params.has_probed_flag,
            has_normalized_keys: params.has_normalized_keys,
        })?;

        let mut types = params.key_types;
        let key_count = types.len();
        types.extend(params.dependent_types);

        let uses_external_memory = params
            .accumulators
            .iter()
            .any(Accumulator::uses_external_memory);

        let rows = RowArena::new(layout.alignment());
        let normalized_key_size = layout.original_normalized_key_size();
        let stats = Some(vec![ColumnStats::default(); types.len()]);

        Ok(Self {
            types,
            key_count,
            nullable_keys: params.nullable_keys,
            is_join_build: params.is_join_build,
            accumulators: params.accumulators,
            layout,
            rows,
            strings: StringArena::new(),
            num_rows: 0,
            num_free_rows: 0,
            first_free_row: std::ptr::null_mut(),
            num_rows_with_normalized_key: 0,
            normalized_key_size,
            uses_external_memory,
            frozen: false,
            stats,
        })
    }

    /// Allocates a row: recycled from the free list when possible,
    /// otherwise carved out of the slab arena (with the normalized-key
    /// prefix while enabled). Fails once the container is frozen.
    pub fn new_row(&mut self) -> Result<RowPtr> {
        ensure!(!self.frozen, "container is frozen: cannot add rows");
        self.num_rows += 1;
        let row = if !self.first_free_row.is_null() {
            let row = self.first_free_row;
            // SAFETY: free-listed rows are live slots of this container
            // with the free bit set and the next pointer in their first
            // slot.
            unsafe {
                debug_assert!(is_bit_set(row, self.layout.free_flag_offset()));
                self.first_free_row = next_free(row);
            }
            self.num_free_rows -= 1;
            row
        } else {
            let base = self
                .rows
                .allocate_fixed(self.layout.fixed_row_size() + self.normalized_key_size);
            if self.normalized_key_size > 0 {
                self.num_rows_with_normalized_key += 1;
            }
            // SAFETY: the slot has normalized_key_size prefix bytes before
            // the payload the caller sees.
            unsafe { base.add(self.normalized_key_size) }
        };
        // SAFETY: row is a fresh or recycled slot of this container.
        unsafe { self.initialize_row(row, false) };
        Ok(row)
    }

    /// Re-initializes a row to the empty state: all flag bits clear, row
    /// size zeroed, free bit clear. With `reuse`, variable-width backing
    /// bytes are freed and accumulators destroyed first.
    ///
    /// # Safety
    ///
    /// `row` must be a live row of this container (see the module-level
    /// safety contract).
    pub unsafe fn initialize_row(&mut self, row: RowPtr, reuse: bool) {
        if reuse {
            let rows = [row];
            self.free_variable_width_fields(&rows);
            self.destroy_accumulators(&rows);
            debug_assert!(self.layout.next_offset().is_none());
        } else if self.layout.row_size_offset().is_some() {
            // Zero stale descriptors so erase and clear never chase
            // garbage pointers. Cheapest as a whole-row memset.
            std::ptr::write_bytes(row, 0, self.layout.fixed_row_size());
        }
        std::ptr::write_bytes(
            row.add(self.layout.flag_base()),
            0,
            self.layout.flag_bytes(),
        );
        if let Some(offset) = self.layout.row_size_offset() {
            (row.add(offset as usize) as *mut u32).write_unaligned(0);
        }
        if let Some(offset) = self.layout.next_offset() {
            // Duplicate chains are null-terminated.
            (row.add(offset as usize) as *mut RowPtr).write_unaligned(std::ptr::null_mut());
        }
        clear_bit(row, self.layout.free_flag_offset());
    }

    /// Erases rows: updates column stats, frees variable-width backing
    /// bytes, destroys accumulators, and pushes each row onto the free
    /// list. Erasing an already-freed row is an error.
    ///
    /// # Safety
    ///
    /// Every pointer in `rows` must be a live row of this container.
    pub unsafe fn erase_rows(&mut self, rows: &[RowPtr]) -> Result<()> {
        let free_flag = self.layout.free_flag_offset();
        for &row in rows {
            ensure!(!is_bit_set(row, free_flag), "double free of row");
        }
        self.free_rows_extra_memory(rows);
        for &row in rows {
            self.remove_row_column_stats(row, false);
            set_bit(row, free_flag);
            set_next_free(row, self.first_free_row);
            self.first_free_row = row;
        }
        self.num_free_rows += rows.len();
        Ok(())
    }

    /// Nulls every field of a live row, releasing variable-width backing
    /// bytes and reflecting the removal in column stats.
    ///
    /// # Safety
    ///
    /// `row` must be a live row of this container.
    pub unsafe fn set_all_null(&mut self, row: RowPtr) {
        debug_assert!(!is_bit_set(row, self.layout.free_flag_offset()));
        let rows = [row];
        self.remove_row_column_stats(row, true);
        self.free_variable_width_fields(&rows);
        for column in self.layout.columns() {
            if column.is_nullable() {
                set_bit(row, column.null_offset());
            }
        }
        for slot in self.layout.accumulator_slots() {
            set_bit(row, slot.null_bit);
        }
    }

    /// Destroys all rows and releases both arenas. Column statistics are
    /// invalidated: `column_stats` reads unknown from here on. The frozen
    /// state is not reset.
    pub fn clear(&mut self) {
        if self.uses_external_memory {
            let mut iter = RowContainerIterator::new();
            let mut batch: Vec<RowPtr> = Vec::with_capacity(CLEAR_BATCH);
            loop {
                batch.clear();
                if self.list_rows(&mut iter, CLEAR_BATCH, &mut batch) == 0 {
                    break;
                }
                // SAFETY: list_rows yields live rows of this container.
                unsafe { self.free_rows_extra_memory(&batch) };
            }
        }
        self.rows.clear();
        self.strings.clear();
        self.num_rows = 0;
        self.num_rows_with_normalized_key = 0;
        self.normalized_key_size = self.layout.original_normalized_key_size();
        self.num_free_rows = 0;
        self.first_free_row = std::ptr::null_mut();
        self.stats = None;
    }

    /// Filters `candidates` down to addresses that lie inside one of the
    /// container's slab ranges (range tops exclusive). Appends the
    /// accepted addresses to `out` and returns their count. Purely an
    /// address check; nothing is dereferenced.
    pub fn find_rows(&self, candidates: &[RowPtr], out: &mut Vec<RowPtr>) -> usize {
        let mut ranges: Vec<(usize, usize)> = self
            .rows
            .ranges()
            .map(|r| (r.start as usize, r.len))
            .collect();
        ranges.sort_unstable_by_key(|&(start, _)| start);
        let mut found = 0;
        for &row in candidates {
            let address = row as usize;
            let index = ranges.partition_point(|&(start, _)| start <= address);
            if index == 0 {
                continue;
            }
            let (start, len) = ranges[index - 1];
            if address < start + len {
                out.push(row);
                found += 1;
            }
        }
        found
    }

    /// Marks rows as probed. Null entries are skipped (a full-join probe
    /// batch carries them).
    ///
    /// # Safety
    ///
    /// Every non-null pointer in `rows` must be a live row of this
    /// container.
    pub unsafe fn set_probed_flag(&mut self, rows: &[RowPtr]) -> Result<()> {
        let probed = self.probed_flag()?;
        for &row in rows {
            if !row.is_null() {
                set_bit(row, probed);
            }
        }
        Ok(())
    }

    /// Extracts probed flags into a boolean column. Rows whose keys are
    /// null produce null when `set_null_for_null_keys_row`; non-probed
    /// rows produce null when `set_null_for_non_probed_row`.
    ///
    /// # Safety
    ///
    /// Every pointer in `rows` must be a live row of this container.
    pub unsafe fn extract_probed_flags(
        &self,
        rows: &[RowPtr],
        set_null_for_null_keys_row: bool,
        set_null_for_non_probed_row: bool,
        out: &mut crate::types::Column<'_>,
    ) -> Result<()> {
        use crate::types::Value;
        let probed = self.probed_flag()?;
        out.clear();
        for &row in rows {
            let mut null_result = false;
            if set_null_for_null_keys_row && self.nullable_keys {
                for column in &self.layout.columns()[..self.key_count] {
                    if self.is_null_at(row, *column) {
                        null_result = true;
                        break;
                    }
                }
            }
            if null_result {
                out.push(Value::Null);
                continue;
            }
            let is_probed = is_bit_set(row, probed);
            if set_null_for_non_probed_row && !is_probed {
                out.push(Value::Null);
            } else {
                out.push(Value::Boolean(is_probed));
            }
        }
        Ok(())
    }

    /// The next row in a duplicate-key chain, or null.
    ///
    /// # Safety
    ///
    /// `row` must be a live row of this container with a next-row slot.
    pub unsafe fn next_row(&self, row: RowPtr) -> RowPtr {
        let offset = self.layout.next_offset().expect("container has no next-row slot") as usize;
        (row.add(offset) as *const RowPtr).read_unaligned()
    }

    /// Chains `next` behind `row` on the duplicate-key list.
    ///
    /// # Safety
    ///
    /// Both pointers must be live rows of this container, which must have
    /// a next-row slot.
    pub unsafe fn set_next_row(&mut self, row: RowPtr, next: RowPtr) {
        let offset = self.layout.next_offset().expect("container has no next-row slot") as usize;
        (row.add(offset) as *mut RowPtr).write_unaligned(next);
    }

    /// Average bytes held per live row, counting row slots and retained
    /// string bytes net of free space. Unknown when the container is
    /// empty.
    pub fn estimate_row_size(&self) -> Option<usize> {
        if self.num_rows == 0 {
            return None;
        }
        let free_bytes =
            self.rows.free_bytes() + self.layout.fixed_row_size() * self.num_free_rows;
        let used = (self.rows.allocated_bytes() + self.strings.retained_bytes())
            .saturating_sub(free_bytes + self.strings.free_space());
        Some(used / self.num_rows)
    }

    /// Bytes of new memory needed to add `num_rows` rows carrying
    /// `variable_bytes` of variable-width data, net of recyclable space
    /// and rounded up to the huge-page unit.
    pub fn size_increment(&self, num_rows: usize, variable_bytes: usize) -> usize {
        let need_rows = num_rows.saturating_sub(self.num_free_rows);
        let need_bytes = variable_bytes.saturating_sub(self.strings.free_space());
        round_up(need_rows * self.layout.fixed_row_size(), HUGE_PAGE_SIZE)
            + round_up(need_bytes, HUGE_PAGE_SIZE)
    }

    /// Freezes the container and returns the partition map sized to the
    /// current row count. One-way; callable once.
    pub fn create_row_partitions(&mut self) -> Result<RowPartitions> {
        ensure!(
            !self.frozen,
            "row partitions can only be created once per container"
        );
        self.frozen = true;
        Ok(RowPartitions::with_capacity(self.num_rows))
    }

    /// Stops allocating the normalized-key prefix for future rows. Called
    /// by the owner once key cardinality no longer fits 64 bits.
    pub fn disable_normalized_keys(&mut self) {
        self.normalized_key_size = 0;
    }

    /// Statistics for one value column, or `None` once invalidated.
    pub fn column_stats(&self, column: usize) -> Option<&ColumnStats> {
        self.stats.as_ref().map(|s| &s[column])
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_free_rows(&self) -> usize {
        self.num_free_rows
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    pub fn column_count(&self) -> usize {
        self.types.len()
    }

    pub fn column_type(&self, column: usize) -> &ColumnType {
        &self.types[column]
    }

    pub fn accumulators(&self) -> &[Accumulator] {
        &self.accumulators
    }

    /// Byte offset of accumulator `index`'s payload within each row.
    pub fn accumulator_offset(&self, index: usize) -> usize {
        self.layout.accumulator_slot(index).offset as usize
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_join_build(&self) -> bool {
        self.is_join_build
    }

    pub fn string_arena(&self) -> &StringArena {
        &self.strings
    }

    pub fn nullable_keys(&self) -> bool {
        self.nullable_keys
    }

    pub(crate) fn strings_mut(&mut self) -> &mut StringArena {
        &mut self.strings
    }

    pub(crate) fn rows_arena(&self) -> &RowArena {
        &self.rows
    }

    /// Rows allocated with the normalized-key prefix (a leading segment
    /// of the insertion order).
    pub fn num_rows_with_normalized_key(&self) -> usize {
        self.num_rows_with_normalized_key
    }

    /// Variable-width bytes charged to a row, when tracked.
    ///
    /// # Safety
    ///
    /// `row` must be a live row of this container.
    pub unsafe fn stored_row_size(&self, row: RowPtr) -> Option<u32> {
        self.layout
            .row_size_offset()
            .map(|offset| (row.add(offset as usize) as *const u32).read_unaligned())
    }

    // ---- crate-internal helpers shared by the sibling modules ----

    pub(crate) fn probed_flag(&self) -> Result<u32> {
        self.layout
            .probed_flag_offset()
            .ok_or_else(|| eyre::eyre!("container has no probed flag"))
    }

    #[inline]
    pub(crate) unsafe fn is_null_at(&self, row: RowPtr, column: RowColumn) -> bool {
        column.is_nullable() && is_bit_set(row, column.null_offset())
    }

    pub(crate) fn fixed_size_at(&self, column: usize) -> usize {
        self.types[column].kind().fixed_width()
    }

    /// Logical size of a variable-width cell; zero when null.
    pub(crate) unsafe fn variable_size_at(&self, row: RowPtr, column: usize) -> usize {
        let col = self.layout.column(column);
        if self.is_null_at(row, col) {
            return 0;
        }
        let kind = self.types[column].kind();
        if kind.is_string() {
            let desc = (row.add(col.offset()) as *const StringDesc).read_unaligned();
            desc.len()
        } else {
            let desc = (row.add(col.offset()) as *const DataDesc).read_unaligned();
            desc.len()
        }
    }

    pub(crate) unsafe fn free_variable_width_fields(&mut self, rows: &[RowPtr]) {
        for column in 0..self.types.len() {
            let kind = self.types[column].kind();
            if !kind.is_variable_width() {
                continue;
            }
            let col = self.layout.column(column);
            for &row in rows {
                if self.is_null_at(row, col) {
                    continue;
                }
                if kind.is_string() {
                    let desc = (row.add(col.offset()) as *const StringDesc).read_unaligned();
                    if !desc.is_inline() {
                        self.strings.free(desc.data_ptr());
                    }
                } else {
                    let desc = (row.add(col.offset()) as *const DataDesc).read_unaligned();
                    if !desc.is_empty() {
                        self.strings.free(desc.ptr());
                    }
                }
            }
        }
    }

    pub(crate) fn destroy_accumulators(&self, rows: &[RowPtr]) {
        for accumulator in &self.accumulators {
            accumulator.destroy(rows);
        }
    }

    /// Frees variable-width fields and accumulator state; decrements the
    /// live row count.
    pub(crate) unsafe fn free_rows_extra_memory(&mut self, rows: &[RowPtr]) {
        self.free_variable_width_fields(rows);
        self.destroy_accumulators(rows);
        self.num_rows -= rows.len();
    }

    /// Reflects one row's removal (or overwrite-to-null) in column stats.
    pub(crate) unsafe fn remove_row_column_stats(&mut self, row: RowPtr, set_to_null: bool) {
        if self.stats.is_none() {
            return;
        }
        for column in 0..self.types.len() {
            let col = self.layout.column(column);
            let kind = self.types[column].kind();
            let was_null = self.is_null_at(row, col);
            let bytes = if was_null {
                0
            } else if kind.is_variable_width() {
                self.variable_size_at(row, column)
            } else {
                kind.fixed_width()
            };
            let stats = self.stats.as_mut().unwrap();
            stats[column].remove_or_update_cell(bytes, was_null, set_to_null);
        }
    }

    /// Records one stored cell in column stats, reading the null bit and
    /// size back from the row.
    pub(crate) unsafe fn update_column_stats(&mut self, row: RowPtr, column: usize) {
        let col = self.layout.column(column);
        let kind = self.types[column].kind();
        let is_null =
            kind == TypeKind::Unknown || self.is_null_at(row, col);
        let variable = kind.is_variable_width();
        let var_size = if !is_null && variable {
            self.variable_size_at(row, column)
        } else {
            0
        };
        let Some(stats) = self.stats.as_mut() else {
            return;
        };
        if is_null {
            stats[column].add_null_cell();
        } else if variable {
            stats[column].add_cell_size(var_size);
        } else {
            stats[column].add_cell_size(kind.fixed_width());
        }
    }

    /// Charges string-arena bytes allocated during a store to the row's
    /// size tracker.
    pub(crate) unsafe fn charge_row_size(&self, row: RowPtr, delta: u64) {
        if let Some(offset) = self.layout.row_size_offset() {
            let slot = row.add(offset as usize) as *mut u32;
            let current = slot.read_unaligned();
            slot.write_unaligned(current.saturating_add(delta.min(u32::MAX as u64) as u32));
        }
    }
}

impl std::fmt::Display for RowContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Keys: ")?;
        for (i, ty) in self.types[..self.key_count].iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty.kind())?;
        }
        if self.types.len() > self.key_count {
            write!(f, " Dependents: ")?;
            for (i, ty) in self.types[self.key_count..].iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", ty.kind())?;
            }
        }
        if !self.accumulators.is_empty() {
            write!(f, " Num accumulators: {}", self.accumulators.len())?;
        }
        write!(f, " Num rows: {}", self.num_rows)
    }
}

impl Drop for RowContainer {
    fn drop(&mut self) {
        self.clear();
    }
}

#[inline]
pub(crate) unsafe fn is_bit_set(row: *const u8, bit: u32) -> bool {
    *row.add((bit / 8) as usize) & (1u8 << (bit % 8)) != 0
}

#[inline]
pub(crate) unsafe fn set_bit(row: *mut u8, bit: u32) {
    *row.add((bit / 8) as usize) |= 1u8 << (bit % 8);
}

#[inline]
pub(crate) unsafe fn clear_bit(row: *mut u8, bit: u32) {
    *row.add((bit / 8) as usize) &= !(1u8 << (bit % 8));
}

#[inline]
unsafe fn next_free(row: RowPtr) -> RowPtr {
    (row as *const RowPtr).read()
}

#[inline]
unsafe fn set_next_free(row: RowPtr, next: RowPtr) {
    (row as *mut RowPtr).write(next);
}
