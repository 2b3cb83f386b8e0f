//! # Arena Iteration
//!
//! Insertion-order enumeration of rows directly over the slab ranges.
//! [`RowContainerIterator`] is a resumable cursor: the current slab, the
//! position inside it, the logical row number, and the state of the
//! normalized-key segment.
//!
//! Rows allocated while normalized keys were enabled occupy
//! `fixed_row_size + original_normalized_key_size` bytes per slot (the
//! prefix sits below the row address); once the prefix is disabled the
//! stride shrinks to `fixed_row_size`. The iterator tracks how many
//! prefixed slots remain (`normalized_keys_left`) and switches stride at
//! the boundary.
//!
//! Two walkers share the cursor:
//!
//! - [`RowContainer::skip`] advances by an exact slot count without
//!   reading rows. It is the partition-scan workhorse and requires a
//!   container with no erased rows (join build sides).
//! - [`RowContainer::list_rows`] enumerates live rows (skipping
//!   free-listed slots), optionally filtered by probed state for
//!   right-join drains.

use crate::container::{is_bit_set, RowContainer, RowPtr};

/// Probed-state filter for [`RowContainer::list_rows_with_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowListMode {
    All,
    Probed,
    NotProbed,
}

/// Resumable cursor over the row arena.
#[derive(Debug, Clone)]
pub struct RowContainerIterator {
    pub(crate) allocation_index: usize,
    pub(crate) row_begin: *mut u8,
    pub(crate) end_of_run: *mut u8,
    /// Slot index; equals the logical row number when no rows have been
    /// erased.
    pub(crate) row_number: usize,
    pub(crate) normalized_keys_left: usize,
    pub(crate) normalized_key_size: usize,
}

impl RowContainerIterator {
    pub fn new() -> Self {
        Self {
            allocation_index: 0,
            row_begin: std::ptr::null_mut(),
            end_of_run: std::ptr::null_mut(),
            row_number: 0,
            normalized_keys_left: 0,
            normalized_key_size: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn row_number(&self) -> usize {
        self.row_number
    }

    /// The row the cursor is positioned at, or null past the end.
    pub fn current_row(&self) -> RowPtr {
        if self.row_begin.is_null() {
            return std::ptr::null_mut();
        }
        if self.normalized_keys_left > 0 {
            // SAFETY: prefixed slots hold the prefix below the row
            // payload; the sum stays inside the slot.
            unsafe { self.row_begin.add(self.normalized_key_size) }
        } else {
            self.row_begin
        }
    }

    fn started(&self) -> bool {
        !self.end_of_run.is_null()
    }
}

impl Default for RowContainerIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl RowContainer {
    /// Advances the cursor by exactly `num_rows` slots. Positions the
    /// cursor past the end when the target exceeds the row count.
    ///
    /// Requires a container with no erased rows (slot index equals row
    /// number); partition enumeration and join drains satisfy this.
    pub fn skip(&self, iter: &mut RowContainerIterator, num_rows: usize) {
        debug_assert_eq!(self.num_free_rows(), 0, "skip requires no erased rows");
        if iter.row_number + num_rows >= self.num_rows() {
            iter.row_number = self.num_rows();
            iter.row_begin = std::ptr::null_mut();
            return;
        }
        if !iter.started() {
            debug_assert_eq!(iter.row_number, 0);
            self.start(iter);
        }

        let fixed = self.layout().fixed_row_size();
        let mut remaining = num_rows;
        while remaining > 0 {
            let prefix = if iter.normalized_keys_left > 0 {
                iter.normalized_key_size
            } else {
                0
            };
            let stride = fixed + prefix;
            // Segment the skip at the normalized-key boundary so the
            // stride never mixes within one advance.
            let segment = if iter.normalized_keys_left > 0 {
                remaining.min(iter.normalized_keys_left)
            } else {
                remaining
            };
            let mut segment_left = segment;
            while segment_left > 0 {
                let available = (iter.end_of_run as usize - iter.row_begin as usize) / stride;
                if available == 0 {
                    self.hop(iter);
                    continue;
                }
                let take = segment_left.min(available);
                // SAFETY: take * stride bytes are inside the current run.
                iter.row_begin = unsafe { iter.row_begin.add(take * stride) };
                segment_left -= take;
            }
            if iter.normalized_keys_left > 0 {
                iter.normalized_keys_left -= segment;
            }
            remaining -= segment;
        }
        // A segment may end exactly at a run boundary; the next row then
        // starts the next run.
        if iter.row_begin as usize >= iter.end_of_run as usize {
            self.hop(iter);
        }
        iter.row_number += num_rows;
    }

    /// Enumerates up to `max_rows` live rows in insertion order,
    /// appending their addresses to `out`. Returns the count appended;
    /// zero means the iteration is complete.
    pub fn list_rows(
        &self,
        iter: &mut RowContainerIterator,
        max_rows: usize,
        out: &mut Vec<RowPtr>,
    ) -> usize {
        self.list_rows_with_mode(iter, RowListMode::All, max_rows, out)
    }

    /// `list_rows` with a probed-state filter. `Probed` and `NotProbed`
    /// require the container to have a probed flag.
    pub fn list_rows_with_mode(
        &self,
        iter: &mut RowContainerIterator,
        mode: RowListMode,
        max_rows: usize,
        out: &mut Vec<RowPtr>,
    ) -> usize {
        if !iter.started() {
            if self.rows_arena().num_ranges() == 0 {
                return 0;
            }
            self.start(iter);
        }
        let fixed = self.layout().fixed_row_size();
        let free_flag = self.layout().free_flag_offset();
        let mut count = 0;
        while count < max_rows {
            if iter.row_begin as usize >= iter.end_of_run as usize {
                if iter.allocation_index + 1 >= self.rows_arena().num_ranges() {
                    break;
                }
                self.hop(iter);
                continue;
            }
            let prefix = if iter.normalized_keys_left > 0 {
                iter.normalized_key_size
            } else {
                0
            };
            // SAFETY: the slot starts at row_begin and holds prefix bytes
            // then a full row inside the current run.
            let row = unsafe { iter.row_begin.add(prefix) };
            iter.row_begin = unsafe { iter.row_begin.add(fixed + prefix) };
            if iter.normalized_keys_left > 0 {
                iter.normalized_keys_left -= 1;
            }
            // SAFETY: row is a slot of this container.
            if unsafe { is_bit_set(row, free_flag) } {
                continue;
            }
            iter.row_number += 1;
            let keep = match mode {
                RowListMode::All => true,
                RowListMode::Probed | RowListMode::NotProbed => {
                    let probed = self
                        .probed_flag()
                        .expect("probed-state listing requires a probed flag");
                    // SAFETY: as above.
                    let is_probed = unsafe { is_bit_set(row, probed) };
                    (mode == RowListMode::Probed) == is_probed
                }
            };
            if keep {
                out.push(row);
                count += 1;
            }
        }
        count
    }

    fn start(&self, iter: &mut RowContainerIterator) {
        iter.normalized_keys_left = self.num_rows_with_normalized_key();
        iter.normalized_key_size = self.layout().original_normalized_key_size();
        iter.allocation_index = 0;
        let range = self.rows_arena().range_at(0);
        iter.row_begin = range.start;
        // SAFETY: the range covers `len` bytes from `start`.
        iter.end_of_run = unsafe { range.start.add(range.len) };
    }

    fn hop(&self, iter: &mut RowContainerIterator) {
        iter.allocation_index += 1;
        let range = self.rows_arena().range_at(iter.allocation_index);
        iter.row_begin = range.start;
        // SAFETY: as in `start`.
        iter.end_of_run = unsafe { range.start.add(range.len) };
    }
}
