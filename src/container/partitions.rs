//! # Row Partitions and Partitioned Enumeration
//!
//! For spill-to-disk bucketing, a frozen container carries a byte-per-row
//! partition map assigned in row-insertion order. Enumerating one
//! partition's rows is then a SIMD scan over the map: compare a 32-byte
//! group against the partition id, mask off bits before the cursor and
//! past the row count, and for each hit advance the arena iterator by the
//! exact slot delta to emit the row's address.
//!
//! The map is stored in fixed-size runs, each a multiple of the SIMD
//! batch width and zero-initialized, so compare groups never straddle
//! runs and the tail group is safely padded.

use eyre::{ensure, Result};

use crate::config::{PARTITION_RUN_SIZE, SIMD_BATCH};
use crate::container::simd_scan::{eq_mask32, low_mask32};
use crate::container::{RowContainer, RowContainerIterator, RowPtr};

/// Byte-per-row partition assignments, append-only up to the row count
/// the container froze at.
pub struct RowPartitions {
    capacity: usize,
    size: usize,
    runs: Vec<Box<[u8; PARTITION_RUN_SIZE]>>,
}

impl RowPartitions {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let num_runs = capacity.div_ceil(PARTITION_RUN_SIZE);
        let runs = (0..num_runs)
            .map(|_| Box::new([0u8; PARTITION_RUN_SIZE]))
            .collect();
        Self {
            capacity,
            size: 0,
            runs,
        }
    }

    /// Total assignable rows: the container's row count at freeze time.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rows assigned so far.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Appends partition ids for the next `partitions.len()` rows, in
    /// row-insertion order. Fails past capacity.
    pub fn append_partitions(&mut self, partitions: &[u8]) -> Result<()> {
        ensure!(
            self.size + partitions.len() <= self.capacity,
            "partition capacity exceeded: {} + {} > {}",
            self.size,
            partitions.len(),
            self.capacity
        );
        let mut index = 0;
        while index < partitions.len() {
            let (run, offset) = Self::find_run(self.size);
            let copy = (partitions.len() - index).min(PARTITION_RUN_SIZE - offset);
            self.runs[run][offset..offset + copy]
                .copy_from_slice(&partitions[index..index + copy]);
            self.size += copy;
            index += copy;
        }
        Ok(())
    }

    pub fn partition_at(&self, row: usize) -> u8 {
        debug_assert!(row < self.size);
        let (run, offset) = Self::find_run(row);
        self.runs[run][offset]
    }

    pub(crate) fn run(&self, index: usize) -> &[u8] {
        &self.runs[index][..]
    }

    #[inline]
    pub(crate) fn find_run(row: usize) -> (usize, usize) {
        (row / PARTITION_RUN_SIZE, row % PARTITION_RUN_SIZE)
    }
}

impl RowContainer {
    /// Enumerates up to `max_rows` addresses of rows whose partition byte
    /// equals `partition`, in row-insertion order, resumable through
    /// `iter`. Returns the count appended to `out`; zero means the
    /// partition is drained. Stopping at `max_rows` leaves the iterator
    /// at the row immediately after the last emitted one.
    pub fn list_partition_rows(
        &self,
        iter: &mut RowContainerIterator,
        partition: u8,
        max_rows: usize,
        partitions: &RowPartitions,
        out: &mut Vec<RowPtr>,
    ) -> Result<usize> {
        ensure!(
            self.is_frozen(),
            "partition enumeration requires a frozen container"
        );
        ensure!(
            partitions.size() == self.num_rows(),
            "all rows must have a partition: {} assigned, {} rows",
            partitions.size(),
            self.num_rows()
        );
        if self.num_rows() == 0 {
            return Ok(0);
        }

        let mut count = 0;
        while count < max_rows && iter.row_number < self.num_rows() {
            // Start at the batch containing the cursor; mask off bits at
            // or below already-visited rows.
            let mut start_row = iter.row_number / SIMD_BATCH * SIMD_BATCH;
            let mut first_mask = !low_mask32(iter.row_number - start_row);
            let (run_index, mut offset) = RowPartitions::find_run(start_row);
            let run = partitions.run(run_index);
            while offset < run.len() {
                let mut bits = eq_mask32(&run[offset..offset + SIMD_BATCH], partition) & first_mask;
                first_mask = !0;
                let at_end = start_row + SIMD_BATCH >= self.num_rows();
                if at_end {
                    // Clear bits for rows past the end; the tail group is
                    // zero padding.
                    bits &= low_mask32(self.num_rows() - start_row);
                }
                while bits != 0 {
                    let hit = bits.trailing_zeros() as usize;
                    let delta = hit + start_row - iter.row_number;
                    self.skip(iter, delta);
                    out.push(iter.current_row());
                    count += 1;
                    if count == max_rows {
                        self.skip(iter, 1);
                        return Ok(count);
                    }
                    bits &= bits - 1;
                }
                start_row += SIMD_BATCH;
                if at_end {
                    iter.row_number = self.num_rows();
                    return Ok(count);
                }
                if iter.row_number != start_row {
                    self.skip(iter, start_row - iter.row_number);
                }
                offset += SIMD_BATCH;
            }
        }
        Ok(count)
    }
}
