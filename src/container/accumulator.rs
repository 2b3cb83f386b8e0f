//! # Accumulator Descriptors
//!
//! The container does not know how aggregate functions work; it only
//! reserves aligned space for their state and calls back into them at the
//! two points where it must reach into that state: destruction (erase and
//! clear) and spill extraction. [`AccumulatorOps`] is that two-method
//! interface; [`Accumulator`] carries the layout-relevant metadata.

use std::sync::Arc;

use crate::container::RowPtr;
use crate::types::{Column, ColumnType};

/// The two operations the container performs on aggregate state.
///
/// Implementations capture their accumulator's offset (obtained from the
/// container after construction) and operate on the payload bytes at
/// `row + offset`. Row pointers passed to these methods are live rows of
/// the owning container.
pub trait AccumulatorOps: Send + Sync {
    /// Destroys accumulator state in place for every row. Called before
    /// the rows' memory is released or reused.
    fn destroy(&self, rows: &[RowPtr]);

    /// Extracts accumulator state into a decoded column for spilling.
    fn extract_for_spill(&self, rows: &[RowPtr], out: &mut Column<'_>);
}

/// Opaque per-aggregate metadata: everything the layout planner and the
/// row store need to know about one accumulator.
#[derive(Clone)]
pub struct Accumulator {
    is_fixed_size: bool,
    fixed_size: usize,
    uses_external_memory: bool,
    alignment: usize,
    spill_type: ColumnType,
    ops: Arc<dyn AccumulatorOps>,
}

impl Accumulator {
    pub fn new(
        is_fixed_size: bool,
        fixed_size: usize,
        uses_external_memory: bool,
        alignment: usize,
        spill_type: ColumnType,
        ops: Arc<dyn AccumulatorOps>,
    ) -> Self {
        Self {
            is_fixed_size,
            fixed_size,
            uses_external_memory,
            alignment,
            spill_type,
            ops,
        }
    }

    /// True when the accumulator never allocates beyond its fixed slot.
    pub fn is_fixed_size(&self) -> bool {
        self.is_fixed_size
    }

    /// Bytes reserved inside the row for this accumulator.
    pub fn fixed_size(&self) -> usize {
        self.fixed_size
    }

    /// True when the accumulator tracks memory outside the container
    /// (forcing destruction before rows are released).
    pub fn uses_external_memory(&self) -> bool {
        self.uses_external_memory
    }

    /// Required alignment of the accumulator payload. Power of two.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// The column type the accumulator spills as.
    pub fn spill_type(&self) -> &ColumnType {
        &self.spill_type
    }

    pub fn destroy(&self, rows: &[RowPtr]) {
        self.ops.destroy(rows);
    }

    pub fn extract_for_spill(&self, rows: &[RowPtr], out: &mut Column<'_>) {
        self.ops.extract_for_spill(rows, out);
    }
}

impl std::fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accumulator")
            .field("is_fixed_size", &self.is_fixed_size)
            .field("fixed_size", &self.fixed_size)
            .field("uses_external_memory", &self.uses_external_memory)
            .field("alignment", &self.alignment)
            .finish_non_exhaustive()
    }
}
