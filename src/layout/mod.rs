//! # Row Layout Planner
//!
//! Pure computation of a container's tuple layout from its schema and
//! accumulator set. Given key kinds, accumulator descriptors, dependent
//! kinds and the container flags, the planner produces the immutable
//! [`RowLayout`]: per-column byte offsets, absolute null-bit offsets, the
//! flag-byte region, the probed and free bits, the optional row-size and
//! next-row slots, the final aligned row size and the normalized-key
//! prefix size.
//!
//! ## Field Walk
//!
//! 1. Key fields, packed in declaration order at their fixed widths.
//! 2. The offset is raised to at least pointer size so the free-list next
//!    pointer can overlay the row start.
//! 3. Flag bits: one null bit per key (only if keys are nullable), then --
//!    after rounding up to a byte boundary so each pair stays within one
//!    byte -- a (null, initialized) bit pair per accumulator, then one
//!    null bit per dependent, then the optional probed bit, then the
//!    mandatory free bit. The bit count rounds up to `flag_bytes`.
//! 4. Accumulator payloads, each rounded up to its declared alignment.
//! 5. Dependent fields at their fixed widths.
//! 6. A `u32` row-size tracker if any column or accumulator is
//!    variable-width or uses external memory.
//! 7. A next-row pointer slot if the container chains duplicate keys.
//! 8. The total rounds up to the row alignment.
//!
//! Null-bit offsets are recorded as absolute bit positions from the row
//! address, so a null test is one byte load plus a mask.

use eyre::{ensure, Result};

use crate::config::NORMALIZED_KEY_WIDTH;
use crate::container::Accumulator;
use crate::types::ColumnType;

/// Sentinel null-bit offset for non-nullable key columns.
pub const NOT_NULL_OFFSET: u32 = u32::MAX;

/// One value column's position: byte offset and absolute null-bit offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowColumn {
    offset: u32,
    null_offset: u32,
}

impl RowColumn {
    pub(crate) fn new(offset: u32, null_offset: u32) -> Self {
        Self {
            offset,
            null_offset,
        }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    /// Absolute bit offset of the null bit, or [`NOT_NULL_OFFSET`].
    #[inline]
    pub fn null_offset(&self) -> u32 {
        self.null_offset
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.null_offset != NOT_NULL_OFFSET
    }

    #[inline]
    pub fn null_byte(&self) -> usize {
        debug_assert!(self.is_nullable());
        (self.null_offset / 8) as usize
    }

    #[inline]
    pub fn null_mask(&self) -> u8 {
        debug_assert!(self.is_nullable());
        1u8 << (self.null_offset % 8)
    }
}

/// One accumulator's position: payload offset plus its null and
/// initialized bits (absolute bit offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorSlot {
    pub offset: u32,
    pub null_bit: u32,
    pub init_bit: u32,
}

/// Immutable layout of one container's rows.
#[derive(Debug, Clone)]
pub struct RowLayout {
    key_count: usize,
    columns: Vec<RowColumn>,
    accumulator_slots: Vec<AccumulatorSlot>,
    flag_base: usize,
    flag_bytes: usize,
    probed_flag_offset: Option<u32>,
    free_flag_offset: u32,
    row_size_offset: Option<u32>,
    next_offset: Option<u32>,
    fixed_row_size: usize,
    alignment: usize,
    original_normalized_key_size: usize,
}

/// Inputs the planner needs; mirrors the container creation parameters.
pub struct LayoutParams<'a> {
    pub key_types: &'a [ColumnType],
    pub nullable_keys: bool,
    pub accumulators: &'a [Accumulator],
    pub dependent_types: &'a [ColumnType],
    pub has_next: bool,
    pub has_probed_flag: bool,
    pub has_normalized_keys: bool,
}

impl RowLayout {
    /// Plans the layout. Fails if any accumulator alignment is not a
    /// power of two.
    pub fn plan(params: &LayoutParams<'_>) -> Result<Self> {
        let mut alignment = align_of::<*const u8>();
        for accumulator in params.accumulators {
            ensure!(
                accumulator.alignment().is_power_of_two(),
                "invalid layout: accumulator alignment {} must be a power of two",
                accumulator.alignment()
            );
            alignment = alignment.max(accumulator.alignment());
        }

        let mut offset = 0usize;
        let mut flag_offset = 0usize;
        let mut is_variable_width = false;

        let mut key_offsets = Vec::with_capacity(params.key_types.len());
        let mut key_null_bits = Vec::with_capacity(params.key_types.len());
        for ty in params.key_types {
            key_offsets.push(offset as u32);
            offset += ty.kind().fixed_width();
            key_null_bits.push(flag_offset);
            is_variable_width |= ty.kind().is_variable_width();
            if params.nullable_keys {
                flag_offset += 1;
            }
        }

        // Raise to pointer size so the free-list next pointer can overlay
        // the row start.
        offset = offset.max(size_of::<*const u8>());
        let flag_base = offset;

        if !params.accumulators.is_empty() {
            // Each accumulator's (null, initialized) pair must land within
            // one byte.
            flag_offset = (flag_offset + 7) & !7;
        }
        let mut accumulator_bits = Vec::with_capacity(params.accumulators.len());
        for accumulator in params.accumulators {
            accumulator_bits.push(flag_offset);
            flag_offset += 2;
            is_variable_width |=
                !accumulator.is_fixed_size() || accumulator.uses_external_memory();
        }

        let mut dependent_null_bits = Vec::with_capacity(params.dependent_types.len());
        for ty in params.dependent_types {
            dependent_null_bits.push(flag_offset);
            flag_offset += 1;
            is_variable_width |= ty.kind().is_variable_width();
        }

        let flag_bit = |relative: usize| (relative + flag_base * 8) as u32;

        let probed_flag_offset = if params.has_probed_flag {
            let bit = flag_bit(flag_offset);
            flag_offset += 1;
            Some(bit)
        } else {
            None
        };
        let free_flag_offset = flag_bit(flag_offset);
        flag_offset += 1;

        let flag_bytes = flag_offset.div_ceil(8);
        offset += flag_bytes;

        let mut accumulator_slots = Vec::with_capacity(params.accumulators.len());
        for (accumulator, bit) in params.accumulators.iter().zip(&accumulator_bits) {
            offset = round_up(offset, accumulator.alignment());
            accumulator_slots.push(AccumulatorSlot {
                offset: offset as u32,
                null_bit: flag_bit(*bit),
                init_bit: flag_bit(*bit + 1),
            });
            offset += accumulator.fixed_size();
        }

        let mut columns = Vec::with_capacity(params.key_types.len() + params.dependent_types.len());
        for (key_offset, bit) in key_offsets.iter().zip(&key_null_bits) {
            let null_offset = if params.nullable_keys {
                flag_bit(*bit)
            } else {
                NOT_NULL_OFFSET
            };
            columns.push(RowColumn::new(*key_offset, null_offset));
        }
        for (ty, bit) in params.dependent_types.iter().zip(&dependent_null_bits) {
            columns.push(RowColumn::new(offset as u32, flag_bit(*bit)));
            offset += ty.kind().fixed_width();
        }

        let row_size_offset = if is_variable_width {
            let at = offset as u32;
            offset += size_of::<u32>();
            Some(at)
        } else {
            None
        };
        let next_offset = if params.has_next {
            let at = offset as u32;
            offset += size_of::<*const u8>();
            Some(at)
        } else {
            None
        };

        let fixed_row_size = round_up(offset, alignment);
        let original_normalized_key_size = if params.has_normalized_keys {
            round_up(NORMALIZED_KEY_WIDTH, alignment)
        } else {
            0
        };

        Ok(Self {
            key_count: params.key_types.len(),
            columns,
            accumulator_slots,
            flag_base,
            flag_bytes,
            probed_flag_offset,
            free_flag_offset,
            row_size_offset,
            next_offset,
            fixed_row_size,
            alignment,
            original_normalized_key_size,
        })
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        self.key_count
    }

    /// Value columns in declaration order: keys then dependents.
    #[inline]
    pub fn column(&self, index: usize) -> RowColumn {
        self.columns[index]
    }

    pub fn columns(&self) -> &[RowColumn] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn accumulator_slot(&self, index: usize) -> AccumulatorSlot {
        self.accumulator_slots[index]
    }

    pub fn accumulator_slots(&self) -> &[AccumulatorSlot] {
        &self.accumulator_slots
    }

    /// Byte offset where the flag region starts.
    #[inline]
    pub fn flag_base(&self) -> usize {
        self.flag_base
    }

    #[inline]
    pub fn flag_bytes(&self) -> usize {
        self.flag_bytes
    }

    #[inline]
    pub fn probed_flag_offset(&self) -> Option<u32> {
        self.probed_flag_offset
    }

    #[inline]
    pub fn free_flag_offset(&self) -> u32 {
        self.free_flag_offset
    }

    #[inline]
    pub fn row_size_offset(&self) -> Option<u32> {
        self.row_size_offset
    }

    #[inline]
    pub fn next_offset(&self) -> Option<u32> {
        self.next_offset
    }

    #[inline]
    pub fn fixed_row_size(&self) -> usize {
        self.fixed_row_size
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    #[inline]
    pub fn original_normalized_key_size(&self) -> usize {
        self.original_normalized_key_size
    }
}

#[inline]
pub(crate) fn round_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}
