//! # Three-Way Comparison
//!
//! Per-kind three-way compare between rows, and between a row and a
//! decoded column element, for sort and merge operators. Flags carry the
//! sort direction, null placement and the null-as-value mode; complex
//! kinds require null-as-value (indeterminate null semantics have no
//! three-way answer).
//!
//! Float ordering is total for container purposes: negative and positive
//! zero compare equal, NaNs compare equal to each other and greater than
//! every other value. Strings compare by the byte order of their logical
//! contents, reassembled from fragments when needed.
//!
//! Stability: the container guarantees no tie order; callers that need a
//! stable sort carry their own tiebreaker.

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use crate::container::store::write_fixed;
use crate::container::{RowContainer, RowPtr};
use crate::types::{Column, TypeKind, Value};

/// Comparison flags: direction, null placement, null handling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareFlags {
    pub ascending: bool,
    pub nulls_first: bool,
    /// Nulls are ordered values (container mode). Complex-kind compares
    /// require this.
    pub null_as_value: bool,
}

impl Default for CompareFlags {
    fn default() -> Self {
        Self {
            ascending: true,
            nulls_first: true,
            null_as_value: true,
        }
    }
}

/// Sort direction for one key of a [`RowComparator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub ascending: bool,
    pub nulls_first: bool,
}

impl SortOrder {
    pub const ASC_NULLS_FIRST: SortOrder = SortOrder {
        ascending: true,
        nulls_first: true,
    };
    pub const ASC_NULLS_LAST: SortOrder = SortOrder {
        ascending: true,
        nulls_first: false,
    };
    pub const DESC_NULLS_FIRST: SortOrder = SortOrder {
        ascending: false,
        nulls_first: true,
    };
    pub const DESC_NULLS_LAST: SortOrder = SortOrder {
        ascending: false,
        nulls_first: false,
    };

    fn flags(self) -> CompareFlags {
        CompareFlags {
            ascending: self.ascending,
            nulls_first: self.nulls_first,
            null_as_value: true,
        }
    }
}

impl RowContainer {
    /// Three-way compare of one column between two rows. Returns a
    /// negative, zero or positive value.
    ///
    /// # Safety
    ///
    /// Both pointers must be live rows of this container.
    pub unsafe fn compare_rows(
        &self,
        left: RowPtr,
        right: RowPtr,
        column: usize,
        flags: CompareFlags,
    ) -> Result<i32> {
        let col = self.layout().column(column);
        let kind = self.column_type(column).kind();
        if kind == TypeKind::Unknown {
            return Ok(0);
        }
        let nullable = column >= self.key_count() || self.nullable_keys();
        let left_null = nullable && self.is_null_at(left, col);
        let right_null = nullable && self.is_null_at(right, col);
        if left_null || right_null {
            return Ok(adjust(null_compare(left_null, right_null, flags), flags));
        }

        if let Some(custom) = self.column_type(column).custom_comparator() {
            let ordering = (custom.compare)(
                self.fixed_payload(left, column),
                self.fixed_payload(right, column),
            );
            return Ok(adjust(ordering as i32, flags));
        }

        let result = match kind {
            TypeKind::Varchar | TypeKind::Varbinary => {
                let offset = col.offset();
                let left_bytes = self.read_string_bytes(left, offset);
                let right_bytes = self.read_string_bytes(right, offset);
                ordering_sign(left_bytes.as_ref().cmp(right_bytes.as_ref()))
            }
            TypeKind::Row | TypeKind::Array | TypeKind::Map => {
                ensure!(
                    flags.null_as_value,
                    "compare on complex values requires null-as-value"
                );
                let left_value = self.read_value(left, col.offset(), kind)?;
                let right_value = self.read_value(right, col.offset(), kind)?;
                compare_values(&left_value, &right_value)?
            }
            _ => {
                let left_value = self.read_value(left, col.offset(), kind)?;
                let right_value = self.read_value(right, col.offset(), kind)?;
                compare_values(&left_value, &right_value)?
            }
        };
        Ok(adjust(result, flags))
    }

    /// Three-way compare of a row cell against a decoded column element.
    /// The sign is from the row's perspective (row as the left operand).
    ///
    /// # Safety
    ///
    /// `row` must be a live row of this container.
    pub unsafe fn compare_row_with_column(
        &self,
        row: RowPtr,
        column: usize,
        decoded: &Column<'_>,
        index: usize,
        flags: CompareFlags,
    ) -> Result<i32> {
        let col = self.layout().column(column);
        let kind = self.column_type(column).kind();
        if kind == TypeKind::Unknown {
            return Ok(0);
        }
        let value = decoded.value(index);
        let nullable = column >= self.key_count() || self.nullable_keys();
        let row_null = nullable && self.is_null_at(row, col);
        let value_null = value.is_null();
        if row_null || value_null {
            return Ok(adjust(null_compare(row_null, value_null, flags), flags));
        }

        if let Some(custom) = self.column_type(column).custom_comparator() {
            let mut buffer = [0u8; 16];
            let width = self.fixed_size_at(column);
            write_fixed(buffer.as_mut_ptr(), 0, kind, value)?;
            let ordering =
                (custom.compare)(self.fixed_payload(row, column), &buffer[..width]);
            return Ok(adjust(ordering as i32, flags));
        }

        if kind.is_complex() {
            ensure!(
                flags.null_as_value,
                "compare on complex values requires null-as-value"
            );
        }
        let row_value = self.read_value(row, col.offset(), kind)?;
        Ok(adjust(compare_values(&row_value, value)?, flags))
    }

    /// Equality probe against a decoded column element, with nulls equal
    /// to nulls (group-by semantics).
    ///
    /// # Safety
    ///
    /// `row` must be a live row of this container.
    pub unsafe fn equals(
        &self,
        row: RowPtr,
        column: usize,
        decoded: &Column<'_>,
        index: usize,
    ) -> Result<bool> {
        Ok(self.compare_row_with_column(row, column, decoded, index, CompareFlags::default())? == 0)
    }
}

/// Composes per-column compares over an ordered key list for sort
/// operators.
pub struct RowComparator<'a> {
    container: &'a RowContainer,
    keys: SmallVec<[(usize, SortOrder); 4]>,
}

impl<'a> RowComparator<'a> {
    pub fn new(
        container: &'a RowContainer,
        keys: impl IntoIterator<Item = (usize, SortOrder)>,
    ) -> Self {
        Self {
            container,
            keys: keys.into_iter().collect(),
        }
    }

    /// Three-way compare of two rows over the sort keys.
    ///
    /// # Safety
    ///
    /// Both pointers must be live rows of the comparator's container.
    pub unsafe fn compare(&self, left: RowPtr, right: RowPtr) -> i32 {
        if std::ptr::eq(left, right) {
            return 0;
        }
        for &(column, order) in &self.keys {
            let result = self
                .container
                .compare_rows(left, right, column, order.flags())
                .expect("null-as-value comparison is infallible");
            if result != 0 {
                return result;
            }
        }
        0
    }

    /// `compare` as a strict-less predicate for sorting.
    ///
    /// # Safety
    ///
    /// As for [`RowComparator::compare`].
    pub unsafe fn less(&self, left: RowPtr, right: RowPtr) -> bool {
        self.compare(left, right) < 0
    }

    /// Three-way compare of decoded sort-key columns at `index` against a
    /// row; the sign is from the decoded element's perspective.
    ///
    /// # Safety
    ///
    /// `row` must be a live row of the comparator's container.
    pub unsafe fn compare_decoded(
        &self,
        columns: &[Column<'_>],
        index: usize,
        row: RowPtr,
    ) -> i32 {
        for &(column, order) in &self.keys {
            let result = self
                .container
                .compare_row_with_column(row, column, &columns[column], index, order.flags())
                .expect("null-as-value comparison is infallible");
            if result != 0 {
                return -result;
            }
        }
        0
    }
}

/// Ascending base result for null operands: nulls order per nulls-first.
#[inline]
fn null_compare(left_null: bool, right_null: bool, flags: CompareFlags) -> i32 {
    match (left_null, right_null) {
        (true, true) => 0,
        (true, false) => {
            if flags.nulls_first {
                -1
            } else {
                1
            }
        }
        (false, true) => {
            if flags.nulls_first {
                1
            } else {
                -1
            }
        }
        (false, false) => unreachable!(),
    }
}

#[inline]
fn adjust(result: i32, flags: CompareFlags) -> i32 {
    if flags.ascending {
        result
    } else {
        -result
    }
}

#[inline]
fn ordering_sign(ordering: std::cmp::Ordering) -> i32 {
    ordering as i32
}

/// Float ordering for container purposes: both zeros equal, NaNs equal
/// to each other and greater than every non-NaN value.
#[inline]
pub(crate) fn compare_f64(left: f64, right: f64) -> i32 {
    match (left.is_nan(), right.is_nan()) {
        (true, true) => 0,
        (true, false) => 1,
        (false, true) => -1,
        (false, false) => {
            if left < right {
                -1
            } else if left > right {
                1
            } else {
                0
            }
        }
    }
}

#[inline]
pub(crate) fn compare_f32(left: f32, right: f32) -> i32 {
    compare_f64(left as f64, right as f64)
}

/// Semantic three-way compare of two decoded values of the same kind.
/// Nested nulls compare as values ordered first; nested floats follow the
/// container float ordering; no per-level direction flags apply.
pub(crate) fn compare_values(left: &Value<'_>, right: &Value<'_>) -> Result<i32> {
    Ok(match (left, right) {
        (Value::Null, Value::Null) => 0,
        (Value::Null, _) => -1,
        (_, Value::Null) => 1,
        (Value::Boolean(a), Value::Boolean(b)) => ordering_sign(a.cmp(b)),
        (Value::TinyInt(a), Value::TinyInt(b)) => ordering_sign(a.cmp(b)),
        (Value::SmallInt(a), Value::SmallInt(b)) => ordering_sign(a.cmp(b)),
        (Value::Integer(a), Value::Integer(b)) => ordering_sign(a.cmp(b)),
        (Value::BigInt(a), Value::BigInt(b)) => ordering_sign(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => ordering_sign(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => ordering_sign(a.cmp(b)),
        (Value::Decimal(a), Value::Decimal(b)) => ordering_sign(a.cmp(b)),
        (Value::Real(a), Value::Real(b)) => compare_f32(*a, *b),
        (Value::Double(a), Value::Double(b)) => compare_f64(*a, *b),
        (Value::Varchar(a), Value::Varchar(b)) => ordering_sign(a.as_bytes().cmp(b.as_bytes())),
        (Value::Varbinary(a), Value::Varbinary(b)) => ordering_sign(a.as_ref().cmp(b.as_ref())),
        (Value::Struct(a), Value::Struct(b)) => compare_value_slices(a, b)?,
        (Value::Array(a), Value::Array(b)) => compare_value_slices(a, b)?,
        (Value::Map(a), Value::Map(b)) => {
            for ((left_key, left_value), (right_key, right_value)) in a.iter().zip(b.iter()) {
                let key_order = compare_values(left_key, right_key)?;
                if key_order != 0 {
                    return Ok(key_order);
                }
                let value_order = compare_values(left_value, right_value)?;
                if value_order != 0 {
                    return Ok(value_order);
                }
            }
            ordering_sign(a.len().cmp(&b.len()))
        }
        (left, right) => bail!("cannot compare values of different kinds: {left:?} vs {right:?}"),
    })
}

fn compare_value_slices(left: &[Value<'_>], right: &[Value<'_>]) -> Result<i32> {
    for (l, r) in left.iter().zip(right.iter()) {
        let result = compare_values(l, r)?;
        if result != 0 {
            return Ok(result);
        }
    }
    Ok(ordering_sign(left.len().cmp(&right.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn float_ordering_groups_nans_high_and_zeros_equal() {
        assert_eq!(compare_f64(0.0, -0.0), 0);
        assert_eq!(compare_f64(f64::NAN, f64::NAN), 0);
        assert_eq!(compare_f64(f64::NAN, f64::INFINITY), 1);
        assert_eq!(compare_f64(1.0, f64::NAN), -1);
        assert_eq!(compare_f64(-1.0, 1.0), -1);
    }

    #[test]
    fn value_compare_is_lexicographic_for_containers() {
        let a = Value::Array(vec![Value::Integer(1), Value::Integer(2)]);
        let b = Value::Array(vec![Value::Integer(1), Value::Integer(3)]);
        let shorter = Value::Array(vec![Value::Integer(1)]);
        assert_eq!(compare_values(&a, &b).unwrap(), -1);
        assert_eq!(compare_values(&b, &a).unwrap(), 1);
        assert_eq!(compare_values(&shorter, &a).unwrap(), -1);
        assert_eq!(compare_values(&a, &a.clone()).unwrap(), 0);
    }

    #[test]
    fn nested_nulls_order_first() {
        let with_null = Value::Array(vec![Value::Null]);
        let with_value = Value::Array(vec![Value::Integer(0)]);
        assert_eq!(compare_values(&with_null, &with_value).unwrap(), -1);
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let err = compare_values(
            &Value::Integer(1),
            &Value::Varchar(Cow::Borrowed("1")),
        )
        .unwrap_err();
        assert!(err.to_string().contains("different kinds"));
    }
}
