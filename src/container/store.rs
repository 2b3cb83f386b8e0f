//! # Typed Value I/O
//!
//! Per-kind store and extract primitives between decoded columns and
//! packed rows. Dispatch is a `match` over the closed [`TypeKind`]
//! enumeration, resolved once per call, never per-row virtual calls.
//!
//! ## Store Semantics
//!
//! - Fixed-width kinds copy `fixed_width(kind)` bytes at the column
//!   offset, unaligned.
//! - Strings at most [`STRING_INLINE_MAX`](crate::config::STRING_INLINE_MAX)
//!   bytes are inlined into the 16-byte descriptor; longer strings are
//!   copied into the string arena (possibly fragmented) and referenced
//!   out of line.
//! - Complex values (ROW, ARRAY, MAP) are serialized through the value
//!   serde into the string arena; the row stores a `(ptr, len)`
//!   descriptor.
//! - UNKNOWN columns are always null; nothing is ever written.
//!
//! Every store that allocates string-arena bytes charges them to the
//! row's size tracker. Non-nullable key stores reject nulls; nullable
//! stores set the null bit and skip the value write.
//!
//! ## Extract Semantics
//!
//! Extraction is zero-copy where possible: inline strings borrow from the
//! row, out-of-line contiguous strings borrow from the arena, and only
//! fragmented values are reassembled into owned buffers.

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use crate::config::STRING_INLINE_MAX;
use crate::container::serde::serialize_value;
use crate::container::{set_bit, RowContainer, RowPtr};
use crate::types::{Column, DataDesc, StringDesc, TypeKind, Value};

impl RowContainer {
    /// Stores `decoded[index]` into `row` at `column`.
    ///
    /// A store that fails mid-way leaves the cell null (when the column
    /// is nullable) and counted in column stats; the row stays safe to
    /// erase.
    ///
    /// # Safety
    ///
    /// `row` must be a live row of this container.
    pub unsafe fn store(
        &mut self,
        column: usize,
        decoded: &Column<'_>,
        index: usize,
        row: RowPtr,
    ) -> Result<()> {
        let col = self.layout().column(column);
        let kind = self.column_type(column).kind();
        let value = decoded.value(index);
        let is_key = column < self.key_count();

        if kind == TypeKind::Unknown {
            ensure!(
                !is_key || self.nullable_keys(),
                "unknown-typed column {column} cannot be a non-nullable key"
            );
            set_bit(row, col.null_offset());
        } else if value.is_null() {
            ensure!(
                !is_key || self.nullable_keys(),
                "null value for non-nullable key column {column}"
            );
            set_bit(row, col.null_offset());
        } else if let Err(error) = self.store_value(row, col.offset(), column, value) {
            if col.is_nullable() {
                set_bit(row, col.null_offset());
            }
            self.update_column_stats(row, column);
            return Err(error);
        }
        self.update_column_stats(row, column);
        Ok(())
    }

    /// Stores one decoded value per row: `decoded[i]` into `rows[i]`.
    ///
    /// # Safety
    ///
    /// Every pointer in `rows` must be a live row of this container.
    pub unsafe fn store_many(
        &mut self,
        column: usize,
        decoded: &Column<'_>,
        rows: &[RowPtr],
    ) -> Result<()> {
        ensure!(
            decoded.len() >= rows.len(),
            "decoded column has {} values for {} rows",
            decoded.len(),
            rows.len()
        );
        for (index, &row) in rows.iter().enumerate() {
            self.store(column, decoded, index, row)?;
        }
        Ok(())
    }

    /// Extracts `column` from every row into `out`, clearing it first.
    /// Null cells extract as `Value::Null`.
    ///
    /// # Safety
    ///
    /// Every pointer in `rows` must be a live row of this container.
    pub unsafe fn extract_column<'a>(
        &'a self,
        rows: &[RowPtr],
        column: usize,
        out: &mut Column<'a>,
    ) -> Result<()> {
        out.clear();
        let col = self.layout().column(column);
        let kind = self.column_type(column).kind();
        for &row in rows {
            if kind == TypeKind::Unknown || self.is_null_at(row, col) {
                out.push(Value::Null);
            } else {
                out.push(self.read_value(row, col.offset(), kind)?);
            }
        }
        Ok(())
    }

    /// Renders one row's value columns for debugging.
    ///
    /// # Safety
    ///
    /// `row` must be a live row of this container.
    pub unsafe fn row_debug_string(&self, row: RowPtr) -> String {
        use std::fmt::Write;
        let mut out = String::from("{");
        let rows = [row];
        for column in 0..self.column_count() {
            if column > 0 {
                out.push_str(", ");
            }
            let mut extracted = Column::new(self.column_type(column).clone());
            match self.extract_column(&rows, column, &mut extracted) {
                Ok(()) => {
                    let _ = write!(out, "{:?}", extracted.value(0));
                }
                Err(_) => out.push_str("<error>"),
            }
        }
        out.push('}');
        out
    }

    /// Writes a non-null value at `offset`. Variable-width writes may
    /// allocate from the string arena and charge the row size tracker.
    pub(crate) unsafe fn store_value(
        &mut self,
        row: RowPtr,
        offset: usize,
        column: usize,
        value: &Value<'_>,
    ) -> Result<()> {
        let kind = self.column_type(column).kind();
        match kind {
            TypeKind::Varchar | TypeKind::Varbinary => {
                let bytes = match (kind, value) {
                    (TypeKind::Varchar, Value::Varchar(s)) => s.as_bytes(),
                    (TypeKind::Varbinary, Value::Varbinary(b)) => b.as_ref(),
                    _ => bail!("type mismatch: {} column stored from {value:?}", kind),
                };
                self.store_string(row, offset, bytes);
            }
            TypeKind::Row | TypeKind::Array | TypeKind::Map => {
                ensure!(
                    value.kind() == Some(kind),
                    "type mismatch: {} column stored from {value:?}",
                    kind
                );
                let mut buffer: SmallVec<[u8; 64]> = SmallVec::new();
                serialize_value(value, &mut buffer);
                let before = self.string_arena().cumulative_allocated();
                let ptr = self.strings_mut().copy_multipart(&buffer);
                let desc = DataDesc::new(ptr, buffer.len());
                (row.add(offset) as *mut DataDesc).write_unaligned(desc);
                let delta = self.string_arena().cumulative_allocated() - before;
                self.charge_row_size(row, delta);
            }
            TypeKind::Unknown => unreachable!("unknown kind is stored as null"),
            _ => write_fixed(row, offset, kind, value)?,
        }
        Ok(())
    }

    unsafe fn store_string(&mut self, row: RowPtr, offset: usize, bytes: &[u8]) {
        let desc = if bytes.len() <= STRING_INLINE_MAX {
            StringDesc::inline(bytes)
        } else {
            let before = self.string_arena().cumulative_allocated();
            let ptr = self.strings_mut().copy_multipart(bytes);
            let desc = StringDesc::out_of_line(ptr, bytes.len(), &bytes[..4]);
            let delta = self.string_arena().cumulative_allocated() - before;
            self.charge_row_size(row, delta);
            desc
        };
        (row.add(offset) as *mut StringDesc).write_unaligned(desc);
    }

    /// Reads the non-null value at `offset`. String reads borrow from the
    /// row or arena when the bytes are contiguous.
    pub(crate) unsafe fn read_value<'a>(
        &'a self,
        row: RowPtr,
        offset: usize,
        kind: TypeKind,
    ) -> Result<Value<'a>> {
        Ok(match kind {
            TypeKind::Varchar => match self.read_string_bytes(row, offset) {
                std::borrow::Cow::Borrowed(bytes) => {
                    // SAFETY: varchar cells are stored from valid UTF-8.
                    Value::Varchar(std::borrow::Cow::Borrowed(std::str::from_utf8_unchecked(
                        bytes,
                    )))
                }
                std::borrow::Cow::Owned(bytes) => {
                    // SAFETY: as above; fragments reassemble to the stored
                    // byte sequence.
                    Value::Varchar(std::borrow::Cow::Owned(String::from_utf8_unchecked(bytes)))
                }
            },
            TypeKind::Varbinary => Value::Varbinary(self.read_string_bytes(row, offset)),
            TypeKind::Row | TypeKind::Array | TypeKind::Map => {
                let desc = (row.add(offset) as *const DataDesc).read_unaligned();
                let mut scratch = Vec::new();
                let bytes: &[u8] = if self.string_arena().is_contiguous(desc.ptr(), desc.len()) {
                    self.string_arena().contiguous_slice(desc.ptr(), desc.len())
                } else {
                    self.string_arena()
                        .read_into(desc.ptr(), desc.len(), &mut scratch);
                    &scratch
                };
                let mut position = 0;
                let value = crate::container::serde::deserialize_value(bytes, &mut position)?;
                ensure!(
                    value.kind() == Some(kind) || value.is_null(),
                    "serialized value kind does not match column kind {kind}"
                );
                value.into_static()
            }
            TypeKind::Unknown => Value::Null,
            _ => read_fixed(row, offset, kind),
        })
    }

    /// String cell bytes: borrowed when inline or contiguous, owned when
    /// reassembled from fragments.
    pub(crate) unsafe fn read_string_bytes<'a>(
        &'a self,
        row: RowPtr,
        offset: usize,
    ) -> std::borrow::Cow<'a, [u8]> {
        let desc = (row.add(offset) as *const StringDesc).read_unaligned();
        if desc.is_inline() {
            // Inline bytes sit right after the length field in the row.
            let data = row.add(offset + size_of::<u32>());
            return std::borrow::Cow::Borrowed(std::slice::from_raw_parts(data, desc.len()));
        }
        if self.string_arena().is_contiguous(desc.data_ptr(), desc.len()) {
            return std::borrow::Cow::Borrowed(
                self.string_arena()
                    .contiguous_slice(desc.data_ptr(), desc.len()),
            );
        }
        let mut bytes = Vec::with_capacity(desc.len());
        self.string_arena()
            .read_into(desc.data_ptr(), desc.len(), &mut bytes);
        std::borrow::Cow::Owned(bytes)
    }

    /// The fixed-width payload bytes of a cell, for custom comparators.
    pub(crate) unsafe fn fixed_payload<'a>(&'a self, row: RowPtr, column: usize) -> &'a [u8] {
        let col = self.layout().column(column);
        let width = self.fixed_size_at(column);
        std::slice::from_raw_parts(row.add(col.offset()), width)
    }
}

/// Copies a fixed-width value into the row, unaligned.
pub(crate) unsafe fn write_fixed(
    row: RowPtr,
    offset: usize,
    kind: TypeKind,
    value: &Value<'_>,
) -> Result<()> {
    let at = row.add(offset);
    match (kind, value) {
        (TypeKind::Boolean, Value::Boolean(v)) => *at = *v as u8,
        (TypeKind::TinyInt, Value::TinyInt(v)) => *(at as *mut i8) = *v,
        (TypeKind::SmallInt, Value::SmallInt(v)) => (at as *mut i16).write_unaligned(*v),
        (TypeKind::Integer, Value::Integer(v)) => (at as *mut i32).write_unaligned(*v),
        (TypeKind::BigInt, Value::BigInt(v)) => (at as *mut i64).write_unaligned(*v),
        (TypeKind::Real, Value::Real(v)) => (at as *mut f32).write_unaligned(*v),
        (TypeKind::Double, Value::Double(v)) => (at as *mut f64).write_unaligned(*v),
        (TypeKind::Date, Value::Date(v)) => (at as *mut i32).write_unaligned(*v),
        (TypeKind::Timestamp, Value::Timestamp(v)) => (at as *mut i64).write_unaligned(*v),
        (TypeKind::Decimal, Value::Decimal(v)) => (at as *mut i128).write_unaligned(*v),
        _ => bail!("type mismatch: {} column stored from {value:?}", kind),
    }
    Ok(())
}

/// Reads a fixed-width value out of the row, unaligned.
pub(crate) unsafe fn read_fixed(row: RowPtr, offset: usize, kind: TypeKind) -> Value<'static> {
    let at = row.add(offset);
    match kind {
        TypeKind::Boolean => Value::Boolean(*at != 0),
        TypeKind::TinyInt => Value::TinyInt(*(at as *const i8)),
        TypeKind::SmallInt => Value::SmallInt((at as *const i16).read_unaligned()),
        TypeKind::Integer => Value::Integer((at as *const i32).read_unaligned()),
        TypeKind::BigInt => Value::BigInt((at as *const i64).read_unaligned()),
        TypeKind::Real => Value::Real((at as *const f32).read_unaligned()),
        TypeKind::Double => Value::Double((at as *const f64).read_unaligned()),
        TypeKind::Date => Value::Date((at as *const i32).read_unaligned()),
        TypeKind::Timestamp => Value::Timestamp((at as *const i64).read_unaligned()),
        TypeKind::Decimal => Value::Decimal((at as *const i128).read_unaligned()),
        _ => unreachable!("not a fixed-width kind: {kind}"),
    }
}
