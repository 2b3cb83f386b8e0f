//! # Value Serde and the Spill Row Format
//!
//! Two engine-private serialized forms live here:
//!
//! 1. **Value serde**: the self-describing encoding of complex values
//!    (ROW, ARRAY, MAP) stored behind a row's data descriptor, and walked
//!    by hashing and comparison. One tag byte (0 = null, otherwise the
//!    type kind), then a fixed little-endian payload for scalars,
//!    `[u32 len][bytes]` for strings, `[u32 len][elements]` for
//!    containers. Float payloads canonicalize NaN bit patterns and
//!    negative zero so equal values always share one byte image.
//!
//! 2. **Spill row format**: the self-describing serialization of whole
//!    rows for spill extract/re-ingest:
//!
//!    ```text
//!    Row := [flag bytes, verbatim] [column]*
//!    column := fixed(kind) bytes            -- fixed-width kinds
//!            | [u32 size][size bytes]       -- variable-width kinds
//!    ```
//!
//!    Sizes are native little-endian. Null bits and the probed bit
//!    survive the round trip byte-identically; the free bit is
//!    overwritten to clear on ingest and the row-size tracker is
//!    recomputed. This is not a cross-engine interchange format.

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use crate::container::hash::{canonical_f32, canonical_f64};
use crate::container::{clear_bit, RowContainer, RowPtr};
use crate::types::{DataDesc, StringDesc, TypeKind, Value};

pub(crate) type SerdeBuf = SmallVec<[u8; 64]>;

const NULL_TAG: u8 = 0;

/// Serializes one value, self-describing and deterministic: equal values
/// produce identical bytes.
pub(crate) fn serialize_value(value: &Value<'_>, out: &mut SerdeBuf) {
    let Some(kind) = value.kind() else {
        out.push(NULL_TAG);
        return;
    };
    out.push(kind as u8 + 1);
    match value {
        Value::Null => unreachable!(),
        Value::Boolean(v) => out.push(*v as u8),
        Value::TinyInt(v) => out.push(*v as u8),
        Value::SmallInt(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Integer(v) | Value::Date(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::BigInt(v) | Value::Timestamp(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Real(v) => out.extend_from_slice(&canonical_f32(*v).to_le_bytes()),
        Value::Double(v) => out.extend_from_slice(&canonical_f64(*v).to_le_bytes()),
        Value::Decimal(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Varchar(s) => {
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Value::Varbinary(b) => {
            out.extend_from_slice(&(b.len() as u32).to_le_bytes());
            out.extend_from_slice(b);
        }
        Value::Struct(fields) => {
            out.extend_from_slice(&(fields.len() as u32).to_le_bytes());
            for field in fields {
                serialize_value(field, out);
            }
        }
        Value::Array(items) => {
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                serialize_value(item, out);
            }
        }
        Value::Map(entries) => {
            out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
            for (key, val) in entries {
                serialize_value(key, out);
                serialize_value(val, out);
            }
        }
    }
}

/// Decodes one value starting at `*position`, advancing it.
pub(crate) fn deserialize_value(data: &[u8], position: &mut usize) -> Result<Value<'static>> {
    let tag = read_u8(data, position)?;
    if tag == NULL_TAG {
        return Ok(Value::Null);
    }
    let Some(kind) = TypeKind::from_u8(tag - 1) else {
        bail!("invalid serialized value tag {tag}");
    };
    Ok(match kind {
        TypeKind::Boolean => Value::Boolean(read_u8(data, position)? != 0),
        TypeKind::TinyInt => Value::TinyInt(read_u8(data, position)? as i8),
        TypeKind::SmallInt => Value::SmallInt(i16::from_le_bytes(read_array(data, position)?)),
        TypeKind::Integer => Value::Integer(i32::from_le_bytes(read_array(data, position)?)),
        TypeKind::Date => Value::Date(i32::from_le_bytes(read_array(data, position)?)),
        TypeKind::BigInt => Value::BigInt(i64::from_le_bytes(read_array(data, position)?)),
        TypeKind::Timestamp => Value::Timestamp(i64::from_le_bytes(read_array(data, position)?)),
        TypeKind::Real => Value::Real(f32::from_le_bytes(read_array(data, position)?)),
        TypeKind::Double => Value::Double(f64::from_le_bytes(read_array(data, position)?)),
        TypeKind::Decimal => Value::Decimal(i128::from_le_bytes(read_array(data, position)?)),
        TypeKind::Varchar => {
            let len = read_u32(data, position)? as usize;
            let bytes = read_bytes(data, position, len)?;
            Value::Varchar(std::borrow::Cow::Owned(
                std::str::from_utf8(bytes)
                    .map_err(|_| eyre::eyre!("serialized varchar is not valid utf-8"))?
                    .to_owned(),
            ))
        }
        TypeKind::Varbinary => {
            let len = read_u32(data, position)? as usize;
            Value::Varbinary(std::borrow::Cow::Owned(
                read_bytes(data, position, len)?.to_vec(),
            ))
        }
        TypeKind::Row => {
            let len = read_u32(data, position)? as usize;
            let mut fields = Vec::with_capacity(len);
            for _ in 0..len {
                fields.push(deserialize_value(data, position)?);
            }
            Value::Struct(fields)
        }
        TypeKind::Array => {
            let len = read_u32(data, position)? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(deserialize_value(data, position)?);
            }
            Value::Array(items)
        }
        TypeKind::Map => {
            let len = read_u32(data, position)? as usize;
            let mut entries = Vec::with_capacity(len);
            for _ in 0..len {
                let key = deserialize_value(data, position)?;
                let val = deserialize_value(data, position)?;
                entries.push((key, val));
            }
            Value::Map(entries)
        }
        TypeKind::Unknown => Value::Null,
    })
}

impl RowContainer {
    /// Serializes each row into its own self-describing byte buffer,
    /// appended to `out`.
    ///
    /// # Safety
    ///
    /// Every pointer in `rows` must be a live row of this container.
    pub unsafe fn extract_serialized_rows(&self, rows: &[RowPtr], out: &mut Vec<Vec<u8>>) {
        let flag_base = self.layout().flag_base();
        let flag_bytes = self.layout().flag_bytes();
        for &row in rows {
            let mut buffer = Vec::with_capacity(flag_bytes + self.layout().fixed_row_size());
            buffer.extend_from_slice(std::slice::from_raw_parts(row.add(flag_base), flag_bytes));
            for column in 0..self.column_count() {
                let kind = self.column_type(column).kind();
                let col = self.layout().column(column);
                if kind.is_variable_width() {
                    self.extract_variable_size_at(row, column, &mut buffer);
                } else {
                    let width = kind.fixed_width();
                    buffer.extend_from_slice(std::slice::from_raw_parts(
                        row.add(col.offset()),
                        width,
                    ));
                }
            }
            out.push(buffer);
        }
    }

    /// Re-ingests a serialized row into a freshly allocated `row`: the
    /// exact inverse of [`RowContainer::extract_serialized_rows`]. Null
    /// and probed bits are preserved; the free bit is cleared; the
    /// row-size tracker is recomputed; column stats are updated.
    ///
    /// # Safety
    ///
    /// `row` must be a live row of this container, freshly initialized.
    pub unsafe fn store_serialized_row(&mut self, data: &[u8], row: RowPtr) -> Result<()> {
        let flag_base = self.layout().flag_base();
        let flag_bytes = self.layout().flag_bytes();
        ensure!(
            data.len() >= flag_bytes,
            "serialized row shorter than its flag block"
        );
        std::ptr::copy_nonoverlapping(data.as_ptr(), row.add(flag_base), flag_bytes);
        clear_bit(row, self.layout().free_flag_offset());
        if let Some(offset) = self.layout().row_size_offset() {
            (row.add(offset as usize) as *mut u32).write_unaligned(0);
        }

        let before = self.string_arena().cumulative_allocated();
        let mut position = flag_bytes;
        for column in 0..self.column_count() {
            let kind = self.column_type(column).kind();
            let col = self.layout().column(column);
            if kind.is_variable_width() {
                let size = read_u32(data, &mut position)? as usize;
                let bytes = read_bytes(data, &mut position, size)?;
                self.store_variable_size_at(row, column, bytes);
            } else {
                let width = kind.fixed_width();
                let bytes = read_bytes(data, &mut position, width)?;
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), row.add(col.offset()), width);
            }
            self.update_column_stats(row, column);
        }
        let delta = self.string_arena().cumulative_allocated() - before;
        self.charge_row_size(row, delta);
        Ok(())
    }

    /// Appends `[u32 size][logical bytes]` for a variable-width cell;
    /// null cells append a zero size.
    unsafe fn extract_variable_size_at(&self, row: RowPtr, column: usize, out: &mut Vec<u8>) {
        let col = self.layout().column(column);
        if self.is_null_at(row, col) {
            out.extend_from_slice(&0u32.to_le_bytes());
            return;
        }
        let kind = self.column_type(column).kind();
        if kind.is_string() {
            let bytes = self.read_string_bytes(row, col.offset());
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(&bytes);
        } else {
            let desc = (row.add(col.offset()) as *const DataDesc).read_unaligned();
            out.extend_from_slice(&(desc.len() as u32).to_le_bytes());
            if self.string_arena().is_contiguous(desc.ptr(), desc.len()) {
                out.extend_from_slice(self.string_arena().contiguous_slice(desc.ptr(), desc.len()));
            } else {
                let mut scratch = Vec::with_capacity(desc.len());
                self.string_arena()
                    .read_into(desc.ptr(), desc.len(), &mut scratch);
                out.extend_from_slice(&scratch);
            }
        }
    }

    /// Stores a variable-width cell from its serialized bytes. An empty
    /// payload stores an empty descriptor (the null bit, already copied
    /// from the flag block, distinguishes null from empty).
    unsafe fn store_variable_size_at(&mut self, row: RowPtr, column: usize, bytes: &[u8]) {
        let col = self.layout().column(column);
        let kind = self.column_type(column).kind();
        if kind.is_string() {
            self.store_string_raw(row, col.offset(), bytes);
        } else if bytes.is_empty() {
            (row.add(col.offset()) as *mut DataDesc).write_unaligned(DataDesc::empty());
        } else {
            let ptr = self.strings_mut().copy_multipart(bytes);
            let desc = DataDesc::new(ptr, bytes.len());
            (row.add(col.offset()) as *mut DataDesc).write_unaligned(desc);
        }
    }

    unsafe fn store_string_raw(&mut self, row: RowPtr, offset: usize, bytes: &[u8]) {
        let desc = if bytes.len() <= crate::config::STRING_INLINE_MAX {
            StringDesc::inline(bytes)
        } else {
            let ptr = self.strings_mut().copy_multipart(bytes);
            StringDesc::out_of_line(ptr, bytes.len(), &bytes[..4])
        };
        (row.add(offset) as *mut StringDesc).write_unaligned(desc);
    }
}

fn read_u8(data: &[u8], position: &mut usize) -> Result<u8> {
    ensure!(*position < data.len(), "serialized value truncated");
    let v = data[*position];
    *position += 1;
    Ok(v)
}

fn read_u32(data: &[u8], position: &mut usize) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array(data, position)?))
}

fn read_array<const N: usize>(data: &[u8], position: &mut usize) -> Result<[u8; N]> {
    let bytes = read_bytes(data, position, N)?;
    Ok(bytes.try_into().unwrap())
}

fn read_bytes<'a>(data: &'a [u8], position: &mut usize, len: usize) -> Result<&'a [u8]> {
    ensure!(
        *position + len <= data.len(),
        "serialized value truncated: need {} bytes at {}",
        len,
        position
    );
    let bytes = &data[*position..*position + len];
    *position += len;
    Ok(bytes)
}
