//! # Per-Kind Hashing
//!
//! Column hashing over packed rows, feeding hash tables and spill
//! partitioning. Null cells hash to the canonical [`NULL_HASH`] constant;
//! floats hash NaN-insensitively (every NaN bit pattern and both zero
//! signs collapse to one image); strings hash their logical contents
//! after contiguity resolution; complex kinds hash their serialized
//! image, which the value serde keeps canonical; custom-comparator types
//! dispatch to their own hash over the fixed-width payload.
//!
//! Multi-column hashes are combined with [`hash_mix`], a fixed 128-to-64
//! bit fold, so every caller folds columns identically.

use ahash::RandomState;

use crate::container::{RowContainer, RowPtr};
use crate::types::TypeKind;

/// Canonical hash of a null cell.
pub const NULL_HASH: u64 = 1;

/// Folds a previous hash with the next column's hash. Fixed function so
/// multi-column hashes agree across callers.
#[inline]
pub fn hash_mix(previous: u64, hash: u64) -> u64 {
    const MUL: u64 = 0x9ddf_ea08_eb38_2d69;
    let mut a = (previous ^ hash).wrapping_mul(MUL);
    a ^= a >> 47;
    let mut b = (hash ^ a).wrapping_mul(MUL);
    b ^= b >> 47;
    b.wrapping_mul(MUL)
}

/// Fixed-seed hasher state: deterministic for a given build, which keeps
/// hashes comparable across containers in one process.
#[inline]
fn hash_state() -> RandomState {
    RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
}

#[inline]
pub(crate) fn hash_bytes(bytes: &[u8]) -> u64 {
    hash_state().hash_one(bytes)
}

#[inline]
fn hash_u64(value: u64) -> u64 {
    hash_state().hash_one(value)
}

#[inline]
fn hash_i128(value: i128) -> u64 {
    hash_state().hash_one(value)
}

/// Collapses every NaN bit pattern and negative zero to one canonical
/// image, so equal floats hash and serialize identically.
#[inline]
pub(crate) fn canonical_f64(value: f64) -> f64 {
    if value.is_nan() {
        f64::from_bits(0x7ff8_0000_0000_0000)
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}

#[inline]
pub(crate) fn canonical_f32(value: f32) -> f32 {
    if value.is_nan() {
        f32::from_bits(0x7fc0_0000)
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}

impl RowContainer {
    /// Hashes `column` of every row into `result`. With `mix`, each
    /// row's hash is folded into the value already in `result`;
    /// otherwise it replaces it.
    ///
    /// # Safety
    ///
    /// Every pointer in `rows` must be a live row of this container.
    pub unsafe fn hash(&self, column: usize, rows: &[RowPtr], mix: bool, result: &mut [u64]) {
        debug_assert!(result.len() >= rows.len());
        let kind = self.column_type(column).kind();
        if kind == TypeKind::Unknown {
            for slot in result.iter_mut().take(rows.len()) {
                *slot = if mix { hash_mix(*slot, NULL_HASH) } else { NULL_HASH };
            }
            return;
        }

        let col = self.layout().column(column);
        let nullable = column >= self.key_count() || self.nullable_keys();
        for (i, &row) in rows.iter().enumerate() {
            let hash = if nullable && self.is_null_at(row, col) {
                NULL_HASH
            } else {
                self.hash_value(row, column)
            };
            result[i] = if mix { hash_mix(result[i], hash) } else { hash };
        }
    }

    /// Hashes one non-null cell.
    unsafe fn hash_value(&self, row: RowPtr, column: usize) -> u64 {
        if let Some(custom) = self.column_type(column).custom_comparator() {
            return (custom.hash)(self.fixed_payload(row, column));
        }

        let col = self.layout().column(column);
        let offset = col.offset();
        let at = row.add(offset);
        match self.column_type(column).kind() {
            TypeKind::Boolean => hash_u64(*at as u64),
            TypeKind::TinyInt => hash_u64(*(at as *const i8) as u64),
            TypeKind::SmallInt => hash_u64((at as *const i16).read_unaligned() as u64),
            TypeKind::Integer | TypeKind::Date => {
                hash_u64((at as *const i32).read_unaligned() as u64)
            }
            TypeKind::BigInt | TypeKind::Timestamp => {
                hash_u64((at as *const i64).read_unaligned() as u64)
            }
            TypeKind::Real => {
                hash_u64(canonical_f32((at as *const f32).read_unaligned()).to_bits() as u64)
            }
            TypeKind::Double => {
                hash_u64(canonical_f64((at as *const f64).read_unaligned()).to_bits())
            }
            TypeKind::Decimal => hash_i128((at as *const i128).read_unaligned()),
            TypeKind::Varchar | TypeKind::Varbinary => {
                match self.read_string_bytes(row, offset) {
                    std::borrow::Cow::Borrowed(bytes) => hash_bytes(bytes),
                    std::borrow::Cow::Owned(bytes) => hash_bytes(&bytes),
                }
            }
            TypeKind::Row | TypeKind::Array | TypeKind::Map => {
                // The serde image is canonical (NaNs and zeros collapsed),
                // so hashing the bytes hashes the logical value.
                let desc =
                    (at as *const crate::types::DataDesc).read_unaligned();
                if self.string_arena().is_contiguous(desc.ptr(), desc.len()) {
                    hash_bytes(self.string_arena().contiguous_slice(desc.ptr(), desc.len()))
                } else {
                    let mut scratch = Vec::with_capacity(desc.len());
                    self.string_arena()
                        .read_into(desc.ptr(), desc.len(), &mut scratch);
                    hash_bytes(&scratch)
                }
            }
            TypeKind::Unknown => NULL_HASH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_is_fixed_and_asymmetric() {
        let a = hash_mix(1, 2);
        assert_eq!(a, hash_mix(1, 2));
        assert_ne!(a, hash_mix(2, 1));
        assert_ne!(a, hash_mix(1, 3));
    }

    #[test]
    fn canonical_floats_collapse_nans_and_zeros() {
        let one = f64::from_bits(0x7ff8_0000_0000_0001);
        let two = f64::from_bits(0x7ff8_0000_0000_0002);
        assert_eq!(canonical_f64(one).to_bits(), canonical_f64(two).to_bits());
        assert_eq!(canonical_f64(0.0).to_bits(), canonical_f64(-0.0).to_bits());
        assert_eq!(canonical_f64(1.5), 1.5);

        assert_eq!(
            canonical_f32(f32::from_bits(0x7fc0_0001)).to_bits(),
            canonical_f32(f32::NAN).to_bits()
        );
    }

    #[test]
    fn byte_hashes_are_deterministic() {
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
    }
}
