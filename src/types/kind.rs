//! # Type Kinds
//!
//! The canonical `TypeKind` enum for rowpack, used across layout planning,
//! typed value I/O, hashing and comparison.
//!
//! ## Design Principles
//!
//! 1. **Closed enumeration**: per-column dispatch is a `match` over kinds,
//!    never a per-row virtual call
//! 2. **Storage-efficient**: `#[repr(u8)]` for single-byte discriminant,
//!    reused as the serde tag
//! 3. **Width-authoritative**: `fixed_width()` is the number of bytes the
//!    kind occupies inside a row, including the 16-byte descriptors that
//!    variable-width kinds store in place of their data
//!
//! ## In-Row Widths
//!
//! | Category | Kinds | In-row bytes |
//! |----------|-------|--------------|
//! | **Boolean** | Boolean | 1 |
//! | **Integer** | TinyInt, SmallInt, Integer, BigInt | 1, 2, 4, 8 |
//! | **Float** | Real, Double | 4, 8 |
//! | **Date/Time** | Date, Timestamp | 4, 8 |
//! | **Numeric** | Decimal | 16 |
//! | **String** | Varchar, Varbinary | 16 (StringDesc) |
//! | **Complex** | Row, Array, Map | 16 (DataDesc) |
//! | **Unknown** | Unknown | 1, never written |

use crate::config::STRING_DESC_SIZE;

/// Canonical type-kind enum for all rowpack operations.
///
/// Uses `#[repr(u8)]` so the discriminant doubles as the serde tag.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Boolean = 0,
    TinyInt = 1,
    SmallInt = 2,
    Integer = 3,
    BigInt = 4,
    Real = 5,
    Double = 6,
    Date = 7,
    Timestamp = 8,
    Decimal = 9,

    Varchar = 20,
    Varbinary = 21,

    Row = 30,
    Array = 31,
    Map = 32,

    Unknown = 40,
}

impl TypeKind {
    /// Bytes this kind occupies inside a row. Variable-width kinds store a
    /// 16-byte descriptor in place of their data.
    pub fn fixed_width(self) -> usize {
        match self {
            TypeKind::Boolean | TypeKind::TinyInt | TypeKind::Unknown => 1,
            TypeKind::SmallInt => 2,
            TypeKind::Integer | TypeKind::Real | TypeKind::Date => 4,
            TypeKind::BigInt | TypeKind::Double | TypeKind::Timestamp => 8,
            TypeKind::Decimal => 16,
            TypeKind::Varchar
            | TypeKind::Varbinary
            | TypeKind::Row
            | TypeKind::Array
            | TypeKind::Map => STRING_DESC_SIZE,
        }
    }

    /// True for kinds whose data lives outside the row (behind the
    /// in-row descriptor) when it does not fit inline.
    pub fn is_variable_width(self) -> bool {
        matches!(
            self,
            TypeKind::Varchar
                | TypeKind::Varbinary
                | TypeKind::Row
                | TypeKind::Array
                | TypeKind::Map
        )
    }

    /// True for kinds stored through the container value serde.
    pub fn is_complex(self) -> bool {
        matches!(self, TypeKind::Row | TypeKind::Array | TypeKind::Map)
    }

    /// True for the string kinds stored through a `StringDesc`.
    pub fn is_string(self) -> bool {
        matches!(self, TypeKind::Varchar | TypeKind::Varbinary)
    }

    pub fn from_u8(tag: u8) -> Option<TypeKind> {
        Some(match tag {
            0 => TypeKind::Boolean,
            1 => TypeKind::TinyInt,
            2 => TypeKind::SmallInt,
            3 => TypeKind::Integer,
            4 => TypeKind::BigInt,
            5 => TypeKind::Real,
            6 => TypeKind::Double,
            7 => TypeKind::Date,
            8 => TypeKind::Timestamp,
            9 => TypeKind::Decimal,
            20 => TypeKind::Varchar,
            21 => TypeKind::Varbinary,
            30 => TypeKind::Row,
            31 => TypeKind::Array,
            32 => TypeKind::Map,
            40 => TypeKind::Unknown,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeKind::Boolean => "BOOLEAN",
            TypeKind::TinyInt => "TINYINT",
            TypeKind::SmallInt => "SMALLINT",
            TypeKind::Integer => "INTEGER",
            TypeKind::BigInt => "BIGINT",
            TypeKind::Real => "REAL",
            TypeKind::Double => "DOUBLE",
            TypeKind::Date => "DATE",
            TypeKind::Timestamp => "TIMESTAMP",
            TypeKind::Decimal => "DECIMAL",
            TypeKind::Varchar => "VARCHAR",
            TypeKind::Varbinary => "VARBINARY",
            TypeKind::Row => "ROW",
            TypeKind::Array => "ARRAY",
            TypeKind::Map => "MAP",
            TypeKind::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_widths_match_in_row_layout() {
        assert_eq!(TypeKind::Boolean.fixed_width(), 1);
        assert_eq!(TypeKind::SmallInt.fixed_width(), 2);
        assert_eq!(TypeKind::Integer.fixed_width(), 4);
        assert_eq!(TypeKind::BigInt.fixed_width(), 8);
        assert_eq!(TypeKind::Real.fixed_width(), 4);
        assert_eq!(TypeKind::Double.fixed_width(), 8);
        assert_eq!(TypeKind::Decimal.fixed_width(), 16);
        assert_eq!(TypeKind::Varchar.fixed_width(), STRING_DESC_SIZE);
        assert_eq!(TypeKind::Array.fixed_width(), STRING_DESC_SIZE);
    }

    #[test]
    fn variable_width_classification() {
        assert!(TypeKind::Varchar.is_variable_width());
        assert!(TypeKind::Map.is_variable_width());
        assert!(!TypeKind::BigInt.is_variable_width());
        assert!(!TypeKind::Unknown.is_variable_width());
    }

    #[test]
    fn tags_roundtrip() {
        for kind in [
            TypeKind::Boolean,
            TypeKind::TinyInt,
            TypeKind::SmallInt,
            TypeKind::Integer,
            TypeKind::BigInt,
            TypeKind::Real,
            TypeKind::Double,
            TypeKind::Date,
            TypeKind::Timestamp,
            TypeKind::Decimal,
            TypeKind::Varchar,
            TypeKind::Varbinary,
            TypeKind::Row,
            TypeKind::Array,
            TypeKind::Map,
            TypeKind::Unknown,
        ] {
            assert_eq!(TypeKind::from_u8(kind as u8), Some(kind));
        }
        assert_eq!(TypeKind::from_u8(17), None);
    }
}
