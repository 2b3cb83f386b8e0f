//! # Decoded Value Representation
//!
//! This module provides `Value<'a>`, the decoded scalar representation the
//! container stores from and extracts into. Values use `Cow` for string
//! types to enable zero-copy extraction when the stored bytes are
//! contiguous in the container arena, while supporting owned data when a
//! fragmented string has to be reassembled.
//!
//! ## Value Variants
//!
//! | Variant | Rust Type | Kind |
//! |---------|-----------|------|
//! | Null | - | any |
//! | Boolean | bool | BOOLEAN |
//! | TinyInt | i8 | TINYINT |
//! | SmallInt | i16 | SMALLINT |
//! | Integer | i32 | INTEGER |
//! | BigInt | i64 | BIGINT |
//! | Real | f32 | REAL |
//! | Double | f64 | DOUBLE |
//! | Date | i32 (days) | DATE |
//! | Timestamp | i64 (micros) | TIMESTAMP |
//! | Decimal | i128 (unscaled) | DECIMAL |
//! | Varchar | Cow<str> | VARCHAR |
//! | Varbinary | Cow<[u8]> | VARBINARY |
//! | Struct | Vec<Value> | ROW |
//! | Array | Vec<Value> | ARRAY |
//! | Map | Vec<(Value, Value)> | MAP |

use std::borrow::Cow;

use crate::types::TypeKind;

/// Decoded scalar value. The lifetime covers borrowed string bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Date(i32),
    Timestamp(i64),
    Decimal(i128),
    Varchar(Cow<'a, str>),
    Varbinary(Cow<'a, [u8]>),
    Struct(Vec<Value<'a>>),
    Array(Vec<Value<'a>>),
    Map(Vec<(Value<'a>, Value<'a>)>),
}

impl<'a> Value<'a> {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The kind this value stores as, or `None` for NULL.
    pub fn kind(&self) -> Option<TypeKind> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(_) => TypeKind::Boolean,
            Value::TinyInt(_) => TypeKind::TinyInt,
            Value::SmallInt(_) => TypeKind::SmallInt,
            Value::Integer(_) => TypeKind::Integer,
            Value::BigInt(_) => TypeKind::BigInt,
            Value::Real(_) => TypeKind::Real,
            Value::Double(_) => TypeKind::Double,
            Value::Date(_) => TypeKind::Date,
            Value::Timestamp(_) => TypeKind::Timestamp,
            Value::Decimal(_) => TypeKind::Decimal,
            Value::Varchar(_) => TypeKind::Varchar,
            Value::Varbinary(_) => TypeKind::Varbinary,
            Value::Struct(_) => TypeKind::Row,
            Value::Array(_) => TypeKind::Array,
            Value::Map(_) => TypeKind::Map,
        })
    }

    /// Converts to a `'static` value, copying any borrowed bytes.
    pub fn into_static(self) -> Value<'static> {
        match self {
            Value::Null => Value::Null,
            Value::Boolean(v) => Value::Boolean(v),
            Value::TinyInt(v) => Value::TinyInt(v),
            Value::SmallInt(v) => Value::SmallInt(v),
            Value::Integer(v) => Value::Integer(v),
            Value::BigInt(v) => Value::BigInt(v),
            Value::Real(v) => Value::Real(v),
            Value::Double(v) => Value::Double(v),
            Value::Date(v) => Value::Date(v),
            Value::Timestamp(v) => Value::Timestamp(v),
            Value::Decimal(v) => Value::Decimal(v),
            Value::Varchar(v) => Value::Varchar(Cow::Owned(v.into_owned())),
            Value::Varbinary(v) => Value::Varbinary(Cow::Owned(v.into_owned())),
            Value::Struct(v) => Value::Struct(v.into_iter().map(Value::into_static).collect()),
            Value::Array(v) => Value::Array(v.into_iter().map(Value::into_static).collect()),
            Value::Map(v) => Value::Map(
                v.into_iter()
                    .map(|(k, val)| (k.into_static(), val.into_static()))
                    .collect(),
            ),
        }
    }

    /// The logical byte length of a string value, zero otherwise.
    pub fn string_len(&self) -> usize {
        match self {
            Value::Varchar(s) => s.len(),
            Value::Varbinary(b) => b.len(),
            _ => 0,
        }
    }
}
