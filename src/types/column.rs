//! # Column Types and Decoded Batches
//!
//! `ColumnType` pairs a [`TypeKind`] with the optional custom-comparator
//! escape hatch: a bounded set of types may carry their own hash and
//! three-way-compare functions over the in-row fixed-width payload.
//!
//! `Column<'a>` is the decoded column batch the container consumes on
//! store and produces on extract. Nulls are represented as `Value::Null`
//! entries, so one vector serves as values-plus-null-mask.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::types::{TypeKind, Value};

/// Hash and three-way compare over a kind's in-row fixed-width payload.
///
/// This is the escape hatch for types whose ordering differs from their
/// storage kind (for example a timezone-aware timestamp packed into an
/// i64). Both functions receive exactly `kind.fixed_width()` bytes.
#[derive(Clone)]
pub struct CustomComparator {
    pub hash: fn(&[u8]) -> u64,
    pub compare: fn(&[u8], &[u8]) -> Ordering,
}

impl std::fmt::Debug for CustomComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomComparator").finish_non_exhaustive()
    }
}

/// A column's type: its kind plus an optional custom comparator.
#[derive(Debug, Clone)]
pub struct ColumnType {
    kind: TypeKind,
    custom: Option<Arc<CustomComparator>>,
}

impl ColumnType {
    pub fn new(kind: TypeKind) -> Self {
        Self { kind, custom: None }
    }

    pub fn with_custom_comparator(kind: TypeKind, custom: CustomComparator) -> Self {
        Self {
            kind,
            custom: Some(Arc::new(custom)),
        }
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn custom_comparator(&self) -> Option<&CustomComparator> {
        self.custom.as_deref()
    }
}

impl From<TypeKind> for ColumnType {
    fn from(kind: TypeKind) -> Self {
        ColumnType::new(kind)
    }
}

/// A decoded column batch: store input and extract output.
#[derive(Debug, Clone)]
pub struct Column<'a> {
    ty: ColumnType,
    values: Vec<Value<'a>>,
}

impl<'a> Column<'a> {
    pub fn new(ty: ColumnType) -> Self {
        Self {
            ty,
            values: Vec::new(),
        }
    }

    pub fn with_values(ty: ColumnType, values: Vec<Value<'a>>) -> Self {
        Self { ty, values }
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.ty.kind()
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn value(&self, index: usize) -> &Value<'a> {
        &self.values[index]
    }

    #[inline]
    pub fn is_null(&self, index: usize) -> bool {
        self.values[index].is_null()
    }

    pub fn values(&self) -> &[Value<'a>] {
        &self.values
    }

    pub fn push(&mut self, value: Value<'a>) {
        self.values.push(value);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn may_have_nulls(&self) -> bool {
        self.values.iter().any(Value::is_null)
    }
}
