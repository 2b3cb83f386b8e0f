//! # Internal Macros
//!
//! This module provides internal macros for reducing boilerplate in rowpack.
//!
//! ## zerocopy_accessors!
//!
//! Generates getter and setter methods for zerocopy struct fields that use
//! little-endian wrapper types (U32, U64).
//!
//! ### Usage
//!
//! ```ignore
//! use zerocopy::little_endian::{U32, U64};
//!
//! #[repr(C)]
//! struct PieceHeader {
//!     len: U32,
//!     next: U64,
//! }
//!
//! impl PieceHeader {
//!     zerocopy_accessors! {
//!         len: u32,
//!         next: u64,
//!     }
//! }
//!
//! // Generates:
//! // pub fn len(&self) -> u32 { self.len.get() }
//! // pub fn set_len(&mut self, val: u32) { self.len = U32::new(val); }
//! // pub fn next(&self) -> u64 { self.next.get() }
//! // pub fn set_next(&mut self, val: u64) { self.next = U64::new(val); }
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::little_endian::U32::new(val);
            }
        }
    };
    (@impl $field:ident, u64) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u64 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u64) {
                self.$field = ::zerocopy::little_endian::U64::new(val);
            }
        }
    };
    ($($field:ident: $ty:tt),+ $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )+
    };
}
