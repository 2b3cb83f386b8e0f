//! # Memory Subsystem
//!
//! The container exclusively owns two arenas:
//!
//! - [`RowArena`]: a bump allocator over heap slabs handing out aligned
//!   fixed-size row slots at stable addresses, with ordered range
//!   iteration for row enumeration.
//! - [`StringArena`]: a multi-piece arena for variable-width bytes. Values
//!   are stored in header-linked pieces that may be fragmented across
//!   slabs; freed pieces are recycled through size-class free lists.
//!
//! Neither arena returns memory to the OS before `clear`; rows and string
//! bytes keep their addresses until the container erases them.

mod slab;

pub mod row_arena;
pub mod string_arena;

pub use row_arena::{RowArena, SlabRange};
pub use string_arena::{PieceHeader, PieceStream, StringArena};
