//! Purpose: MHT web-archive extraction core used by the `unmht` CLI, C plugin shells, and tests.
//! Exports: `core` (codecs, property tree, document model, builder, errors), `bridge`, `extract`, `abi`.
//! Role: Library backing the binary and the C ABI; callers normally go through `extract`.
//! Invariants: One extraction owns one script context; nothing is shared between calls.
//! Invariants: Every extraction returns either a complete document or an error, never partial state.
pub mod abi;
pub mod bridge;
pub mod core;
pub mod extract;

pub use crate::core::document::{Document, Part, release_document};
pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use crate::extract::{ReferenceMode, extract};
