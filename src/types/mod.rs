//! Shared type infrastructure.
//!
//! Currently holds the binary encoding traits used by the program
//! container format.

pub mod encoding;
