//! Compiler back end for a toy C-like language.
//!
//! Provides a C-subset lexer, a stack-machine virtual machine with its
//! assembler, and a binary program container.

pub mod lexer;
pub mod types;
pub mod utils;
pub mod virtual_machine;
