//! Stack-based bytecode virtual machine for a toy C-like compiler.
//!
//! The VM executes word-oriented bytecode in the c4 tradition: an
//! accumulator register, a downward-growing operand stack, and a flat
//! byte-addressable data segment, all sized by a single pool parameter.
//!
//! # Architecture
//!
//! - **Accumulator**: `ax` holds the result of the last value-producing
//!   instruction; binary operators combine a popped stack word with it
//! - **Stack**: `poolsize` words, growing from high indices toward zero;
//!   `sp` is the top of stack, `bp` the current frame base
//! - **Data segment**: `poolsize` bytes, shared by string/global data,
//!   syscall buffers, and the bump-allocated heap half
//! - **Instruction format**: one word per opcode, with an optional inline
//!   operand word for the eight operand-carrying instructions
//! - **Execution model**: fetch/decode/execute loop with support for
//!   calls/frames, comparisons, bitwise and arithmetic ops, and a small
//!   syscall surface (open/read/close/printf/malloc/memset/memcmp/exit)
//!
//! # Modules
//!
//! - [`assembler`]: Assembly parsing, diagnostics, and word emission
//! - [`errors`]: Assembly and execution error types
//! - [`host`]: Syscall bridge: descriptor table, heap, printf renderer
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`memory`]: Byte-addressable data segment
//! - [`program`]: Serialized program container format
//! - [`stack`]: Operand stack and call-frame bookkeeping
//! - [`vm`]: Core fetch/decode/execute implementation

pub mod assembler;
pub mod errors;
pub mod host;
pub mod isa;
pub mod memory;
pub mod program;
pub mod stack;
pub mod vm;

/// Machine word. All registers, stack slots, and instruction operands
/// are 32-bit signed integers.
pub type Word = i32;

/// Size of a machine word in the data segment, in bytes.
pub const WORD_SIZE: usize = 4;

/// Default pool size (bytes of data segment, words of stack): 256 KiB.
pub const DEFAULT_POOLSIZE: usize = 256 * 1024;

/// Tunable execution parameters for a [`vm::Vm`].
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Data segment size in bytes and stack size in words.
    pub poolsize: usize,
    /// Log each fetched instruction through the trace hook.
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            poolsize: DEFAULT_POOLSIZE,
            trace: false,
        }
    }
}
