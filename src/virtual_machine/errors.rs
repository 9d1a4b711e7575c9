use minic_derive::Error;

/// Errors that can occur during VM execution, assembly, or program loading.
#[derive(Debug, Error)]
pub enum VMError {
    /// Data-segment access outside the pool.
    #[error("memory fault: access of {size} byte(s) at address {addr} (poolsize {poolsize})")]
    MemoryFault {
        addr: crate::virtual_machine::Word,
        size: i64,
        poolsize: usize,
    },
    /// Stack register moved outside its valid range.
    #[error("stack fault: {register} would move to {index} (poolsize {poolsize})")]
    StackFault {
        register: &'static str,
        index: i64,
        poolsize: usize,
    },
    /// Program counter outside the text segment.
    #[error("program counter {pc} out of range (text length {len})")]
    PcOutOfRange { pc: i64, len: usize },
    /// Unknown opcode encountered in the text segment.
    #[error("invalid instruction {opcode} at pc {pc}")]
    InvalidInstruction {
        opcode: crate::virtual_machine::Word,
        pc: usize,
    },
    /// Division or modulo by zero.
    #[error("division by zero at pc {pc}")]
    DivisionByZero { pc: usize },
    /// Malformed conversion in a guest format string.
    #[error("invalid format conversion: {spec}")]
    InvalidFormat { spec: String },
    /// Unrecognized instruction mnemonic during assembly.
    #[error("unknown mnemonic: {name}")]
    UnknownMnemonic { name: String },
    /// Instruction requires an operand but none was given.
    #[error("instruction {mnemonic} expects an operand")]
    OperandExpected { mnemonic: &'static str },
    /// Instruction takes no operand but one was given.
    #[error("instruction {mnemonic} takes no operand")]
    UnexpectedOperand { mnemonic: &'static str },
    /// Label defined more than once.
    #[error("duplicate label: {label}")]
    DuplicateLabel { label: String },
    /// Reference to undefined label.
    #[error("undefined label: {label}")]
    UndefinedLabel { label: String },
    /// Malformed assembly source with location context.
    #[error("line {line}, column {offset}: {message}")]
    ParseError {
        line: usize,
        offset: usize,
        message: String,
    },
    /// Assembly error with line number context.
    #[error("line {line}, column {offset}: {source}")]
    AssemblyError {
        line: usize,
        offset: usize,
        source: String,
    },
    /// Failed to decode a serialized program.
    #[error("decoding error: {reason}")]
    DecodeError { reason: String },
    /// File I/O error during assembly or program loading.
    #[error("io error on {path}: {source}")]
    IoError { path: String, source: String },
}

impl From<crate::types::encoding::DecodeError> for VMError {
    fn from(err: crate::types::encoding::DecodeError) -> Self {
        VMError::DecodeError {
            reason: format!("{err:?}"),
        }
    }
}
