//! Core virtual machine implementation.
//!
//! The VM executes the text segment word by word: fetch an opcode,
//! optionally fetch its inline operand, execute, repeat until `EXIT`.
//! All arithmetic uses wrapping semantics to prevent overflow panics;
//! division and modulo use floor semantics (quotient rounds toward
//! negative infinity, remainder takes the divisor's sign).

use crate::trace;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::host::{count_conversions, render_format, FdTable, Heap, OpenMode};
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::memory::DataSegment;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::stack::Stack;
use crate::virtual_machine::{VmConfig, Word};
use std::io::{self, Read, Write};
use std::path::Path;

/// Outcome of executing a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The instruction completed; execution may continue.
    Continue,
    /// The program executed `EXIT` with the given code.
    Exit(Word),
}

/// Stack-machine interpreter.
///
/// Owns the text segment, the data segment, the word stack, and the host
/// state reachable through the syscall traps. Execution runs either to
/// completion via [`run`](Vm::run) or one instruction at a time via
/// [`step`](Vm::step).
pub struct Vm {
    /// Text segment words.
    text: Vec<Word>,
    /// Byte-addressable data segment.
    data: DataSegment,
    /// Word stack with sp/bp registers.
    stack: Stack,
    /// Bump allocator over the upper half of the data segment.
    heap: Heap,
    /// Guest file descriptor table.
    files: FdTable,
    /// Accumulator register.
    ax: Word,
    /// Program counter (word index into the text segment).
    pc: usize,
    /// Execution parameters.
    config: VmConfig,
    /// Sink for PRTF output.
    out: Box<dyn Write>,
}

impl Vm {
    /// Creates a VM with the default configuration.
    pub fn new(program: Program) -> Self {
        Self::with_config(program, VmConfig::default())
    }

    /// Creates a VM with explicit execution parameters.
    pub fn with_config(program: Program, config: VmConfig) -> Self {
        Self {
            text: program.text,
            data: DataSegment::new(config.poolsize),
            stack: Stack::new(config.poolsize),
            heap: Heap::new(config.poolsize),
            files: FdTable::new(),
            ax: 0,
            pc: 0,
            config,
            out: Box::new(io::stdout()),
        }
    }

    /// Redirects PRTF output to the given sink.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    /// Current accumulator value.
    pub fn ax(&self) -> Word {
        self.ax
    }

    /// Current program counter.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Current stack pointer.
    pub fn sp(&self) -> usize {
        self.stack.sp()
    }

    /// Preloads bytes into the data segment before execution.
    ///
    /// This is the loader's job: string literals and globals referenced by
    /// the program are written here, at the addresses the code expects.
    pub fn write_data(&mut self, addr: Word, bytes: &[u8]) -> Result<(), VMError> {
        self.data.write(addr, bytes)
    }

    /// Reads bytes back out of the data segment.
    pub fn read_data(&self, addr: Word, count: i64) -> Result<&[u8], VMError> {
        self.data.read(addr, count)
    }

    /// Executes instructions until `EXIT`, returning the exit code.
    pub fn run(&mut self) -> Result<Word, VMError> {
        loop {
            if let StepOutcome::Exit(code) = self.step()? {
                return Ok(code);
            }
        }
    }

    /// Executes a single instruction.
    pub fn step(&mut self) -> Result<StepOutcome, VMError> {
        let at = self.pc;
        let opcode = self.fetch()?;
        let instr = Instruction::try_from(opcode)
            .map_err(|_| VMError::InvalidInstruction { opcode, pc: at })?;
        let operand = if instr.has_operand() { self.fetch()? } else { 0 };

        if self.config.trace {
            if instr.has_operand() {
                trace!(
                    "pc={:>5} {:<4} {:<11} ax={} sp={}",
                    at,
                    instr.mnemonic(),
                    operand,
                    self.ax,
                    self.stack.sp()
                );
            } else {
                trace!(
                    "pc={:>5} {:<4} {:<11} ax={} sp={}",
                    at,
                    instr.mnemonic(),
                    "",
                    self.ax,
                    self.stack.sp()
                );
            }
        }

        match instr {
            Instruction::Lea => self.op_lea(operand)?,
            Instruction::Imm => self.ax = operand,
            Instruction::Jmp => self.set_pc(operand)?,
            Instruction::Call => self.op_call(operand)?,
            Instruction::Jz => {
                if self.ax == 0 {
                    self.set_pc(operand)?;
                }
            }
            Instruction::Jnz => {
                if self.ax != 0 {
                    self.set_pc(operand)?;
                }
            }
            Instruction::Ent => self.stack.enter_frame(operand)?,
            Instruction::Adj => self.stack.adjust(operand)?,
            Instruction::Lev => {
                let return_pc = self.stack.leave_frame()?;
                self.set_pc(return_pc)?;
            }
            Instruction::Li => self.ax = self.data.load_word(self.ax)?,
            Instruction::Lc => self.ax = self.data.load_byte(self.ax)?,
            Instruction::Si => {
                let addr = self.stack.pop()?;
                self.data.store_word(addr, self.ax)?;
            }
            Instruction::Sc => {
                let addr = self.stack.pop()?;
                self.data.store_byte(addr, self.ax)?;
            }
            Instruction::Push => self.stack.push(self.ax)?,
            Instruction::Or
            | Instruction::Xor
            | Instruction::And
            | Instruction::Eq
            | Instruction::Ne
            | Instruction::Lt
            | Instruction::Gt
            | Instruction::Le
            | Instruction::Ge
            | Instruction::Shl
            | Instruction::Shr
            | Instruction::Add
            | Instruction::Sub
            | Instruction::Mul
            | Instruction::Div
            | Instruction::Mod => self.op_alu(instr, at)?,
            Instruction::Open => self.op_open()?,
            Instruction::Read => self.op_read()?,
            Instruction::Clos => self.op_clos()?,
            Instruction::Prtf => self.op_prtf()?,
            Instruction::Malc => self.op_malc()?,
            Instruction::Mset => self.op_mset()?,
            Instruction::Mcmp => self.op_mcmp()?,
            Instruction::Exit => return Ok(StepOutcome::Exit(self.stack.peek(0)?)),
        }

        Ok(StepOutcome::Continue)
    }

    /// Fetches the word at `pc` and advances.
    fn fetch(&mut self) -> Result<Word, VMError> {
        if self.pc >= self.text.len() {
            return Err(VMError::PcOutOfRange {
                pc: self.pc as i64,
                len: self.text.len(),
            });
        }
        let word = self.text[self.pc];
        self.pc += 1;
        Ok(word)
    }

    /// Sets `pc` to an absolute word offset.
    ///
    /// Negative targets fault immediately; targets at or past the end of
    /// the text segment fault on the next fetch.
    fn set_pc(&mut self, target: Word) -> Result<(), VMError> {
        if target < 0 {
            return Err(VMError::PcOutOfRange {
                pc: target as i64,
                len: self.text.len(),
            });
        }
        self.pc = target as usize;
        Ok(())
    }

    fn op_lea(&mut self, offset: Word) -> Result<(), VMError> {
        self.ax = self.stack.frame_slot(offset)?;
        Ok(())
    }

    fn op_call(&mut self, target: Word) -> Result<(), VMError> {
        // pc already points past the operand, i.e. at the return site
        self.stack.push(self.pc as Word)?;
        self.set_pc(target)
    }

    /// Executes a binary ALU instruction.
    ///
    /// The left operand is popped from the stack; the right operand is
    /// `ax`. Comparisons leave 1 or 0 in `ax`.
    fn op_alu(&mut self, instr: Instruction, at: usize) -> Result<(), VMError> {
        let a = self.stack.pop()?;
        let b = self.ax;

        self.ax = match instr {
            Instruction::Or => a | b,
            Instruction::Xor => a ^ b,
            Instruction::And => a & b,
            Instruction::Eq => (a == b) as Word,
            Instruction::Ne => (a != b) as Word,
            Instruction::Lt => (a < b) as Word,
            Instruction::Gt => (a > b) as Word,
            Instruction::Le => (a <= b) as Word,
            Instruction::Ge => (a >= b) as Word,
            Instruction::Shl => a.wrapping_shl(b as u32),
            Instruction::Shr => a.wrapping_shr(b as u32),
            Instruction::Add => a.wrapping_add(b),
            Instruction::Sub => a.wrapping_sub(b),
            Instruction::Mul => a.wrapping_mul(b),
            Instruction::Div => {
                if b == 0 {
                    return Err(VMError::DivisionByZero { pc: at });
                }
                floor_div(a, b)
            }
            Instruction::Mod => {
                if b == 0 {
                    return Err(VMError::DivisionByZero { pc: at });
                }
                floor_rem(a, b)
            }
            // step() only routes binary operators here
            _ => b,
        };
        Ok(())
    }

    /// OPEN: path pointer at sp+1, mode word at sp.
    ///
    /// Host refusals (missing file, bad mode, non-UTF-8 path) leave `-1`
    /// in `ax`; an unreadable path string is a fatal memory fault.
    fn op_open(&mut self) -> Result<(), VMError> {
        let path_addr = self.stack.peek(1)?;
        let mode_word = self.stack.peek(0)?;

        let path_bytes = self.data.read_cstr(path_addr)?;
        let path = match std::str::from_utf8(path_bytes) {
            Ok(s) => s,
            Err(_) => {
                self.ax = -1;
                return Ok(());
            }
        };

        self.ax = match OpenMode::from_word(mode_word) {
            Some(mode) => match self.files.open(Path::new(path), mode) {
                Some(fd) => fd,
                None => -1,
            },
            None => -1,
        };
        Ok(())
    }

    /// READ: fd at sp+2, buffer pointer at sp+1, byte count at sp.
    ///
    /// Unknown descriptors and negative counts leave `-1` in `ax`; a
    /// buffer outside the pool is a fatal memory fault.
    fn op_read(&mut self) -> Result<(), VMError> {
        let fd = self.stack.peek(2)?;
        let buf = self.stack.peek(1)?;
        let count = self.stack.peek(0)?;

        if count < 0 {
            self.ax = -1;
            return Ok(());
        }

        let file = match self.files.get_mut(fd) {
            Some(f) => f,
            None => {
                self.ax = -1;
                return Ok(());
            }
        };

        let mut chunk = Vec::new();
        if file.take(count as u64).read_to_end(&mut chunk).is_err() {
            self.ax = -1;
            return Ok(());
        }

        self.data.write(buf, &chunk)?;
        self.ax = chunk.len() as Word;
        Ok(())
    }

    /// CLOS: fd at sp. Drops the host handle.
    fn op_clos(&mut self) -> Result<(), VMError> {
        let fd = self.stack.peek(0)?;
        self.ax = if self.files.close(fd) { 0 } else { -1 };
        Ok(())
    }

    /// PRTF: format pointer at sp, argument words at sp+1 and up.
    ///
    /// The output is rendered in full before anything is emitted; a
    /// malformed conversion leaves `-1` in `ax` and emits nothing.
    fn op_prtf(&mut self) -> Result<(), VMError> {
        let fmt_addr = self.stack.peek(0)?;
        let fmt = self.data.read_cstr(fmt_addr)?.to_vec();

        let wanted = count_conversions(&fmt);
        let mut args = Vec::with_capacity(wanted);
        for i in 0..wanted {
            match self.stack.peek(1 + i) {
                Ok(v) => args.push(v),
                Err(_) => break,
            }
        }

        match render_format(&self.data, &fmt, &args) {
            Ok(bytes) => {
                if self.out.write_all(&bytes).is_err() {
                    self.ax = -1;
                } else {
                    let _ = self.out.flush();
                    self.ax = bytes.len() as Word;
                }
            }
            Err(_) => self.ax = -1,
        }
        Ok(())
    }

    /// MALC: requested byte count at sp. Exhaustion is `-1`, not a fault.
    fn op_malc(&mut self) -> Result<(), VMError> {
        let size = self.stack.peek(0)?;
        self.ax = self.heap.alloc(size).unwrap_or(-1);
        Ok(())
    }

    /// MSET: address at sp+2, fill byte at sp+1, count at sp.
    fn op_mset(&mut self) -> Result<(), VMError> {
        let addr = self.stack.peek(2)?;
        let byte = self.stack.peek(1)?;
        let count = self.stack.peek(0)?;
        self.data.fill(addr, byte as u8, count as i64)?;
        self.ax = addr;
        Ok(())
    }

    /// MCMP: addresses at sp+2 and sp+1, count at sp. Leaves -1/0/1 in `ax`.
    fn op_mcmp(&mut self) -> Result<(), VMError> {
        let a = self.stack.peek(2)?;
        let b = self.stack.peek(1)?;
        let count = self.stack.peek(0)?;

        let left = self.data.read(a, count as i64)?.to_vec();
        let right = self.data.read(b, count as i64)?;
        self.ax = match left.as_slice().cmp(right) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        };
        Ok(())
    }
}

/// Floor division: the quotient rounds toward negative infinity.
fn floor_div(a: Word, b: Word) -> Word {
    let q = a.wrapping_div(b);
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) {
        q.wrapping_sub(1)
    } else {
        q
    }
}

/// Floor remainder: the result takes the divisor's sign.
fn floor_rem(a: Word, b: Word) -> Word {
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) {
        r.wrapping_add(b)
    } else {
        r
    }
}

#[cfg(test)]
mod tests;
