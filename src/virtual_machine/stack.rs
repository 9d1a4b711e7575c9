//! Operand stack and call-frame bookkeeping.
//!
//! The stack is `poolsize` words and grows downward: `sp` starts at the
//! highest slot and decreases on push. `bp` marks the base of the current
//! call frame. Both registers are range-checked on every move; a violation
//! is a fatal [`VMError::StackFault`].

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::Word;

/// The VM's word stack with its `sp` and `bp` registers.
pub struct Stack {
    slots: Vec<Word>,
    /// Stack pointer: index of the current top-of-stack slot.
    sp: usize,
    /// Base pointer: index of the current frame base.
    bp: usize,
}

impl Stack {
    /// Creates a stack of `poolsize` words with `sp = bp = poolsize - 1`.
    pub fn new(poolsize: usize) -> Self {
        let top = poolsize.saturating_sub(1);
        Self {
            slots: vec![0; poolsize],
            sp: top,
            bp: top,
        }
    }

    /// Current stack pointer.
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Current base pointer.
    pub fn bp(&self) -> usize {
        self.bp
    }

    fn fault(&self, register: &'static str, index: i64) -> VMError {
        VMError::StackFault {
            register,
            index,
            poolsize: self.slots.len(),
        }
    }

    /// Pushes a word, moving `sp` down one slot.
    pub fn push(&mut self, value: Word) -> Result<(), VMError> {
        if self.sp == 0 || self.sp > self.slots.len() {
            return Err(self.fault("sp", self.sp as i64 - 1));
        }
        self.sp -= 1;
        self.slots[self.sp] = value;
        Ok(())
    }

    /// Pops the top word, moving `sp` up one slot.
    pub fn pop(&mut self) -> Result<Word, VMError> {
        if self.sp >= self.slots.len() {
            return Err(self.fault("sp", self.sp as i64));
        }
        let value = self.slots[self.sp];
        self.sp += 1;
        Ok(value)
    }

    /// Reads the word `offset` slots above the top of stack.
    ///
    /// `peek(0)` is the top of stack; syscall arguments pushed in reverse
    /// order sit at increasing offsets.
    pub fn peek(&self, offset: usize) -> Result<Word, VMError> {
        let index = self.sp.checked_add(offset).ok_or_else(|| {
            self.fault("sp", i64::MAX)
        })?;
        if index >= self.slots.len() {
            return Err(self.fault("sp", index as i64));
        }
        Ok(self.slots[index])
    }

    /// Moves `sp` by `delta` slots (positive = discard, negative = reserve).
    ///
    /// `sp` must stay a valid slot index, so discarding past the initial
    /// top of stack faults at the adjusting instruction.
    pub fn adjust(&mut self, delta: Word) -> Result<(), VMError> {
        let target = self.sp as i64 + delta as i64;
        if target < 0 || target >= self.slots.len() as i64 {
            return Err(self.fault("sp", target));
        }
        self.sp = target as usize;
        Ok(())
    }

    /// Opens a call frame: saves `bp`, re-bases it at `sp`, and reserves
    /// `locals` words.
    pub fn enter_frame(&mut self, locals: Word) -> Result<(), VMError> {
        self.push(self.bp as Word)?;
        self.bp = self.sp;
        self.adjust(-locals)
    }

    /// Closes the current frame, restoring the caller's `bp` and returning
    /// the saved return pc.
    ///
    /// Unwinds locals by resetting `sp` to `bp`, then pops the saved base
    /// pointer and return address in that order. Without a matching
    /// `enter_frame`/`push`, the pops run off the top of the stack and
    /// fault.
    pub fn leave_frame(&mut self) -> Result<Word, VMError> {
        self.sp = self.bp;
        let saved_bp = self.pop()?;
        let return_pc = self.pop()?;
        if saved_bp < 0 || saved_bp as i64 >= self.slots.len() as i64 {
            return Err(self.fault("bp", saved_bp as i64));
        }
        self.bp = saved_bp as usize;
        Ok(return_pc)
    }

    /// Computes the absolute slot index `offset` words above `bp`.
    ///
    /// Used by `LEA` for frame-relative addressing: positive offsets reach
    /// arguments, negative offsets reach locals.
    pub fn frame_slot(&self, offset: Word) -> Result<Word, VMError> {
        let index = self.bp as i64 + offset as i64;
        if index < 0 || index >= self.slots.len() as i64 {
            return Err(self.fault("bp", index));
        }
        Ok(index as Word)
    }
}
