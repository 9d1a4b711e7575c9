//! Byte-addressable data segment.
//!
//! A flat pool of `poolsize` bytes holding string literals, globals,
//! syscall buffers, and the heap half used by `MALC`. Word accesses are
//! little-endian and 4 bytes wide; byte accesses truncate to the low
//! 8 bits. Every access is bounds-checked against the pool, and a failed
//! check is a fatal [`VMError::MemoryFault`].

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::{Word, WORD_SIZE};

/// The VM's data segment.
pub struct DataSegment {
    bytes: Vec<u8>,
}

impl DataSegment {
    /// Creates a zero-filled data segment of `poolsize` bytes.
    pub fn new(poolsize: usize) -> Self {
        Self {
            bytes: vec![0; poolsize],
        }
    }

    /// Returns the pool size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Validates that `size` bytes starting at `addr` lie inside the pool.
    ///
    /// Returns the range start as `usize` on success. `size` is signed so
    /// that negative counts from the guest surface in the fault message.
    pub fn check_range(&self, addr: Word, size: i64) -> Result<usize, VMError> {
        let fault = || VMError::MemoryFault {
            addr,
            size,
            poolsize: self.bytes.len(),
        };

        if addr < 0 || size < 0 {
            return Err(fault());
        }
        let start = addr as usize;
        let end = start.checked_add(size as usize).ok_or_else(fault)?;
        if end > self.bytes.len() {
            return Err(fault());
        }
        Ok(start)
    }

    /// Reads the little-endian word at `addr`.
    pub fn load_word(&self, addr: Word) -> Result<Word, VMError> {
        let start = self.check_range(addr, WORD_SIZE as i64)?;
        let raw: [u8; WORD_SIZE] = self.bytes[start..start + WORD_SIZE]
            .try_into()
            .map_err(|_| VMError::MemoryFault {
                addr,
                size: WORD_SIZE as i64,
                poolsize: self.bytes.len(),
            })?;
        Ok(Word::from_le_bytes(raw))
    }

    /// Writes `value` as a little-endian word at `addr`.
    pub fn store_word(&mut self, addr: Word, value: Word) -> Result<(), VMError> {
        let start = self.check_range(addr, WORD_SIZE as i64)?;
        self.bytes[start..start + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Reads the byte at `addr`, zero-extended to a word.
    pub fn load_byte(&self, addr: Word) -> Result<Word, VMError> {
        let start = self.check_range(addr, 1)?;
        Ok(self.bytes[start] as Word)
    }

    /// Writes the low 8 bits of `value` at `addr`.
    pub fn store_byte(&mut self, addr: Word, value: Word) -> Result<(), VMError> {
        let start = self.check_range(addr, 1)?;
        self.bytes[start] = value as u8;
        Ok(())
    }

    /// Returns the `count` bytes starting at `addr`.
    pub fn read(&self, addr: Word, count: i64) -> Result<&[u8], VMError> {
        let start = self.check_range(addr, count)?;
        Ok(&self.bytes[start..start + count as usize])
    }

    /// Copies `data` into the pool starting at `addr`.
    pub fn write(&mut self, addr: Word, data: &[u8]) -> Result<(), VMError> {
        let start = self.check_range(addr, data.len() as i64)?;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Fills `count` bytes starting at `addr` with `byte`.
    pub fn fill(&mut self, addr: Word, byte: u8, count: i64) -> Result<(), VMError> {
        let start = self.check_range(addr, count)?;
        self.bytes[start..start + count as usize].fill(byte);
        Ok(())
    }

    /// Reads a NUL-terminated string starting at `addr`.
    ///
    /// The returned slice excludes the terminator. Faults if the string
    /// runs off the end of the pool before a NUL is found.
    pub fn read_cstr(&self, addr: Word) -> Result<&[u8], VMError> {
        let start = self.check_range(addr, 0)?;
        match self.bytes[start..].iter().position(|&b| b == 0) {
            Some(nul) => Ok(&self.bytes[start..start + nul]),
            None => Err(VMError::MemoryFault {
                addr,
                size: (self.bytes.len() - start) as i64 + 1,
                poolsize: self.bytes.len(),
            }),
        }
    }
}
