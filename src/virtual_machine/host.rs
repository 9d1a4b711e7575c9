//! Syscall bridge between guest programs and the host.
//!
//! Holds the pieces of host state the trap instructions touch: the file
//! descriptor table backing `OPEN`/`READ`/`CLOS`, the bump allocator
//! backing `MALC`, and the `printf`-subset renderer backing `PRTF`.
//! Syscall failures are reported to the guest as `ax = -1` sentinels, so
//! nothing in here terminates execution except data-segment faults
//! surfaced by the caller.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::memory::DataSegment;
use crate::virtual_machine::{Word, WORD_SIZE};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Host file-open mode selected by the `OPEN` trap's mode word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Mode 0: read an existing file.
    Read,
    /// Mode 1: create or truncate for writing.
    Write,
    /// Mode 2: create and append.
    Append,
}

impl OpenMode {
    /// Maps the guest mode word to an open mode. Unknown values are a
    /// guest-visible failure, not a fault.
    pub fn from_word(mode: Word) -> Option<Self> {
        match mode {
            0 => Some(OpenMode::Read),
            1 => Some(OpenMode::Write),
            2 => Some(OpenMode::Append),
            _ => None,
        }
    }

    fn open(self, path: &Path) -> io::Result<File> {
        match self {
            OpenMode::Read => OpenOptions::new().read(true).open(path),
            OpenMode::Write => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path),
            OpenMode::Append => OpenOptions::new()
                .append(true)
                .create(true)
                .open(path),
        }
    }
}

/// First descriptor handed to guests; 0-2 are reserved by convention.
const FIRST_FD: Word = 3;

/// Guest-visible file descriptor table.
///
/// Descriptors are allocated monotonically and never reused within a run.
pub struct FdTable {
    files: HashMap<Word, File>,
    next_fd: Word,
}

impl FdTable {
    /// Creates an empty descriptor table.
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            next_fd: FIRST_FD,
        }
    }

    /// Opens `path` in the given mode and registers the handle.
    ///
    /// Returns the new descriptor, or `None` when the host refuses the
    /// open (missing file, permissions, ...).
    pub fn open(&mut self, path: &Path, mode: OpenMode) -> Option<Word> {
        let file = mode.open(path).ok()?;
        let fd = self.next_fd;
        self.next_fd += 1;
        self.files.insert(fd, file);
        Some(fd)
    }

    /// Returns the open file behind `fd`, if any.
    pub fn get_mut(&mut self, fd: Word) -> Option<&mut File> {
        self.files.get_mut(&fd)
    }

    /// Removes `fd`, dropping the host handle. Returns false for unknown
    /// descriptors.
    pub fn close(&mut self, fd: Word) -> bool {
        self.files.remove(&fd).is_some()
    }

    /// Number of currently open descriptors.
    pub fn len(&self) -> usize {
        self.files.len()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Bump allocator over the upper half of the data segment.
///
/// `MALC` carves word-aligned chunks from `poolsize / 2` upward. There is
/// no free list: memory is only reclaimed when the VM is dropped.
pub struct Heap {
    next: usize,
    limit: usize,
}

impl Heap {
    /// Creates a heap spanning the upper half of a `poolsize`-byte pool.
    pub fn new(poolsize: usize) -> Self {
        // Round the base up so every allocation stays word-aligned.
        let base = (poolsize / 2 + WORD_SIZE - 1) / WORD_SIZE * WORD_SIZE;
        Self {
            next: base.min(poolsize),
            limit: poolsize,
        }
    }

    /// Allocates `size` bytes, rounded up to word alignment.
    ///
    /// Returns the guest address, or `None` when `size` is non-positive
    /// or the region is exhausted.
    pub fn alloc(&mut self, size: Word) -> Option<Word> {
        if size <= 0 {
            return None;
        }
        let rounded = (size as usize).checked_add(WORD_SIZE - 1)? / WORD_SIZE * WORD_SIZE;
        let end = self.next.checked_add(rounded)?;
        if end > self.limit {
            return None;
        }
        let addr = self.next;
        self.next = end;
        Some(addr as Word)
    }
}

/// Counts the conversions a format string will consume.
///
/// Every `%` starts a conversion except the `%%` escape, which eats two
/// characters. Escapes are consumed left to right, the way the renderer
/// walks the string, so `%%%d` is one escape followed by one conversion.
pub fn count_conversions(fmt: &[u8]) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < fmt.len() {
        if fmt[i] == b'%' {
            if fmt.get(i + 1) == Some(&b'%') {
                i += 2;
                continue;
            }
            count += 1;
        }
        i += 1;
    }
    count
}

/// Renders a `printf`-subset format string against its argument words.
///
/// Supports `%d`, `%x`, `%c`, `%s` (NUL-terminated data-segment pointer)
/// and the `%%` escape. Rendering is all-or-nothing: any malformed
/// conversion or unreadable `%s` pointer fails the whole call, and the
/// caller reports `-1` to the guest without emitting anything.
pub fn render_format(
    data: &DataSegment,
    fmt: &[u8],
    args: &[Word],
) -> Result<Vec<u8>, VMError> {
    let mut out = Vec::with_capacity(fmt.len());
    let mut next_arg = 0usize;
    let mut take = || -> Result<Word, VMError> {
        let v = args.get(next_arg).copied().ok_or(VMError::InvalidFormat {
            spec: "%".to_string(),
        })?;
        next_arg += 1;
        Ok(v)
    };

    let mut i = 0;
    while i < fmt.len() {
        let b = fmt[i];
        if b != b'%' {
            out.push(b);
            i += 1;
            continue;
        }

        let spec = *fmt.get(i + 1).ok_or(VMError::InvalidFormat {
            spec: "%".to_string(),
        })?;
        match spec {
            b'%' => out.push(b'%'),
            b'd' => out.extend_from_slice(take()?.to_string().as_bytes()),
            b'x' => out.extend_from_slice(format!("{:x}", take()?).as_bytes()),
            b'c' => out.push(take()? as u8),
            b's' => {
                let addr = take()?;
                let bytes = data.read_cstr(addr)?;
                out.extend_from_slice(bytes);
            }
            other => {
                return Err(VMError::InvalidFormat {
                    spec: format!("%{}", other as char),
                });
            }
        }
        i += 2;
    }

    Ok(out)
}
