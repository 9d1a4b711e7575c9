//! Serialized program representation.
//!
//! [`Program`] wraps the word sequence the VM executes. The on-disk
//! container prepends a magic header and format version so stale or
//! foreign files are rejected before any words are interpreted.

use crate::types::encoding::{Decode, Encode};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::Word;
use minic_derive::BinaryCodec;

/// Magic bytes identifying a serialized program.
const MAGIC: &[u8; 5] = b"MINIC";

/// Current program format version.
const CURRENT_VERSION: Version = Version::new(0, 1, 0);

/// Semantic version for program format compatibility.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, BinaryCodec)]
struct Version {
    major: u8,
    minor: u8,
    patch: u8,
}

impl Version {
    /// Creates a new version with the given components.
    const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// An executable program: the text segment as a flat word sequence.
///
/// Operand-carrying instructions occupy two consecutive words (opcode,
/// then inline operand); all others occupy one.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct Program {
    /// Text segment words.
    pub text: Vec<Word>,
}

impl Program {
    /// Wraps a word sequence as a program.
    pub fn new(text: Vec<Word>) -> Self {
        Self { text }
    }

    /// Number of words in the text segment.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True when the text segment is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Serializes the program to a portable binary format.
    ///
    /// The output includes a magic header and version for compatibility checking.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        MAGIC.encode(&mut out);
        CURRENT_VERSION.encode(&mut out);
        self.encode(&mut out);
        out
    }

    /// Deserializes a program from its binary representation.
    ///
    /// Validates the magic header and version, rejecting programs from
    /// newer (incompatible) formats.
    pub fn from_bytes(mut input: &[u8]) -> Result<Self, VMError> {
        if input.len() < MAGIC.len() {
            return Err(VMError::DecodeError {
                reason: "truncated".to_string(),
            });
        }

        if &<[u8; 5]>::decode(&mut input)? != MAGIC {
            return Err(VMError::DecodeError {
                reason: "bad magic".to_string(),
            });
        }

        if Version::decode(&mut input)? != CURRENT_VERSION {
            return Err(VMError::DecodeError {
                reason: "unsupported version".to_string(),
            });
        }

        let p = Program::decode(&mut input)?;
        if !input.is_empty() {
            return Err(VMError::DecodeError {
                reason: "trailing bytes".to_string(),
            });
        }
        Ok(p)
    }
}
