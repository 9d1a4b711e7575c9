//! Binary encoding and decoding traits for deterministic serialization.
//!
//! This module provides the serialization infrastructure for program
//! images. All encoded data uses little-endian byte order for
//! cross-platform consistency.
//!
//! # Binary Format
//!
//! - Integers: little-endian, fixed-width
//! - `usize`: encoded as `u64` for portability
//! - `Vec<T>`: 8-byte length prefix followed by elements
//! - Arrays `[T; N]`: elements serialized sequentially without length prefix
//!
//! # Example
//!
//! ```ignore
//! use crate::types::encoding::{Encode, Decode};
//!
//! let value: i32 = -42;
//! let bytes = value.to_bytes();
//! let decoded = i32::from_bytes(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

/// Sink for writing encoded bytes.
///
/// Implemented by byte buffers and counters to allow encoding directly
/// into the target without intermediate allocations.
pub trait EncodeSink {
    /// Writes the given bytes to the sink.
    fn write(&mut self, bytes: &[u8]);
}

/// Counter for computing encoded size without allocating memory.
///
/// Used by `Encode::to_bytes` to pre-allocate exact capacity before encoding.
pub struct SizeCounter {
    len: usize,
}

impl SizeCounter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self { len: 0 }
    }

    /// Returns the total number of bytes counted.
    pub fn len(&self) -> usize {
        self.len
    }
}

impl Default for SizeCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for SizeCounter {
    fn write(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
    }
}

impl EncodeSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Trait for types that can be serialized to binary format.
pub trait Encode {
    /// Writes the binary representation to the given sink.
    fn encode<S: EncodeSink>(&self, out: &mut S);

    /// Serializes to a new byte buffer with exact capacity.
    ///
    /// Performs two passes: first to count bytes, then to encode.
    fn to_bytes(&self) -> Vec<u8> {
        // First pass: count
        let mut counter = SizeCounter::new();
        self.encode(&mut counter);

        // Second pass: encode once, with exact capacity
        let mut out = Vec::with_capacity(counter.len());
        self.encode(&mut out);
        out
    }
}

/// Errors that can occur during decoding.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended before expected data was read.
    UnexpectedEof,
    /// Data does not represent a valid value for the target type.
    InvalidValue,
    /// Length prefix exceeds maximum allowed size.
    LengthOverflow,
}

/// Trait for types that can be deserialized from binary format.
pub trait Decode: Sized {
    /// Reads and decodes a value from the input buffer.
    ///
    /// Advances the input slice past the consumed bytes.
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError>;

    /// Decodes a value from a byte slice, requiring all bytes to be consumed.
    ///
    /// Returns `InvalidValue` if trailing bytes remain after decoding.
    fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut input = data;
        let value = Self::decode(&mut input)?;

        if !input.is_empty() {
            return Err(DecodeError::InvalidValue);
        }

        Ok(value)
    }
}

/// Reads exactly `n` bytes from the input, advancing the slice.
fn read_bytes<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], DecodeError> {
    if input.len() < n {
        return Err(DecodeError::UnexpectedEof);
    }
    let (bytes, rest) = input.split_at(n);
    *input = rest;
    Ok(bytes)
}

// u8
impl Encode for u8 {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[*self]);
    }
}

impl Decode for u8 {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = read_bytes(input, 1)?;
        Ok(bytes[0])
    }
}

// Macro for fixed-size integer types
macro_rules! impl_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode<S: EncodeSink>(&self, out: &mut S) {
                    out.write(&self.to_le_bytes());
                }
            }

            impl Decode for $t {
                fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
                    let bytes = read_bytes(input, std::mem::size_of::<$t>())?;
                    Ok(<$t>::from_le_bytes(bytes.try_into().map_err(|_| DecodeError::UnexpectedEof)?))
                }
            }
        )*
    };
}

impl_int!(i32, u32, u64);

// usize as u64
impl Encode for usize {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        (*self as u64).encode(out);
    }
}

impl Decode for usize {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let v = u64::decode(input)?;
        usize::try_from(v).map_err(|_| DecodeError::LengthOverflow)
    }
}

// Vec<T>
impl<T: Encode> Encode for Vec<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.len().encode(out);
        for item in self {
            item.encode(out);
        }
    }
}

/// Maximum allowed length for decoded vectors to prevent memory exhaustion.
const MAX_VEC_LEN: usize = 16_000_000;

impl<T: Decode> Decode for Vec<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = usize::decode(input)?;
        if len > MAX_VEC_LEN {
            return Err(DecodeError::LengthOverflow);
        }

        let mut vec = Vec::with_capacity(len);
        for _ in 0..len {
            vec.push(T::decode(input)?);
        }
        Ok(vec)
    }
}

// Fixed-size arrays [T; N]
impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let mut vec = Vec::with_capacity(N);
        for _ in 0..N {
            vec.push(T::decode(input)?);
        }
        vec.try_into().map_err(|_| DecodeError::InvalidValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== SizeCounter Tests ==========

    #[test]
    fn size_counter_accumulates() {
        let mut counter = SizeCounter::new();
        assert_eq!(counter.len(), 0);

        counter.write(&[1, 2, 3]);
        assert_eq!(counter.len(), 3);

        counter.write(&[4, 5]);
        assert_eq!(counter.len(), 5);
    }

    #[test]
    fn to_bytes_preallocates_exact_capacity() {
        let data: Vec<u8> = vec![1, 2, 3, 4, 5];
        let bytes = data.to_bytes();
        // Vec encodes as: 8-byte length + elements
        assert_eq!(bytes.len(), 8 + 5);
        assert_eq!(bytes.capacity(), bytes.len());
    }

    // ========== Integer Tests ==========

    #[test]
    fn u8_roundtrip() {
        for val in [0u8, 1, 127, 255] {
            let bytes = val.to_bytes();
            assert_eq!(bytes.len(), 1);
            assert_eq!(u8::from_bytes(&bytes).unwrap(), val);
        }
    }

    #[test]
    fn i32_little_endian() {
        let val: i32 = 0x12345678;
        let bytes = val.to_bytes();
        assert_eq!(bytes, vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(i32::from_bytes(&bytes).unwrap(), val);
    }

    #[test]
    fn i32_negative_values() {
        let val: i32 = -1;
        let bytes = val.to_bytes();
        // -1 in two's complement is all 0xFF bytes
        assert_eq!(bytes, vec![0xFF; 4]);
        assert_eq!(i32::from_bytes(&bytes).unwrap(), val);
    }

    #[test]
    fn u64_roundtrip() {
        for val in [0u64, 1, u64::MAX / 2, u64::MAX] {
            let bytes = val.to_bytes();
            assert_eq!(bytes.len(), 8);
            assert_eq!(u64::from_bytes(&bytes).unwrap(), val);
        }
    }

    // ========== usize Tests ==========

    #[test]
    fn usize_encoded_as_u64() {
        let val: usize = 42;
        let bytes = val.to_bytes();
        assert_eq!(bytes.len(), 8); // Always 8 bytes (u64)
        assert_eq!(usize::from_bytes(&bytes).unwrap(), val);
    }

    // ========== Vec<T> Tests ==========

    #[test]
    fn vec_encoding_format() {
        let vec: Vec<u8> = vec![0xAA, 0xBB, 0xCC];
        let bytes = vec.to_bytes();

        // 8-byte length prefix (little-endian) + elements
        assert_eq!(&bytes[0..8], &3u64.to_le_bytes());
        assert_eq!(&bytes[8..], &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn vec_roundtrip() {
        let original: Vec<i32> = vec![1, -2, 3, -4, 5];
        let bytes = original.to_bytes();
        let decoded = Vec::<i32>::from_bytes(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn vec_empty() {
        let empty: Vec<u8> = vec![];
        let bytes = empty.to_bytes();
        assert_eq!(bytes.len(), 8); // Just the length prefix
        assert_eq!(Vec::<u8>::from_bytes(&bytes).unwrap(), empty);
    }

    #[test]
    fn vec_length_overflow() {
        // Encode a length greater than MAX_VEC_LEN
        let huge_len: u64 = (MAX_VEC_LEN as u64) + 1;
        let bytes = huge_len.to_bytes();
        let result = Vec::<u8>::from_bytes(&bytes);
        assert!(matches!(result, Err(DecodeError::LengthOverflow)));
    }

    // ========== Fixed-Size Array Tests ==========

    #[test]
    fn array_no_length_prefix() {
        let arr: [u8; 4] = [1, 2, 3, 4];
        let bytes = arr.to_bytes();
        // No length prefix, just raw elements
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn array_roundtrip() {
        let original: [i32; 3] = [13, 2, 37];
        let bytes = original.to_bytes();
        let decoded = <[i32; 3]>::from_bytes(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    // ========== Error Handling Tests ==========

    #[test]
    fn unexpected_eof_empty_input() {
        let result = i32::from_bytes(&[]);
        assert!(matches!(result, Err(DecodeError::UnexpectedEof)));
    }

    #[test]
    fn unexpected_eof_partial_input() {
        // i32 needs 4 bytes, only provide 2
        let result = i32::from_bytes(&[0x12, 0x34]);
        assert!(matches!(result, Err(DecodeError::UnexpectedEof)));
    }

    #[test]
    fn trailing_bytes_error() {
        // Encode a u8 but add extra bytes
        let bytes = &[42u8, 0xFF, 0xFF];
        let result = u8::from_bytes(bytes);
        assert!(matches!(result, Err(DecodeError::InvalidValue)));
    }

    #[test]
    fn decode_advances_input() {
        let mut input: &[u8] = &[0x01, 0x02, 0x03, 0x04, 0x05];

        let first = u8::decode(&mut input).unwrap();
        assert_eq!(first, 0x01);
        assert_eq!(input.len(), 4);

        let second = i32::decode(&mut input).unwrap();
        assert_eq!(second, 0x05040302); // little-endian
        assert!(input.is_empty());
    }
}
