//! Type-tagged frame codec.
//!
//! Wire format:
//! ```text
//! ┌────────────┬──────────────────────────────────────────────┐
//! │ Command (1B)│ field*                                       │
//! └────────────┴──────────────────────────────────────────────┘
//!
//! field := tag(1B) value
//!   Int8u  0x01  u8
//!   Int16u 0x02  u16 BE
//!   Int32u 0x03  u32 BE   (signed values folded: bit31 = sign, low 31 = |v|)
//!   Binary 0x04  len(u16 BE) bytes
//!   String 0x05  len(u16 BE) UTF-8 bytes
//! ```
//!
//! Every operation is all-or-nothing: a failed encode leaves the frame's
//! bytes and length untouched, and a failed decode leaves the read cursor
//! and the caller's output untouched.
//!
//! A frame's buffer is wiped when it is dropped, since Import requests
//! carry private keys.

use zeroize::Zeroize;

use crate::error::CodecError;

/// Capacity of a request/response frame.
pub const FRAME_CAPACITY: usize = 2048;

/// Length prefix width for Binary/String fields.
const LEN_PREFIX: usize = 2;

const SIGN_BIT: u32 = 0x8000_0000;

/// Field type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldType {
    Int8u = 0x01,
    Int16u = 0x02,
    Int32u = 0x03,
    Binary = 0x04,
    String = 0x05,
}

/// Fold a signed value into the sign/magnitude wire form.
pub const fn fold_i32(value: i32) -> u32 {
    let magnitude = value.unsigned_abs() & !SIGN_BIT;
    if value < 0 { SIGN_BIT | magnitude } else { magnitude }
}

/// Inverse of [`fold_i32`].
pub const fn unfold_i32(raw: u32) -> i32 {
    let magnitude = (raw & !SIGN_BIT) as i32;
    if raw & SIGN_BIT != 0 { -magnitude } else { magnitude }
}

/// One encoded request or response over a fixed-capacity buffer.
pub struct Frame<const N: usize = FRAME_CAPACITY> {
    buf: [u8; N],
    len: usize,
    pos: usize,
}

impl<const N: usize> Frame<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
            pos: 0,
        }
    }

    /// Load a received frame for decoding.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        let mut frame = Self::new();
        frame.reserve(data.len())?;
        frame.buf[..data.len()].copy_from_slice(data);
        frame.len = data.len();
        Ok(frame)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Read cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to decode.
    pub fn remaining(&self) -> usize {
        self.len - self.pos
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.pos = 0;
    }

    /// Zero the whole buffer and reset the frame.
    pub fn wipe(&mut self) {
        self.buf.zeroize();
        self.clear();
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    fn reserve(&self, needed: usize) -> Result<(), CodecError> {
        if N == 0 {
            return Err(CodecError::ZeroCapacity);
        }
        if needed > N - self.len {
            return Err(CodecError::NoRoom);
        }
        Ok(())
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    // ── Encoding ──────────────────────────────────────────────

    /// Write the untagged command byte that opens every frame.
    pub fn add_header(&mut self, command: u8) -> Result<(), CodecError> {
        self.reserve(1)?;
        self.push(&[command]);
        Ok(())
    }

    pub fn add_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.reserve(2)?;
        self.push(&[FieldType::Int8u as u8, value]);
        Ok(())
    }

    pub fn add_u16(&mut self, value: u16) -> Result<(), CodecError> {
        self.reserve(3)?;
        self.push(&[FieldType::Int16u as u8]);
        self.push(&value.to_be_bytes());
        Ok(())
    }

    pub fn add_u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.reserve(5)?;
        self.push(&[FieldType::Int32u as u8]);
        self.push(&value.to_be_bytes());
        Ok(())
    }

    /// Signed values travel as `Int32u` in sign/magnitude form.
    pub fn add_i32(&mut self, value: i32) -> Result<(), CodecError> {
        self.add_u32(fold_i32(value))
    }

    pub fn add_bytes(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.add_blob(FieldType::Binary, data)
    }

    pub fn add_string(&mut self, value: &str) -> Result<(), CodecError> {
        self.add_blob(FieldType::String, value.as_bytes())
    }

    fn add_blob(&mut self, tag: FieldType, data: &[u8]) -> Result<(), CodecError> {
        let len = u16::try_from(data.len()).map_err(|_| CodecError::TooLarge)?;
        self.reserve(1 + LEN_PREFIX + data.len())?;
        self.push(&[tag as u8]);
        self.push(&len.to_be_bytes());
        self.push(data);
        Ok(())
    }

    // ── Decoding ──────────────────────────────────────────────

    /// Read the untagged command byte.
    pub fn get_header(&mut self) -> Result<u8, CodecError> {
        let byte = *self.buf[..self.len]
            .get(self.pos)
            .ok_or(CodecError::Exhausted)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Check the tag and return the `width`-byte value slice without
    /// advancing.
    fn peek_fixed(&self, tag: FieldType, width: usize) -> Result<&[u8], CodecError> {
        let rest = &self.buf[self.pos..self.len];
        let found = *rest.first().ok_or(CodecError::Exhausted)?;
        if found != tag as u8 {
            return Err(CodecError::TypeMismatch {
                expected: tag as u8,
                found,
            });
        }
        rest.get(1..1 + width).ok_or(CodecError::Exhausted)
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        let value = self.peek_fixed(FieldType::Int8u, 1)?[0];
        self.pos += 2;
        Ok(value)
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        let raw = self.peek_fixed(FieldType::Int16u, 2)?;
        let value = u16::from_be_bytes([raw[0], raw[1]]);
        self.pos += 3;
        Ok(value)
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        let raw = self.peek_fixed(FieldType::Int32u, 4)?;
        let value = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        self.pos += 5;
        Ok(value)
    }

    pub fn get_i32(&mut self) -> Result<i32, CodecError> {
        self.get_u32().map(unfold_i32)
    }

    /// Locate a Binary/String payload no longer than `max`.
    /// Returns `(payload_start, payload_len)` without advancing.
    fn peek_blob(&self, tag: FieldType, max: usize) -> Result<(usize, usize), CodecError> {
        let prefix = self.peek_fixed(tag, LEN_PREFIX)?;
        let declared = u16::from_be_bytes([prefix[0], prefix[1]]) as usize;
        if declared > max {
            return Err(CodecError::TooLarge);
        }
        let start = self.pos + 1 + LEN_PREFIX;
        if declared > self.len - start {
            return Err(CodecError::Truncated);
        }
        Ok((start, declared))
    }

    /// Copy a Binary field into `out`; `out.len()` is the caller's maximum.
    /// Returns the number of bytes copied.
    pub fn get_bytes(&mut self, out: &mut [u8]) -> Result<usize, CodecError> {
        let (start, len) = self.peek_blob(FieldType::Binary, out.len())?;
        out[..len].copy_from_slice(&self.buf[start..start + len]);
        self.pos = start + len;
        Ok(len)
    }

    /// Decode a Binary field into a fixed-capacity vector.
    pub fn get_vec<const M: usize>(&mut self) -> Result<heapless::Vec<u8, M>, CodecError> {
        let (start, len) = self.peek_blob(FieldType::Binary, M)?;
        let mut out = heapless::Vec::new();
        out.extend_from_slice(&self.buf[start..start + len])
            .map_err(|_| CodecError::TooLarge)?;
        self.pos = start + len;
        Ok(out)
    }

    /// Decode a String field of at most `M` bytes.
    pub fn get_string<const M: usize>(&mut self) -> Result<heapless::String<M>, CodecError> {
        let (start, len) = self.peek_blob(FieldType::String, M)?;
        let text = core::str::from_utf8(&self.buf[start..start + len])
            .map_err(|_| CodecError::InvalidUtf8)?;
        let mut out = heapless::String::new();
        out.push_str(text).map_err(|_| CodecError::TooLarge)?;
        self.pos = start + len;
        Ok(out)
    }
}

impl<const N: usize> Default for Frame<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Drop for Frame<N> {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}
