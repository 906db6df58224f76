//! Minimal DER reader and writer.
//!
//! Only definite-length encodings with single-byte tags are supported,
//! which covers everything the provisioning flow touches: SEC1 / PKCS#8
//! private keys, X.509 certificates and PKCS#10 requests.
//!
//! Reading is an explicit iterator over sibling TLVs:
//!
//! ```text
//!   30 81 9F  [ 02 01 01 | 04 20 …32… | A0 0A … ]
//!   └── Tlv ┘   └─────── DerReader over value ───────┘
//! ```
//!
//! Writing goes into a fixed-capacity buffer; nested constructions are
//! built child-first and then wrapped.

use core::fmt;

pub mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OID: u8 = 0x06;
    pub const UTF8_STRING: u8 = 0x0C;
    pub const SEQUENCE: u8 = 0x30;
    pub const SET: u8 = 0x31;
    pub const CONTEXT_0: u8 = 0xA0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerError {
    /// Header or value runs past the end of the input.
    Truncated,
    /// Indefinite or longer-than-3-byte length form.
    UnsupportedLength,
    /// Writer buffer is full.
    Overflow,
}

impl fmt::Display for DerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "DER element truncated"),
            Self::UnsupportedLength => write!(f, "unsupported DER length form"),
            Self::Overflow => write!(f, "DER output buffer full"),
        }
    }
}

// ── Reader ───────────────────────────────────────────────────

/// One decoded element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// True for SEQUENCE, SET and constructed context tags.
    pub fn is_constructed(&self) -> bool {
        self.tag & 0x20 != 0
    }

    /// Iterate over the children of a constructed element.
    pub fn children(&self) -> DerReader<'a> {
        DerReader::new(self.value)
    }
}

/// Split one TLV off the front of `data`.
pub fn parse_tlv(data: &[u8]) -> Result<(Tlv<'_>, &[u8]), DerError> {
    let (&tag, rest) = data.split_first().ok_or(DerError::Truncated)?;
    let (&first, rest) = rest.split_first().ok_or(DerError::Truncated)?;

    let (len, rest) = if first < 0x80 {
        (first as usize, rest)
    } else {
        let n = (first & 0x7F) as usize;
        if n == 0 || n > 3 {
            return Err(DerError::UnsupportedLength);
        }
        if rest.len() < n {
            return Err(DerError::Truncated);
        }
        let len = rest[..n].iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
        (len, &rest[n..])
    };

    if rest.len() < len {
        return Err(DerError::Truncated);
    }
    let (value, rest) = rest.split_at(len);
    Ok((Tlv { tag, value }, rest))
}

/// Iterator over consecutive sibling elements.  Yields one `Err` on a
/// malformed element and then stops.
#[derive(Debug, Clone)]
pub struct DerReader<'a> {
    rest: &'a [u8],
    failed: bool,
}

impl<'a> DerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            rest: data,
            failed: false,
        }
    }

    /// Next element, required to carry `tag`.
    pub fn expect(&mut self, tag: u8) -> Option<Tlv<'a>> {
        match self.next() {
            Some(Ok(tlv)) if tlv.tag == tag => Some(tlv),
            _ => None,
        }
    }
}

impl<'a> Iterator for DerReader<'a> {
    type Item = Result<Tlv<'a>, DerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        match parse_tlv(self.rest) {
            Ok((tlv, rest)) => {
                self.rest = rest;
                Some(Ok(tlv))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

// ── Writer ───────────────────────────────────────────────────

/// Fixed-capacity DER output buffer.
#[derive(Debug, Clone, Default)]
pub struct DerWriter<const N: usize> {
    buf: heapless::Vec<u8, N>,
}

impl<const N: usize> DerWriter<N> {
    pub fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn raw(&mut self, bytes: &[u8]) -> Result<(), DerError> {
        self.buf
            .extend_from_slice(bytes)
            .map_err(|_| DerError::Overflow)
    }

    fn length(&mut self, len: usize) -> Result<(), DerError> {
        match len {
            0..=0x7F => self.raw(&[len as u8]),
            0x80..=0xFF => self.raw(&[0x81, len as u8]),
            0x100..=0xFFFF => self.raw(&[0x82, (len >> 8) as u8, len as u8]),
            _ => Err(DerError::UnsupportedLength),
        }
    }

    pub fn tlv(&mut self, tag: u8, value: &[u8]) -> Result<(), DerError> {
        self.raw(&[tag])?;
        self.length(value.len())?;
        self.raw(value)
    }

    /// Build a constructed element from whatever `body` writes.
    pub fn nested<F>(&mut self, tag: u8, body: F) -> Result<(), DerError>
    where
        F: FnOnce(&mut DerWriter<N>) -> Result<(), DerError>,
    {
        let mut inner = DerWriter::<N>::new();
        body(&mut inner)?;
        self.tlv(tag, inner.as_bytes())
    }

    /// Unsigned big-endian magnitude as a minimal INTEGER.
    pub fn unsigned_integer(&mut self, magnitude: &[u8]) -> Result<(), DerError> {
        let start = magnitude
            .iter()
            .position(|&b| b != 0)
            .unwrap_or(magnitude.len());
        let trimmed = &magnitude[start..];
        self.raw(&[tag::INTEGER])?;
        match trimmed.first() {
            None => {
                self.length(1)?;
                self.raw(&[0])
            }
            Some(&b) if b & 0x80 != 0 => {
                self.length(trimmed.len() + 1)?;
                self.raw(&[0])?;
                self.raw(trimmed)
            }
            Some(_) => {
                self.length(trimmed.len())?;
                self.raw(trimmed)
            }
        }
    }

    /// BIT STRING with zero unused bits.
    pub fn bit_string(&mut self, bits: &[u8]) -> Result<(), DerError> {
        self.raw(&[tag::BIT_STRING])?;
        self.length(bits.len() + 1)?;
        self.raw(&[0])?;
        self.raw(bits)
    }
}
