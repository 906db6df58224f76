//! Unified error types for the provisioning core.
//!
//! Every fallible operation funnels into [`ProvisionError`].  The dispatcher
//! is the single place where an error becomes a wire-visible status code
//! (see [`ProvisionError::code`]); nothing below it is user-facing.
//! All variants are `Copy` so they can be passed around without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level provisioning error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionError {
    /// Frame encode/decode failure.
    Codec(CodecError),
    /// Import named a file id outside Key/DAC/PAI/CD.
    InvalidFileId(u8),
    /// Key store generate/import/destroy/sign failure.
    Crypto(CryptoError),
    /// Certificate could not be parsed.
    CertParse,
    /// Config store or flash failure.
    Storage(StorageError),
    /// Config key outside the reserved ranges.
    InvalidKey(u32),
    /// Caller-supplied output buffer is too small.
    BufferTooSmall,
}

impl ProvisionError {
    /// Status code carried in the response frame.  Always negative; zero is
    /// reserved for success.
    pub const fn code(self) -> i32 {
        match self {
            Self::Codec(e) => e.code(),
            Self::InvalidFileId(_) => -10,
            Self::Crypto(e) => e.code(),
            Self::CertParse => -30,
            Self::Storage(e) => e.code(),
            Self::InvalidKey(_) => -50,
            Self::BufferTooSmall => -60,
        }
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codec(e) => write!(f, "codec: {e}"),
            Self::InvalidFileId(id) => write!(f, "invalid file id {id}"),
            Self::Crypto(e) => write!(f, "crypto: {e}"),
            Self::CertParse => write!(f, "certificate parse failed"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::InvalidKey(key) => write!(f, "config key 0x{key:06X} outside reserved range"),
            Self::BufferTooSmall => write!(f, "output buffer too small"),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Not enough bytes left in the frame for the next field.
    Exhausted,
    /// Field tag differs from the type the caller asked for.
    TypeMismatch { expected: u8, found: u8 },
    /// String field is not valid UTF-8.
    InvalidUtf8,
    /// Declared length exceeds the caller's maximum.
    TooLarge,
    /// Declared length exceeds the bytes remaining in the frame.
    Truncated,
    /// Frame buffer has zero capacity.
    ZeroCapacity,
    /// No room left for tag + payload.
    NoRoom,
}

impl CodecError {
    pub const fn code(self) -> i32 {
        match self {
            Self::Exhausted => -1,
            Self::TypeMismatch { .. } => -2,
            Self::InvalidUtf8 => -3,
            Self::TooLarge => -4,
            Self::Truncated => -5,
            Self::ZeroCapacity => -6,
            Self::NoRoom => -7,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "frame exhausted"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch (expected 0x{expected:02X}, found 0x{found:02X})")
            }
            Self::InvalidUtf8 => write!(f, "string is not UTF-8"),
            Self::TooLarge => write!(f, "declared length exceeds buffer"),
            Self::Truncated => write!(f, "declared length exceeds frame"),
            Self::ZeroCapacity => write!(f, "zero-capacity buffer"),
            Self::NoRoom => write!(f, "no room for field"),
        }
    }
}

impl From<CodecError> for ProvisionError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

// ---------------------------------------------------------------------------
// Key store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    GenerateFailed,
    ImportFailed,
    DestroyFailed,
    SignFailed,
    PublicKeyFailed,
    /// The ASN.1 blob holds no raw private key.
    MalformedKey,
    /// No key exists under the requested id.
    NotFound,
}

impl CryptoError {
    pub const fn code(self) -> i32 {
        match self {
            Self::GenerateFailed => -20,
            Self::ImportFailed => -21,
            Self::DestroyFailed => -22,
            Self::SignFailed => -23,
            Self::PublicKeyFailed => -24,
            Self::MalformedKey => -25,
            Self::NotFound => -26,
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GenerateFailed => write!(f, "key generation failed"),
            Self::ImportFailed => write!(f, "key import failed"),
            Self::DestroyFailed => write!(f, "key destroy failed"),
            Self::SignFailed => write!(f, "signing failed"),
            Self::PublicKeyFailed => write!(f, "public key export failed"),
            Self::MalformedKey => write!(f, "no private key in ASN.1 blob"),
            Self::NotFound => write!(f, "key not found"),
        }
    }
}

impl From<CryptoError> for ProvisionError {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors (config store + flash)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage is full (a repack may help).
    Full,
    /// Generic read/write/erase failure.
    IoError,
    /// Stored object has an unexpected width or type.
    Corrupted,
    /// Flash address outside the device.
    OutOfBounds,
}

impl StorageError {
    pub const fn code(self) -> i32 {
        match self {
            Self::NotFound => -40,
            Self::Full => -41,
            Self::IoError => -42,
            Self::Corrupted => -43,
            Self::OutOfBounds => -44,
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "stored object corrupted"),
            Self::OutOfBounds => write!(f, "address out of bounds"),
        }
    }
}

impl From<StorageError> for ProvisionError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ProvisionError>;
