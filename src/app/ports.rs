//! Port traits: the boundary between the provisioning core and the
//! platform collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ProvisioningSession (domain)
//! ```
//!
//! The core never touches a peripheral directly: key material lives behind
//! [`KeyStore`], credential pages behind [`FlashPort`], persisted settings
//! behind [`StoragePort`], and hashing / certificate parsing behind
//! [`CryptoPort`].  Hardware-backed and software-only implementations are
//! interchangeable.
//!
//! ## Security notes
//!
//! - **KeyStore** implementations MUST keep private keys non-exportable.
//! - **FlashPort** calls block until the operation completes; there is no
//!   timeout.  Callers own the flash exclusively while a call is running.
//! - All port errors are typed; callers must handle every variant.

use crate::error::{CryptoError, StorageError};

// ───────────────────────────────────────────────────────────────
// Key store
// ───────────────────────────────────────────────────────────────

/// Opaque key identifier understood by the key store.
pub type KeyId = u32;

/// Uncompressed SEC1 P-256 public point (`04 || X || Y`).
pub type PublicKey = [u8; 65];

/// Raw `r || s` ECDSA P-256 signature.
pub type RawSignature = [u8; 64];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// ECDSA over secp256r1.
    EcdsaP256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLifetime {
    Volatile,
    Persistent,
}

/// Usage flags granted to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub u32);

impl KeyUsage {
    pub const SIGN_HASH: Self = Self(0x0000_1000);
    pub const VERIFY_HASH: Self = Self(0x0000_2000);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Attributes requested when a key is created or imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPolicy {
    pub algorithm: KeyAlgorithm,
    pub bits: u16,
    pub lifetime: KeyLifetime,
    pub usage: KeyUsage,
}

/// Policy used for the device operational key.
pub const DEVICE_KEY_POLICY: KeyPolicy = KeyPolicy {
    algorithm: KeyAlgorithm::EcdsaP256,
    bits: 256,
    lifetime: KeyLifetime::Persistent,
    usage: KeyUsage::SIGN_HASH.union(KeyUsage::VERIFY_HASH),
};

/// Asymmetric key lifecycle, possibly backed by a secure element.
pub trait KeyStore {
    /// Create a fresh key pair under `id`.
    fn generate(&mut self, id: KeyId, policy: &KeyPolicy) -> Result<(), CryptoError>;

    /// Import a raw private scalar under `id`.
    fn import(&mut self, id: KeyId, policy: &KeyPolicy, raw: &[u8]) -> Result<(), CryptoError>;

    /// Destroy the key under `id`.  Returns [`CryptoError::NotFound`] if
    /// there is none.
    fn destroy(&mut self, id: KeyId) -> Result<(), CryptoError>;

    /// Export the public half of the key under `id`.
    fn export_public(&self, id: KeyId) -> Result<PublicKey, CryptoError>;

    /// Sign a SHA-256 digest with the key under `id`.
    fn sign_hash(&mut self, id: KeyId, digest: &[u8; 32]) -> Result<RawSignature, CryptoError>;
}

// ───────────────────────────────────────────────────────────────
// Flash
// ───────────────────────────────────────────────────────────────

/// Page-erasable flash.  Every call blocks until completion.
pub trait FlashPort {
    /// Size of one erase page in bytes.
    fn page_size(&self) -> usize;

    /// Erase the page starting at `address`.
    fn erase_page(&mut self, address: u32) -> Result<(), StorageError>;

    /// Program `data` at `address` (which must have been erased).
    fn program(&mut self, address: u32, data: &[u8]) -> Result<(), StorageError>;

    /// Read back `buf.len()` bytes from `address`.
    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Hash / certificate capability
// ───────────────────────────────────────────────────────────────

/// Maximum X.509 serial number length (RFC 5280 caps it at 20 octets;
/// one extra for a sign byte).
pub const MAX_SERIAL_LEN: usize = 21;

/// Fields extracted from an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Raw content octets of the serialNumber INTEGER.
    pub serial: heapless::Vec<u8, MAX_SERIAL_LEN>,
}

pub trait CryptoPort {
    fn sha256(&self, data: &[u8]) -> [u8; 32];

    /// Parse a DER certificate.  `None` if it is malformed.
    fn parse_x509(&self, der: &[u8]) -> Option<CertificateInfo>;
}

// ───────────────────────────────────────────────────────────────
// Object store (backend of the Config Store)
// ───────────────────────────────────────────────────────────────

/// Flash-backed object store addressed by numeric keys.
///
/// Data objects and counters are distinct kinds; reading one as the other
/// fails with [`StorageError::Corrupted`].  Writes are atomic per object.
pub trait StoragePort {
    /// Length of the data object under `key`.
    fn object_len(&self, key: u32) -> Result<usize, StorageError>;

    /// Copy the data object into `buf`, which must hold it entirely.
    /// Returns the number of bytes copied.
    fn read(&self, key: u32, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, key: u32, data: &[u8]) -> Result<(), StorageError>;

    /// Delete an object.  `Ok(())` even if the key didn't exist.
    fn delete(&mut self, key: u32) -> Result<(), StorageError>;

    fn read_counter(&self, key: u32) -> Result<u32, StorageError>;

    fn write_counter(&mut self, key: u32, value: u32) -> Result<(), StorageError>;

    /// True once enough obsolete space has accumulated to make a repack
    /// worthwhile.
    fn repack_due(&self) -> bool;

    /// Reclaim space held by obsolete object versions.
    fn repack(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink
// ───────────────────────────────────────────────────────────────

/// The dispatcher emits one [`ProvisionEvent`](super::events::ProvisionEvent)
/// per handled frame through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::ProvisionEvent);
}
