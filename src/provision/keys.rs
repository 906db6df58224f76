//! Device key lifecycle.
//!
//! The operational key lives in the [`KeyStore`] under an opaque id that is
//! persisted in the Config Store.  Replacing a key always destroys the old
//! one first; a missing key is not an error at that point.

use log::{info, warn};

use crate::app::ports::{CryptoPort, KeyId, KeyStore, StoragePort, DEVICE_KEY_POLICY};
use crate::error::{CryptoError, ProvisionError, Result};
use crate::provision::config_store::{keys, optional, ConfigStore};
use crate::provision::csr;
use crate::provision::der::{tag, DerReader};

/// Size of a raw P-256 private scalar.
pub const PRIVATE_SCALAR_LEN: usize = 32;

/// Nesting depth searched for the private scalar (PKCS#8 wraps SEC1).
const MAX_KEY_DEPTH: usize = 4;

#[derive(Debug)]
pub struct KeyManager {
    key_id: KeyId,
}

impl KeyManager {
    /// Load the key id from the Config Store, persisting `default_id` when
    /// none has been stored yet.
    pub fn load<S: StoragePort>(store: &mut ConfigStore<S>, default_id: KeyId) -> Result<Self> {
        let key_id = match optional(store.read_u32(keys::CREDS_KEY_ID))? {
            Some(id) => id,
            None => {
                store.write_u32(keys::CREDS_KEY_ID, default_id)?;
                info!("KeyManager: no stored key id, using 0x{:08X}", default_id);
                default_id
            }
        };
        Ok(Self { key_id })
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Adopt `id` as the device key id and persist it.
    pub fn set_key_id<S: StoragePort>(
        &mut self,
        store: &mut ConfigStore<S>,
        id: KeyId,
    ) -> Result<()> {
        store.write_u32(keys::CREDS_KEY_ID, id)?;
        self.key_id = id;
        Ok(())
    }

    fn destroy_existing<K: KeyStore>(&self, keystore: &mut K) -> Result<()> {
        match keystore.destroy(self.key_id) {
            Ok(()) | Err(CryptoError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the key under the current id with a freshly generated pair.
    pub fn generate_key<K: KeyStore>(&mut self, keystore: &mut K) -> Result<()> {
        self.destroy_existing(keystore)?;
        keystore.generate(self.key_id, &DEVICE_KEY_POLICY)?;
        info!("KeyManager: generated key 0x{:08X}", self.key_id);
        Ok(())
    }

    /// Replace the key under the current id with the private scalar found
    /// in a DER-encoded SEC1 or PKCS#8 blob.
    pub fn import_key<K: KeyStore>(&mut self, keystore: &mut K, asn1: &[u8]) -> Result<()> {
        let scalar = find_private_scalar(asn1).ok_or(CryptoError::MalformedKey)?;
        self.destroy_existing(keystore)?;
        keystore.import(self.key_id, &DEVICE_KEY_POLICY, scalar)?;
        info!("KeyManager: imported key 0x{:08X}", self.key_id);
        Ok(())
    }

    /// Build a PEM CSR signed by the current key.  Returns the PEM length.
    pub fn generate_csr<K: KeyStore, C: CryptoPort>(
        &self,
        keystore: &mut K,
        crypto: &C,
        subject: &csr::Subject<'_>,
        out: &mut [u8],
    ) -> Result<usize> {
        csr::generate(keystore, crypto, self.key_id, subject, out)
    }
}

/// Copy the certificate serial number into `out`, truncating to its length.
pub fn parse_certificate<C: CryptoPort>(crypto: &C, der: &[u8], out: &mut [u8]) -> Result<usize> {
    if out.is_empty() {
        return Err(ProvisionError::BufferTooSmall);
    }
    let info = crypto.parse_x509(der).ok_or(ProvisionError::CertParse)?;
    let n = out.len().min(info.serial.len());
    out[..n].copy_from_slice(&info.serial[..n]);
    if n < info.serial.len() {
        warn!("KeyManager: serial truncated to {} of {} bytes", n, info.serial.len());
    }
    Ok(n)
}

/// First OCTET STRING of exactly [`PRIVATE_SCALAR_LEN`] bytes, searching
/// constructed elements and OCTET STRINGs that wrap further DER.
pub fn find_private_scalar(asn1: &[u8]) -> Option<&[u8]> {
    search(asn1, 0)
}

fn search(data: &[u8], depth: usize) -> Option<&[u8]> {
    if depth > MAX_KEY_DEPTH {
        return None;
    }
    for tlv in DerReader::new(data) {
        let tlv = tlv.ok()?;
        if tlv.tag == tag::OCTET_STRING {
            if tlv.value.len() == PRIVATE_SCALAR_LEN {
                return Some(tlv.value);
            }
            if tlv.value.first() == Some(&tag::SEQUENCE) {
                if let Some(found) = search(tlv.value, depth + 1) {
                    return Some(found);
                }
            }
        } else if tlv.is_constructed() {
            if let Some(found) = search(tlv.value, depth + 1) {
                return Some(found);
            }
        }
    }
    None
}
