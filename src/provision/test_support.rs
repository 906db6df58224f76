//! In-crate key store double for unit tests.

use std::collections::BTreeMap;

use crate::app::ports::{KeyId, KeyPolicy, KeyStore, PublicKey, RawSignature};
use crate::error::CryptoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Generate(KeyId),
    Import(KeyId),
    Destroy(KeyId),
    Sign(KeyId),
}

/// Deterministic fake: the "public key" is `04 || scalar || !scalar` and a
/// signature is `digest || scalar`.
#[derive(Debug, Default)]
pub struct FakeKeyStore {
    keys: BTreeMap<KeyId, [u8; 32]>,
    next_seed: u8,
    pub ops: Vec<Op>,
    pub fail_generate: bool,
}

impl FakeKeyStore {
    pub fn has(&self, id: KeyId) -> bool {
        self.keys.contains_key(&id)
    }

    pub fn scalar(&self, id: KeyId) -> Option<[u8; 32]> {
        self.keys.get(&id).copied()
    }
}

impl KeyStore for FakeKeyStore {
    fn generate(&mut self, id: KeyId, _policy: &KeyPolicy) -> Result<(), CryptoError> {
        self.ops.push(Op::Generate(id));
        if self.fail_generate {
            return Err(CryptoError::GenerateFailed);
        }
        self.next_seed = self.next_seed.wrapping_add(1);
        self.keys.insert(id, [self.next_seed; 32]);
        Ok(())
    }

    fn import(&mut self, id: KeyId, _policy: &KeyPolicy, raw: &[u8]) -> Result<(), CryptoError> {
        self.ops.push(Op::Import(id));
        let scalar: [u8; 32] = raw.try_into().map_err(|_| CryptoError::ImportFailed)?;
        self.keys.insert(id, scalar);
        Ok(())
    }

    fn destroy(&mut self, id: KeyId) -> Result<(), CryptoError> {
        self.ops.push(Op::Destroy(id));
        self.keys.remove(&id).map(|_| ()).ok_or(CryptoError::NotFound)
    }

    fn export_public(&self, id: KeyId) -> Result<PublicKey, CryptoError> {
        let scalar = self.keys.get(&id).ok_or(CryptoError::PublicKeyFailed)?;
        let mut pk = [0u8; 65];
        pk[0] = 0x04;
        pk[1..33].copy_from_slice(scalar);
        for (dst, src) in pk[33..].iter_mut().zip(scalar) {
            *dst = !src;
        }
        Ok(pk)
    }

    fn sign_hash(&mut self, id: KeyId, digest: &[u8; 32]) -> Result<RawSignature, CryptoError> {
        self.ops.push(Op::Sign(id));
        let scalar = self.keys.get(&id).ok_or(CryptoError::SignFailed)?;
        let mut sig = [0u8; 64];
        sig[..32].copy_from_slice(digest);
        sig[32..].copy_from_slice(scalar);
        Ok(sig)
    }
}
