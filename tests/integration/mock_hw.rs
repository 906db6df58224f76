//! Mock platform adapters for integration tests.
//!
//! Records every key store call, counts hashes and captures events so tests
//! can assert on side effects without a secure element or real flash.

use std::cell::Cell;
use std::collections::{BTreeMap, VecDeque};

use factory_provision::adapters::crypto::SoftCrypto;
use factory_provision::adapters::flash::SimFlash;
use factory_provision::adapters::nvs::NvsAdapter;
use factory_provision::app::events::ProvisionEvent;
use factory_provision::app::ports::{
    CertificateInfo, CryptoPort, EventSink, KeyId, KeyPolicy, KeyStore, PublicKey, RawSignature,
};
use factory_provision::app::service::ProvisioningSession;
use factory_provision::error::CryptoError;
use factory_provision::rpc::codec::Frame;
use factory_provision::rpc::transport::Transport;

pub const PAGE_BASE: u32 = 0x000F_E000;

// ── Key store call record ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum KeyCall {
    Generate(KeyId),
    Import { id: KeyId, scalar: Vec<u8> },
    Destroy(KeyId),
    Sign(KeyId),
}

// ── MockKeyStore ──────────────────────────────────────────────

/// Software stand-in for a secure element.  Public keys and signatures
/// are derived from the stored scalar so tests can tell keys apart.
#[derive(Default)]
pub struct MockKeyStore {
    pub calls: Vec<KeyCall>,
    keys: BTreeMap<KeyId, [u8; 32]>,
    generated: u8,
}

#[allow(dead_code)]
impl MockKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holds(&self, id: KeyId) -> bool {
        self.keys.contains_key(&id)
    }

    pub fn scalar(&self, id: KeyId) -> Option<[u8; 32]> {
        self.keys.get(&id).copied()
    }
}

impl KeyStore for MockKeyStore {
    fn generate(&mut self, id: KeyId, _policy: &KeyPolicy) -> Result<(), CryptoError> {
        self.calls.push(KeyCall::Generate(id));
        self.generated = self.generated.wrapping_add(1);
        self.keys.insert(id, [self.generated; 32]);
        Ok(())
    }

    fn import(&mut self, id: KeyId, _policy: &KeyPolicy, raw: &[u8]) -> Result<(), CryptoError> {
        self.calls.push(KeyCall::Import {
            id,
            scalar: raw.to_vec(),
        });
        let scalar: [u8; 32] = raw.try_into().map_err(|_| CryptoError::ImportFailed)?;
        self.keys.insert(id, scalar);
        Ok(())
    }

    fn destroy(&mut self, id: KeyId) -> Result<(), CryptoError> {
        self.calls.push(KeyCall::Destroy(id));
        self.keys.remove(&id).map(|_| ()).ok_or(CryptoError::NotFound)
    }

    fn export_public(&self, id: KeyId) -> Result<PublicKey, CryptoError> {
        let scalar = self.keys.get(&id).ok_or(CryptoError::PublicKeyFailed)?;
        let mut pk = [0u8; 65];
        pk[0] = 0x04;
        pk[1..33].copy_from_slice(scalar);
        pk[33..].copy_from_slice(scalar);
        Ok(pk)
    }

    fn sign_hash(&mut self, id: KeyId, digest: &[u8; 32]) -> Result<RawSignature, CryptoError> {
        self.calls.push(KeyCall::Sign(id));
        let scalar = self.keys.get(&id).ok_or(CryptoError::SignFailed)?;
        let mut sig = [0u8; 64];
        sig[..32].copy_from_slice(digest);
        sig[32..].copy_from_slice(scalar);
        Ok(sig)
    }
}

// ── CountingCrypto ────────────────────────────────────────────

/// [`SoftCrypto`] that counts SHA-256 invocations.
#[derive(Default)]
pub struct CountingCrypto {
    inner: SoftCrypto,
    hashes: Cell<u32>,
}

impl CountingCrypto {
    pub fn hashes(&self) -> u32 {
        self.hashes.get()
    }
}

impl CryptoPort for CountingCrypto {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        self.hashes.set(self.hashes.get() + 1);
        self.inner.sha256(data)
    }

    fn parse_x509(&self, der: &[u8]) -> Option<CertificateInfo> {
        self.inner.parse_x509(der)
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<ProvisionEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &ProvisionEvent) {
        self.events.push(*event);
    }
}

// ── LoopbackTransport ─────────────────────────────────────────

/// Queue-backed transport: tests push requests and pop responses.
#[derive(Default)]
pub struct LoopbackTransport {
    pub inbound: VecDeque<Vec<u8>>,
    pub outbound: Vec<Vec<u8>>,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl LoopbackTransport {
    pub fn push(&mut self, frame: &[u8]) {
        self.inbound.push_back(frame.to_vec());
    }
}

impl Transport for LoopbackTransport {
    type Error = &'static str;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some(frame) = self.inbound.pop_front() else {
            return Ok(0);
        };
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes {
            return Err("link down");
        }
        self.outbound.push(data.to_vec());
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn available(&self) -> bool {
        !self.inbound.is_empty()
    }
}

// ── Helpers ───────────────────────────────────────────────────

pub type MockSession = ProvisioningSession<NvsAdapter, MockKeyStore, SimFlash, CountingCrypto>;

pub fn session() -> MockSession {
    session_with(NvsAdapter::new())
}

pub fn session_with(backend: NvsAdapter) -> MockSession {
    ProvisioningSession::new(
        backend,
        MockKeyStore::new(),
        SimFlash::new(PAGE_BASE, 1),
        CountingCrypto::default(),
    )
    .unwrap()
}

/// Start a request frame for `command`.
pub fn request(command: u8) -> Frame {
    let mut f = Frame::new();
    f.add_header(command).unwrap();
    f
}

/// Open a response, check its command byte and return it positioned at
/// the first result field together with the status code.
pub fn open_response(bytes: &[u8], command: u8) -> (Frame, i32) {
    let mut f: Frame = Frame::from_bytes(bytes).unwrap();
    assert_eq!(f.get_header().unwrap(), command);
    let code = f.get_i32().unwrap();
    (f, code)
}

pub const DAC_DER: &[u8] = include_bytes!("../fixtures/dac.der");
pub const DEVICE_KEY_DER: &[u8] = include_bytes!("../fixtures/device_key.der");
