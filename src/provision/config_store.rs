//! Config Store: typed, range-checked accessor over the object store.
//!
//! Keys are small integers inside a namespace shared with the rest of the
//! firmware.  A key is only honoured when it lies in **both** the protocol
//! range and the factory/runtime sub-range ([`KeyRanges`]); anything else
//! fails with [`ProvisionError::InvalidKey`] before the backend is touched.
//!
//! Integers are stored little-endian at their natural width, booleans and
//! bytes as a single byte, strings as raw UTF-8 without terminator.

use crate::app::ports::StoragePort;
use crate::config::KeyRanges;
use crate::error::{ProvisionError, Result, StorageError};

/// Config key assignments.
pub mod keys {
    pub const FACTORY_BASE: u32 = 0x08_7200;
    pub const RUNTIME_BASE: u32 = 0x08_7300;
    pub const COUNTER_BASE: u32 = 0x08_7400;

    // Factory identity
    pub const SERIAL_NUMBER: u32 = FACTORY_BASE;
    pub const MANUFACTURING_DATE: u32 = FACTORY_BASE + 0x01;
    pub const VENDOR_ID: u32 = FACTORY_BASE + 0x02;
    pub const VENDOR_NAME: u32 = FACTORY_BASE + 0x03;
    pub const PRODUCT_ID: u32 = FACTORY_BASE + 0x04;
    pub const PRODUCT_NAME: u32 = FACTORY_BASE + 0x05;
    pub const HW_VERSION: u32 = FACTORY_BASE + 0x06;
    pub const UNIQUE_ID: u32 = FACTORY_BASE + 0x07;

    // Onboarding
    pub const SETUP_DISCRIMINATOR: u32 = FACTORY_BASE + 0x08;
    pub const SETUP_PASSCODE: u32 = FACTORY_BASE + 0x09;
    pub const COMMISSIONING_FLOW: u32 = FACTORY_BASE + 0x0A;
    pub const RENDEZVOUS_FLAGS: u32 = FACTORY_BASE + 0x0B;
    pub const SPAKE2P_ITERATIONS: u32 = FACTORY_BASE + 0x0C;
    pub const SPAKE2P_SALT: u32 = FACTORY_BASE + 0x0D;
    pub const SPAKE2P_VERIFIER: u32 = FACTORY_BASE + 0x0E;
    pub const SETUP_PAYLOAD: u32 = FACTORY_BASE + 0x0F;

    // Credentials
    pub const CREDS_KEY_ID: u32 = FACTORY_BASE + 0x10;
    pub const CREDS_BASE_ADDR: u32 = FACTORY_BASE + 0x11;
    pub const DAC_OFFSET: u32 = FACTORY_BASE + 0x12;
    pub const DAC_SIZE: u32 = FACTORY_BASE + 0x13;
    pub const PAI_OFFSET: u32 = FACTORY_BASE + 0x14;
    pub const PAI_SIZE: u32 = FACTORY_BASE + 0x15;
    pub const CD_OFFSET: u32 = FACTORY_BASE + 0x16;
    pub const CD_SIZE: u32 = FACTORY_BASE + 0x17;

    // Runtime
    pub const PROVISION_CONFIG: u32 = RUNTIME_BASE;

    // Counter indices (relative to COUNTER_BASE)
    pub const SETUP_GENERATION: u8 = 0;
}

pub struct ConfigStore<S: StoragePort> {
    backend: S,
    ranges: KeyRanges,
}

impl<S: StoragePort> ConfigStore<S> {
    pub fn new(backend: S, ranges: KeyRanges) -> Self {
        Self { backend, ranges }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn ranges(&self) -> &KeyRanges {
        &self.ranges
    }

    pub fn set_ranges(&mut self, ranges: KeyRanges) {
        self.ranges = ranges;
    }

    /// True only if `key` is inside both the protocol range and the
    /// factory/runtime sub-range.
    pub fn is_valid(&self, key: u32) -> bool {
        self.ranges.protocol.contains(key) && self.ranges.allowed.contains(key)
    }

    fn check(&self, key: u32) -> Result<()> {
        if self.is_valid(key) {
            Ok(())
        } else {
            Err(ProvisionError::InvalidKey(key))
        }
    }

    /// Presence check that does not consume data.
    pub fn exists(&self, key: u32) -> bool {
        self.is_valid(key) && self.backend.object_len(key).is_ok()
    }

    /// Stored length of the object under `key`.
    pub fn length(&self, key: u32) -> Result<usize> {
        self.check(key)?;
        Ok(self.backend.object_len(key)?)
    }

    pub fn delete(&mut self, key: u32) -> Result<()> {
        self.check(key)?;
        Ok(self.backend.delete(key)?)
    }

    // ── Fixed-width values ────────────────────────────────────

    fn read_fixed<const W: usize>(&self, key: u32) -> Result<[u8; W]> {
        self.check(key)?;
        if self.backend.object_len(key)? != W {
            return Err(StorageError::Corrupted.into());
        }
        let mut raw = [0u8; W];
        self.backend.read(key, &mut raw)?;
        Ok(raw)
    }

    fn write_raw(&mut self, key: u32, data: &[u8]) -> Result<()> {
        self.check(key)?;
        Ok(self.backend.write(key, data)?)
    }

    pub fn read_bool(&self, key: u32) -> Result<bool> {
        self.read_fixed::<1>(key).map(|b| b[0] != 0)
    }

    pub fn write_bool(&mut self, key: u32, value: bool) -> Result<()> {
        self.write_raw(key, &[u8::from(value)])
    }

    pub fn read_u8(&self, key: u32) -> Result<u8> {
        self.read_fixed::<1>(key).map(|b| b[0])
    }

    pub fn write_u8(&mut self, key: u32, value: u8) -> Result<()> {
        self.write_raw(key, &[value])
    }

    pub fn read_u16(&self, key: u32) -> Result<u16> {
        self.read_fixed(key).map(u16::from_le_bytes)
    }

    pub fn write_u16(&mut self, key: u32, value: u16) -> Result<()> {
        self.write_raw(key, &value.to_le_bytes())
    }

    pub fn read_u32(&self, key: u32) -> Result<u32> {
        self.read_fixed(key).map(u32::from_le_bytes)
    }

    pub fn write_u32(&mut self, key: u32, value: u32) -> Result<()> {
        self.write_raw(key, &value.to_le_bytes())
    }

    pub fn read_u64(&self, key: u32) -> Result<u64> {
        self.read_fixed(key).map(u64::from_le_bytes)
    }

    pub fn write_u64(&mut self, key: u32, value: u64) -> Result<()> {
        self.write_raw(key, &value.to_le_bytes())
    }

    // ── Variable-length values (two-phase reads) ──────────────

    /// Read a string.  With `out == None` only the stored length is
    /// returned; otherwise `out` must hold the whole string or the call
    /// fails with [`ProvisionError::BufferTooSmall`] and copies nothing.
    /// A stored value that is not UTF-8 fails with `Corrupted` and leaves
    /// the copied prefix of `out` zeroed.
    pub fn read_string(&self, key: u32, out: Option<&mut [u8]>) -> Result<usize> {
        match out {
            None => self.read_blob(key, None),
            Some(buf) => {
                let len = self.read_blob(key, Some(&mut *buf))?;
                if core::str::from_utf8(&buf[..len]).is_err() {
                    buf[..len].fill(0);
                    return Err(StorageError::Corrupted.into());
                }
                Ok(len)
            }
        }
    }

    pub fn write_string(&mut self, key: u32, value: &str) -> Result<()> {
        self.write_raw(key, value.as_bytes())
    }

    /// Two-phase binary read; same contract as [`read_string`](Self::read_string).
    pub fn read_binary(&self, key: u32, out: Option<&mut [u8]>) -> Result<usize> {
        self.read_blob(key, out)
    }

    pub fn write_binary(&mut self, key: u32, data: &[u8]) -> Result<()> {
        self.write_raw(key, data)
    }

    fn read_blob(&self, key: u32, out: Option<&mut [u8]>) -> Result<usize> {
        self.check(key)?;
        let len = self.backend.object_len(key)?;
        let Some(out) = out else {
            return Ok(len);
        };
        if out.len() < len {
            return Err(ProvisionError::BufferTooSmall);
        }
        self.backend.read(key, &mut out[..len])?;
        Ok(len)
    }

    // ── Counters ──────────────────────────────────────────────

    fn counter_key(&self, index: u8) -> Result<u32> {
        let key = keys::COUNTER_BASE + u32::from(index);
        self.check(key)?;
        Ok(key)
    }

    pub fn read_counter(&self, index: u8) -> Result<u32> {
        let key = self.counter_key(index)?;
        Ok(self.backend.read_counter(key)?)
    }

    pub fn write_counter(&mut self, index: u8, value: u32) -> Result<()> {
        let key = self.counter_key(index)?;
        Ok(self.backend.write_counter(key, value)?)
    }

    /// Add one to a counter, starting from zero if it was never written.
    pub fn increment_counter(&mut self, index: u8) -> Result<u32> {
        let current = match self.read_counter(index) {
            Ok(v) => v,
            Err(ProvisionError::Storage(StorageError::NotFound)) => 0,
            Err(e) => return Err(e),
        };
        let next = current.wrapping_add(1);
        self.write_counter(index, next)?;
        Ok(next)
    }

    // ── Maintenance ───────────────────────────────────────────

    pub fn repack(&mut self) -> Result<()> {
        Ok(self.backend.repack()?)
    }

    /// Repack only if the backend says it is worthwhile.  Meant for idle
    /// periods between frames, never for the write path.
    pub fn repack_if_due(&mut self) -> Result<bool> {
        if !self.backend.repack_due() {
            return Ok(false);
        }
        self.repack()?;
        Ok(true)
    }
}

/// Read a value that may legitimately be absent.
pub fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(ProvisionError::Storage(StorageError::NotFound)) => Ok(None),
        Err(e) => Err(e),
    }
}
