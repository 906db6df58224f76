//! Provisioning configuration parameters
//!
//! Compile-time defaults for the provisioning core.  A stored copy (postcard
//! blob in the runtime Config sub-range) overrides them at startup.

use serde::{Deserialize, Serialize};

use crate::app::ports::StoragePort;
use crate::error::{Result, StorageError};
use crate::provision::config_store::{keys, optional, ConfigStore};

/// Upper bound on the encoded configuration blob.
const MAX_CONFIG_BLOB: usize = 64;

/// Inclusive key range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    pub lo: u32,
    pub hi: u32,
}

impl KeyRange {
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    pub const fn contains(&self, key: u32) -> bool {
        key >= self.lo && key <= self.hi
    }
}

/// The two ranges every Config key must fall inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRanges {
    /// Range reserved for this protocol in the shared object store.
    pub protocol: KeyRange,
    /// Factory + runtime + counter sub-range actually handed out.
    pub allowed: KeyRange,
}

impl Default for KeyRanges {
    fn default() -> Self {
        Self {
            protocol: KeyRange::new(0x08_7200, 0x08_7FFF),
            allowed: KeyRange::new(0x08_7200, 0x08_74FF),
        }
    }
}

/// Core provisioning configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Key id used for the operational key when none is stored.
    pub default_key_id: u32,
    /// Flash address of the credential page.
    pub credentials_address: u32,
    /// Config key validation ranges.
    pub key_ranges: KeyRanges,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            default_key_id: 0x0000_4D31,
            credentials_address: 0x000F_E000,
            key_ranges: KeyRanges::default(),
        }
    }
}

impl ProvisionConfig {
    /// Reject configurations the core cannot operate with.
    pub fn validate(&self) -> core::result::Result<(), &'static str> {
        if self.default_key_id == 0 {
            return Err("default_key_id must be non-zero");
        }
        if self.credentials_address % 0x800 != 0 {
            return Err("credentials_address must be page aligned");
        }
        let r = &self.key_ranges;
        if r.protocol.lo > r.protocol.hi || r.allowed.lo > r.allowed.hi {
            return Err("key ranges must be ordered lo <= hi");
        }
        if r.allowed.hi < r.protocol.lo || r.allowed.lo > r.protocol.hi {
            return Err("allowed key range must overlap the protocol range");
        }
        Ok(())
    }

    /// Parse and validate a JSON override, as shipped with a factory
    /// station profile.
    pub fn from_json(text: &str) -> core::result::Result<Self, &'static str> {
        let cfg: Self = serde_json::from_str(text).map_err(|_| "malformed config JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read the persisted copy, `None` if none was ever stored.
    pub fn load<S: StoragePort>(store: &ConfigStore<S>) -> Result<Option<Self>> {
        let mut buf = [0u8; MAX_CONFIG_BLOB];
        let Some(len) = optional(store.read_binary(keys::PROVISION_CONFIG, Some(&mut buf)))? else {
            return Ok(None);
        };
        let cfg = postcard::from_bytes(&buf[..len]).map_err(|_| StorageError::Corrupted)?;
        Ok(Some(cfg))
    }

    /// Persist as a postcard blob in the runtime key range.
    pub fn store<S: StoragePort>(&self, store: &mut ConfigStore<S>) -> Result<()> {
        let bytes = postcard::to_allocvec(self).map_err(|_| StorageError::IoError)?;
        store.write_binary(keys::PROVISION_CONFIG, &bytes)
    }
}
