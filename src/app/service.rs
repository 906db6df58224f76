//! Provisioning session: the hexagonal core.
//!
//! [`ProvisioningSession`] owns every piece of state the command protocol
//! touches: the Config Store, the credential page image, the key manager
//! and the platform capabilities.  It is created once and passed by
//! `&mut` to each command, so there is no global state and no locking.
//!
//! ```text
//!  StoragePort ──▶ ┌──────────────────────────────┐
//!     KeyStore ──▶ │     ProvisioningSession       │ ◀── Command::execute
//!    FlashPort ──▶ │ ConfigStore · KeyManager ·    │
//!   CryptoPort ──▶ │ CredentialPage                │
//!                  └──────────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::{KeyRanges, ProvisionConfig};
use crate::error::{ProvisionError, Result, StorageError};
use crate::provision::config_store::{keys, optional, ConfigStore};
use crate::provision::credentials::{CredentialPage, FileId, Placement};
use crate::provision::csr::{Subject, CSR_MIN_LEN};
use crate::provision::keys::{parse_certificate, KeyManager};
use crate::provision::onboarding::{
    default_discriminator, default_unique_id, DefaultHash, OnboardingInfo, MAX_DISCRIMINATOR,
};

use super::commands::{
    CsrRequest, CsrResponse, DebugInfo, ImportRequest, ImportResponse, SetupRequest,
    SetupResponse, MAX_SERIAL_NUMBER_LEN,
};
use super::ports::{CryptoPort, FlashPort, KeyStore, StoragePort, MAX_SERIAL_LEN};

/// Onboarding payload version written by Setup.
pub const PAYLOAD_VERSION: u8 = 0;

// ───────────────────────────────────────────────────────────────
// ProvisioningSession
// ───────────────────────────────────────────────────────────────

pub struct ProvisioningSession<S, K, F, C>
where
    S: StoragePort,
    K: KeyStore,
    F: FlashPort,
    C: CryptoPort,
{
    store: ConfigStore<S>,
    keys: KeyManager,
    page: CredentialPage,
    keystore: K,
    flash: F,
    crypto: C,
    config: ProvisionConfig,
}

impl<S, K, F, C> ProvisioningSession<S, K, F, C>
where
    S: StoragePort,
    K: KeyStore,
    F: FlashPort,
    C: CryptoPort,
{
    /// Open a session, using the persisted [`ProvisionConfig`] if there is a
    /// valid one and the compile-time defaults otherwise.
    pub fn new(backend: S, keystore: K, flash: F, crypto: C) -> Result<Self> {
        let store = ConfigStore::new(backend, KeyRanges::default());
        let config = match ProvisionConfig::load(&store) {
            Ok(Some(cfg)) => match cfg.validate() {
                Ok(()) => {
                    info!("ProvisioningSession: loaded stored config");
                    cfg
                }
                Err(reason) => {
                    warn!(
                        "ProvisioningSession: stored config rejected ({}), using defaults",
                        reason
                    );
                    ProvisionConfig::default()
                }
            },
            Ok(None) => ProvisionConfig::default(),
            Err(e) => {
                warn!("ProvisioningSession: stored config unreadable ({}), using defaults", e);
                ProvisionConfig::default()
            }
        };
        Self::open(store, keystore, flash, crypto, config)
    }

    /// Open a session with an explicit configuration and persist it, so a
    /// later [`new`](Self::new) on the same store picks it up.
    pub fn with_config(
        backend: S,
        keystore: K,
        flash: F,
        crypto: C,
        config: ProvisionConfig,
    ) -> Result<Self> {
        if let Err(reason) = config.validate() {
            warn!("ProvisioningSession: invalid config: {}", reason);
            return Err(ProvisionError::Storage(StorageError::Corrupted));
        }
        let mut store = ConfigStore::new(backend, config.key_ranges);
        config.store(&mut store)?;
        Self::open(store, keystore, flash, crypto, config)
    }

    /// Open a session from a factory station's JSON profile.
    pub fn from_profile(backend: S, keystore: K, flash: F, crypto: C, json: &str) -> Result<Self> {
        let config = ProvisionConfig::from_json(json).map_err(|reason| {
            warn!("ProvisioningSession: profile rejected: {}", reason);
            ProvisionError::Storage(StorageError::Corrupted)
        })?;
        Self::with_config(backend, keystore, flash, crypto, config)
    }

    fn open(
        mut store: ConfigStore<S>,
        keystore: K,
        flash: F,
        crypto: C,
        config: ProvisionConfig,
    ) -> Result<Self> {
        store.set_ranges(config.key_ranges);
        let keys = KeyManager::load(&mut store, config.default_key_id)?;
        let page = CredentialPage::new(config.credentials_address);
        info!(
            "ProvisioningSession: key 0x{:08X}, credential page 0x{:08X}",
            keys.key_id(),
            page.address()
        );
        Ok(Self {
            store,
            keys,
            page,
            keystore,
            flash,
            crypto,
            config,
        })
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore<S> {
        &mut self.store
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.keys
    }

    pub fn page(&self) -> &CredentialPage {
        &self.page
    }

    pub fn keystore(&self) -> &K {
        &self.keystore
    }

    pub fn keystore_mut(&mut self) -> &mut K {
        &mut self.keystore
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn crypto(&self) -> &C {
        &self.crypto
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Repack the object store if it reports enough obsolete space.
    pub fn maintain(&mut self) -> Result<bool> {
        self.store.repack_if_due()
    }

    // ── Operations ────────────────────────────────────────────

    /// Snapshot of the provisioned identity; absent entries read as 0.
    pub fn debug_info(&self) -> Result<DebugInfo> {
        let s = &self.store;
        Ok(DebugInfo {
            vendor_id: optional(s.read_u16(keys::VENDOR_ID))?.unwrap_or(0),
            product_id: optional(s.read_u16(keys::PRODUCT_ID))?.unwrap_or(0),
            discriminator: optional(s.read_u16(keys::SETUP_DISCRIMINATOR))?.unwrap_or(0),
            key_id: self.keys.key_id(),
            page_address: optional(s.read_u32(keys::CREDS_BASE_ADDR))?.unwrap_or(0),
            dac_size: optional(s.read_u32(keys::DAC_SIZE))?.unwrap_or(0),
            pai_size: optional(s.read_u32(keys::PAI_SIZE))?.unwrap_or(0),
            cd_size: optional(s.read_u32(keys::CD_SIZE))?.unwrap_or(0),
        })
    }

    /// Generate (key id 0) or adopt a key, then build its CSR.
    pub fn csr(&mut self, req: &CsrRequest) -> Result<CsrResponse> {
        if req.key_id == 0 {
            self.keys.generate_key(&mut self.keystore)?;
        } else {
            self.keys.set_key_id(&mut self.store, req.key_id)?;
        }

        let subject = Subject {
            common_name: &req.common_name,
            vendor_id: req.vendor_id,
            product_id: req.product_id,
        };
        let mut pem = [0u8; CSR_MIN_LEN];
        let n = self
            .keys
            .generate_csr(&mut self.keystore, &self.crypto, &subject, &mut pem)?;

        let mut csr = heapless::Vec::new();
        csr.extend_from_slice(&pem[..n])
            .map_err(|_| ProvisionError::BufferTooSmall)?;
        Ok(CsrResponse {
            key_id: self.keys.key_id(),
            csr,
        })
    }

    /// Import a key or stage a certificate file, optionally committing the
    /// credential page.  Keys go straight to the key store; the flash flag
    /// is ignored for them and the page is left alone.
    pub fn import(&mut self, req: &ImportRequest) -> Result<ImportResponse> {
        let file = FileId::try_from(req.file)?;
        let placement = match file {
            FileId::None => return Err(ProvisionError::InvalidFileId(req.file)),
            FileId::Key => {
                if req.key_id != 0 {
                    self.keys.set_key_id(&mut self.store, req.key_id)?;
                }
                self.keys.import_key(&mut self.keystore, &req.data)?;
                return Ok(self.import_response(Placement::default()));
            }
            FileId::Dac => {
                let mut serial = [0u8; MAX_SERIAL_LEN];
                let n = parse_certificate(&self.crypto, &req.data, &mut serial)?;
                let placement = self.page.stage(&mut self.store, file, &req.data)?;
                self.store.write_binary(keys::SERIAL_NUMBER, &serial[..n])?;
                placement
            }
            FileId::Pai | FileId::Cd => self.page.stage(&mut self.store, file, &req.data)?,
        };

        if req.flash {
            self.page.commit(&mut self.flash, &mut self.store)?;
        }

        Ok(self.import_response(placement))
    }

    fn import_response(&self, placement: Placement) -> ImportResponse {
        ImportResponse {
            key_id: self.keys.key_id(),
            page_address: self.page.address(),
            offset: placement.offset,
            size: placement.size,
        }
    }

    /// Persist the factory identity and regenerate the onboarding payload.
    pub fn setup(&mut self, req: &SetupRequest) -> Result<SetupResponse> {
        let store = &mut self.store;
        store.write_u16(keys::VENDOR_ID, req.vendor_id)?;
        store.write_u16(keys::PRODUCT_ID, req.product_id)?;
        store.write_u16(keys::HW_VERSION, req.hw_version)?;
        for (key, text) in [
            (keys::VENDOR_NAME, req.vendor_name.as_str()),
            (keys::PRODUCT_NAME, req.product_name.as_str()),
            (keys::SERIAL_NUMBER, req.serial_number.as_str()),
            (keys::MANUFACTURING_DATE, req.manufacturing_date.as_str()),
        ] {
            if !text.is_empty() {
                store.write_string(key, text)?;
            }
        }
        store.write_u8(keys::COMMISSIONING_FLOW, req.commissioning_flow)?;
        store.write_u8(keys::RENDEZVOUS_FLAGS, req.rendezvous)?;
        store.write_u32(keys::SETUP_PASSCODE, req.passcode)?;
        store.write_u32(keys::SPAKE2P_ITERATIONS, req.spake2p_iterations)?;
        if !req.spake2p_salt.is_empty() {
            store.write_binary(keys::SPAKE2P_SALT, &req.spake2p_salt)?;
        }
        if !req.spake2p_verifier.is_empty() {
            store.write_binary(keys::SPAKE2P_VERIFIER, &req.spake2p_verifier)?;
        }

        // Both defaults share one hash of the stored serial number.
        let mut hash = DefaultHash::new();

        let unique_id = if req.unique_id.is_empty() {
            let digest = hash.get(&self.crypto, || read_serial(&self.store))?;
            heapless::Vec::from_slice(&default_unique_id(&digest))
                .map_err(|_| ProvisionError::BufferTooSmall)?
        } else {
            req.unique_id.clone()
        };
        self.store.write_binary(keys::UNIQUE_ID, &unique_id)?;

        let discriminator = if req.discriminator > MAX_DISCRIMINATOR {
            let digest = hash.get(&self.crypto, || read_serial(&self.store))?;
            default_discriminator(&digest)
        } else {
            req.discriminator
        };
        self.store.write_u16(keys::SETUP_DISCRIMINATOR, discriminator)?;

        let info = OnboardingInfo {
            version: PAYLOAD_VERSION,
            vendor_id: req.vendor_id,
            product_id: req.product_id,
            commissioning_flow: req.commissioning_flow,
            rendezvous: req.rendezvous,
            discriminator,
            passcode: req.passcode,
        };
        let payload = info.pack();
        let qr = info.qr_code().map_err(|_| ProvisionError::BufferTooSmall)?;
        let manual = info.manual_code().map_err(|_| ProvisionError::BufferTooSmall)?;
        self.store.write_binary(keys::SETUP_PAYLOAD, &payload)?;
        let generation = self.store.increment_counter(keys::SETUP_GENERATION)?;

        info!(
            "ProvisioningSession: setup #{} VID {:04X} PID {:04X} disc 0x{:03X} QR {} code {}",
            generation,
            req.vendor_id,
            req.product_id,
            discriminator,
            qr,
            manual
        );

        Ok(SetupResponse {
            passcode: req.passcode,
            discriminator,
            unique_id,
            payload,
        })
    }
}

/// Serial number as stored by Setup or by a DAC import.
fn read_serial<S: StoragePort>(
    store: &ConfigStore<S>,
) -> Result<heapless::Vec<u8, MAX_SERIAL_NUMBER_LEN>> {
    let mut buf = [0u8; MAX_SERIAL_NUMBER_LEN];
    let n = store.read_binary(keys::SERIAL_NUMBER, Some(&mut buf))?;
    heapless::Vec::from_slice(&buf[..n]).map_err(|_| ProvisionError::BufferTooSmall)
}
