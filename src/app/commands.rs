//! Provisioning command variants.
//!
//! Each variant follows the same three-step life cycle driven by the
//! dispatcher:
//!
//! ```text
//!   decode(frame) ──▶ execute(session) ──▶ encode(frame)
//! ```
//!
//! Unknown and reserved ids map to [`Command::Void`], which decodes and
//! encodes nothing and always succeeds.

use zeroize::Zeroize;

use crate::app::ports::{CryptoPort, FlashPort, KeyStore, StoragePort};
use crate::error::Result;
use crate::provision::csr::{CSR_MIN_LEN, MAX_COMMON_NAME};
use crate::provision::onboarding::PAYLOAD_LEN;
use crate::rpc::codec::Frame;

use super::service::ProvisioningSession;

/// Largest file accepted by Import.
pub const MAX_IMPORT_LEN: usize = 1024;

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_SERIAL_NUMBER_LEN: usize = 32;
pub const MAX_DATE_LEN: usize = 16;
pub const MAX_UNIQUE_ID_LEN: usize = 32;
pub const MAX_SALT_LEN: usize = 64;
pub const MAX_VERIFIER_LEN: usize = 128;

/// Wire command identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    None = 0,
    Debug = 1,
    Csr = 2,
    Import = 3,
    Setup = 4,
    /// Reserved, handled as Void.
    Spake2p = 11,
    /// Reserved, handled as Void.
    Nvm3 = 12,
}

impl CommandId {
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Debug),
            2 => Some(Self::Csr),
            3 => Some(Self::Import),
            4 => Some(Self::Setup),
            11 => Some(Self::Spake2p),
            12 => Some(Self::Nvm3),
            _ => None,
        }
    }
}

// ── Requests / responses ─────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub discriminator: u16,
    pub key_id: u32,
    pub page_address: u32,
    pub dac_size: u32,
    pub pai_size: u32,
    pub cd_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrRequest {
    pub common_name: heapless::String<MAX_COMMON_NAME>,
    pub vendor_id: u16,
    pub product_id: u16,
    /// 0 generates a fresh key; anything else adopts that id.
    pub key_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrResponse {
    pub key_id: u32,
    pub csr: heapless::Vec<u8, CSR_MIN_LEN>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportRequest {
    pub file: u8,
    pub key_id: u32,
    /// Commit the credential page to flash after staging.
    pub flash: bool,
    pub data: heapless::Vec<u8, MAX_IMPORT_LEN>,
}

impl ImportRequest {
    fn wipe(&mut self) {
        self.data.as_mut_slice().zeroize();
        self.data.clear();
    }
}

impl Drop for ImportRequest {
    fn drop(&mut self) {
        self.wipe();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportResponse {
    pub key_id: u32,
    pub page_address: u32,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupRequest {
    pub vendor_id: u16,
    pub vendor_name: heapless::String<MAX_NAME_LEN>,
    pub product_id: u16,
    pub product_name: heapless::String<MAX_NAME_LEN>,
    pub hw_version: u16,
    pub serial_number: heapless::String<MAX_SERIAL_NUMBER_LEN>,
    pub manufacturing_date: heapless::String<MAX_DATE_LEN>,
    /// Empty selects the hash-derived default.
    pub unique_id: heapless::Vec<u8, MAX_UNIQUE_ID_LEN>,
    pub commissioning_flow: u8,
    pub rendezvous: u8,
    /// Values above 12 bits select the hash-derived default.
    pub discriminator: u16,
    pub passcode: u32,
    pub spake2p_iterations: u32,
    pub spake2p_salt: heapless::Vec<u8, MAX_SALT_LEN>,
    pub spake2p_verifier: heapless::Vec<u8, MAX_VERIFIER_LEN>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupResponse {
    pub passcode: u32,
    pub discriminator: u16,
    pub unique_id: heapless::Vec<u8, MAX_UNIQUE_ID_LEN>,
    pub payload: [u8; PAYLOAD_LEN],
}

// ── Command ──────────────────────────────────────────────────

/// One provisioning operation.  Variants carry their decoded request and,
/// once executed successfully, their response.
#[derive(Debug)]
pub enum Command {
    Void,
    Debug(Option<DebugInfo>),
    Csr(CsrRequest, Option<CsrResponse>),
    Import(ImportRequest, Option<ImportResponse>),
    Setup(SetupRequest, Option<SetupResponse>),
}

impl Command {
    /// Empty command for a wire id.  Unknown and reserved ids give Void.
    pub fn for_id(raw: u8) -> Self {
        match CommandId::from_wire(raw) {
            Some(CommandId::Debug) => Self::Debug(None),
            Some(CommandId::Csr) => Self::Csr(CsrRequest::default(), None),
            Some(CommandId::Import) => Self::Import(ImportRequest::default(), None),
            Some(CommandId::Setup) => Self::Setup(SetupRequest::default(), None),
            Some(CommandId::None | CommandId::Spake2p | CommandId::Nvm3) | None => Self::Void,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Void => "Void",
            Self::Debug(_) => "Debug",
            Self::Csr(..) => "Csr",
            Self::Import(..) => "Import",
            Self::Setup(..) => "Setup",
        }
    }

    /// Read the request fields that follow the command byte.
    pub fn decode<const N: usize>(&mut self, frame: &mut Frame<N>) -> Result<()> {
        match self {
            Self::Void | Self::Debug(_) => {}
            Self::Csr(req, _) => {
                req.common_name = frame.get_string()?;
                req.vendor_id = frame.get_u16()?;
                req.product_id = frame.get_u16()?;
                req.key_id = frame.get_u32()?;
            }
            Self::Import(req, _) => {
                req.file = frame.get_u8()?;
                req.key_id = frame.get_u32()?;
                req.flash = frame.get_u8()? != 0;
                req.data = frame.get_vec()?;
            }
            Self::Setup(req, _) => {
                req.vendor_id = frame.get_u16()?;
                req.vendor_name = frame.get_string()?;
                req.product_id = frame.get_u16()?;
                req.product_name = frame.get_string()?;
                req.hw_version = frame.get_u16()?;
                req.serial_number = frame.get_string()?;
                req.manufacturing_date = frame.get_string()?;
                req.unique_id = frame.get_vec()?;
                req.commissioning_flow = frame.get_u8()?;
                req.rendezvous = frame.get_u8()?;
                req.discriminator = frame.get_u16()?;
                req.passcode = frame.get_u32()?;
                req.spake2p_iterations = frame.get_u32()?;
                req.spake2p_salt = frame.get_vec()?;
                req.spake2p_verifier = frame.get_vec()?;
            }
        }
        Ok(())
    }

    /// Run the operation against the session.
    pub fn execute<S, K, F, C>(
        &mut self,
        session: &mut ProvisioningSession<S, K, F, C>,
    ) -> Result<()>
    where
        S: StoragePort,
        K: KeyStore,
        F: FlashPort,
        C: CryptoPort,
    {
        match self {
            Self::Void => {}
            Self::Debug(out) => *out = Some(session.debug_info()?),
            Self::Csr(req, out) => *out = Some(session.csr(req)?),
            Self::Import(req, out) => {
                let result = session.import(req);
                req.wipe();
                *out = Some(result?);
            }
            Self::Setup(req, out) => *out = Some(session.setup(req)?),
        }
        Ok(())
    }

    /// Append the response fields.  Writes nothing if `execute` did not
    /// produce a response.
    pub fn encode<const N: usize>(&self, frame: &mut Frame<N>) -> Result<()> {
        match self {
            Self::Void => {}
            Self::Debug(Some(d)) => {
                frame.add_u16(d.vendor_id)?;
                frame.add_u16(d.product_id)?;
                frame.add_u16(d.discriminator)?;
                frame.add_u32(d.key_id)?;
                frame.add_u32(d.page_address)?;
                frame.add_u32(d.dac_size)?;
                frame.add_u32(d.pai_size)?;
                frame.add_u32(d.cd_size)?;
            }
            Self::Csr(_, Some(r)) => {
                frame.add_u32(r.key_id)?;
                frame.add_bytes(&r.csr)?;
            }
            Self::Import(_, Some(r)) => {
                frame.add_u32(r.key_id)?;
                frame.add_u32(r.page_address)?;
                frame.add_u32(r.offset)?;
                frame.add_u32(r.size)?;
            }
            Self::Setup(_, Some(r)) => {
                frame.add_u32(r.passcode)?;
                frame.add_u16(r.discriminator)?;
                frame.add_bytes(&r.unique_id)?;
                frame.add_bytes(&r.payload)?;
            }
            Self::Debug(None)
            | Self::Csr(_, None)
            | Self::Import(_, None)
            | Self::Setup(_, None) => {}
        }
        Ok(())
    }
}
