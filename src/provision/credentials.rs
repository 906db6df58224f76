//! Credential page: RAM image of the flash page holding the attestation
//! certificates.
//!
//! ```text
//!   0x000 ┌──────────────┐
//!         │ DAC   (512)  │
//!   0x200 ├──────────────┤
//!         │ PAI   (512)  │
//!   0x400 ├──────────────┤
//!         │ CD   (1024)  │
//!   0x800 └──────────────┘
//! ```
//!
//! Staging only touches RAM and the Config Store.  Flash is erased and
//! programmed once, and only when [`CredentialPage::commit`] is called.

use log::info;

use crate::app::ports::{FlashPort, StoragePort};
use crate::error::{ProvisionError, Result, StorageError};
use crate::provision::config_store::{keys, ConfigStore};

/// Size of the credential page; the flash erase page must be at least this.
pub const PAGE_SIZE: usize = 0x800;

const ERASED: u8 = 0xFF;

/// File identifiers carried by the Import command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileId {
    None = 0,
    Key = 1,
    Dac = 2,
    Pai = 3,
    Cd = 4,
}

impl TryFrom<u8> for FileId {
    type Error = ProvisionError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::Key),
            2 => Ok(Self::Dac),
            3 => Ok(Self::Pai),
            4 => Ok(Self::Cd),
            other => Err(ProvisionError::InvalidFileId(other)),
        }
    }
}

/// Fixed placement of one certificate file inside the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub offset: u32,
    pub capacity: usize,
    pub offset_key: u32,
    pub size_key: u32,
}

impl FileId {
    /// Page slot for certificate files; `None` for Key and None.
    pub const fn slot(self) -> Option<Slot> {
        match self {
            Self::Dac => Some(Slot {
                offset: 0x000,
                capacity: 0x200,
                offset_key: keys::DAC_OFFSET,
                size_key: keys::DAC_SIZE,
            }),
            Self::Pai => Some(Slot {
                offset: 0x200,
                capacity: 0x200,
                offset_key: keys::PAI_OFFSET,
                size_key: keys::PAI_SIZE,
            }),
            Self::Cd => Some(Slot {
                offset: 0x400,
                capacity: PAGE_SIZE - 0x400,
                offset_key: keys::CD_OFFSET,
                size_key: keys::CD_SIZE,
            }),
            Self::None | Self::Key => None,
        }
    }
}

/// Where a staged file landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub offset: u32,
    pub size: u32,
}

pub struct CredentialPage {
    address: u32,
    image: [u8; PAGE_SIZE],
}

impl CredentialPage {
    pub fn new(address: u32) -> Self {
        Self {
            address,
            image: [ERASED; PAGE_SIZE],
        }
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Copy `data` into the slot for `file` and record its placement.
    pub fn stage<S: StoragePort>(
        &mut self,
        store: &mut ConfigStore<S>,
        file: FileId,
        data: &[u8],
    ) -> Result<Placement> {
        let slot = file
            .slot()
            .ok_or(ProvisionError::InvalidFileId(file as u8))?;
        if data.len() > slot.capacity {
            return Err(ProvisionError::BufferTooSmall);
        }

        let start = slot.offset as usize;
        let region = &mut self.image[start..start + slot.capacity];
        region[..data.len()].copy_from_slice(data);
        region[data.len()..].fill(ERASED);

        let placement = Placement {
            offset: slot.offset,
            size: data.len() as u32,
        };
        store.write_u32(slot.offset_key, placement.offset)?;
        store.write_u32(slot.size_key, placement.size)?;
        info!(
            "CredentialPage: staged {:?} ({} bytes @ 0x{:03X})",
            file, placement.size, placement.offset
        );
        Ok(placement)
    }

    /// Erase the target page, program it from the image and persist the
    /// page address.  Fails without touching flash if the device's erase
    /// page cannot hold the image.
    pub fn commit<F: FlashPort, S: StoragePort>(
        &self,
        flash: &mut F,
        store: &mut ConfigStore<S>,
    ) -> Result<()> {
        if flash.page_size() < PAGE_SIZE {
            return Err(StorageError::OutOfBounds.into());
        }
        flash.erase_page(self.address)?;
        flash.program(self.address, &self.image)?;
        store.write_u32(keys::CREDS_BASE_ADDR, self.address)?;
        info!("CredentialPage: committed page 0x{:08X}", self.address);
        Ok(())
    }
}
