//! Simulated page flash.
//!
//! NOR semantics: erase sets a whole page to `0xFF`, program can only clear
//! bits (`cell &= data`).  Erase and program calls are counted so tests can
//! assert exactly how often the credential page was touched.

use log::debug;

use crate::app::ports::FlashPort;
use crate::error::StorageError;
use crate::provision::credentials::PAGE_SIZE;

const ERASED: u8 = 0xFF;

pub struct SimFlash {
    base: u32,
    page_size: usize,
    mem: Vec<u8>,
    erases: u32,
    programs: u32,
}

impl SimFlash {
    /// `pages` erase pages starting at `base` (which must be page aligned),
    /// each one credential page long.
    pub fn new(base: u32, pages: usize) -> Self {
        Self::with_page_size(base, pages, PAGE_SIZE)
    }

    pub fn with_page_size(base: u32, pages: usize, page_size: usize) -> Self {
        Self {
            base,
            page_size,
            mem: vec![ERASED; pages * page_size],
            erases: 0,
            programs: 0,
        }
    }

    pub fn erase_count(&self) -> u32 {
        self.erases
    }

    pub fn program_count(&self) -> u32 {
        self.programs
    }

    fn span(&self, address: u32, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let start = address
            .checked_sub(self.base)
            .ok_or(StorageError::OutOfBounds)? as usize;
        let end = start.checked_add(len).ok_or(StorageError::OutOfBounds)?;
        if end > self.mem.len() {
            return Err(StorageError::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl FlashPort for SimFlash {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn erase_page(&mut self, address: u32) -> Result<(), StorageError> {
        if address % self.page_size as u32 != 0 {
            return Err(StorageError::IoError);
        }
        let range = self.span(address, self.page_size)?;
        self.mem[range].fill(ERASED);
        self.erases += 1;
        debug!("SimFlash: erased page 0x{:08X}", address);
        Ok(())
    }

    fn program(&mut self, address: u32, data: &[u8]) -> Result<(), StorageError> {
        let range = self.span(address, data.len())?;
        for (cell, &b) in self.mem[range].iter_mut().zip(data) {
            *cell &= b;
        }
        self.programs += 1;
        debug!("SimFlash: programmed {} bytes at 0x{:08X}", data.len(), address);
        Ok(())
    }

    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        let range = self.span(address, buf.len())?;
        buf.copy_from_slice(&self.mem[range]);
        Ok(())
    }
}
