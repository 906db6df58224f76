//! NVS (Non-Volatile Storage) simulation adapter.
//!
//! Implements [`StoragePort`] as an in-memory log-structured object store,
//! close enough to the on-chip NVS3 layout that the Config Store sees the
//! same behaviour it would on hardware:
//!
//! ```text
//!   write(k, v)  ──▶  append record (header + v)
//!                     previous record for k ──▶ obsolete
//!   delete(k)    ──▶  record for k ──▶ obsolete
//!   repack()     ──▶  obsolete space returned to the free pool
//! ```
//!
//! Every record costs [`RECORD_OVERHEAD`] bytes plus its payload.  A write
//! that does not fit fails with [`StorageError::Full`]; the store never
//! repacks on its own.  Callers check [`StoragePort::repack_due`] between
//! frames instead.
//!
//! Data objects and counters are distinct record kinds.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::app::ports::StoragePort;
use crate::error::StorageError;

/// Bytes consumed by each record header.
pub const RECORD_OVERHEAD: usize = 8;

/// Simulated partition size.
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Largest single data object.
pub const MAX_OBJECT_SIZE: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Object {
    Data(Vec<u8>),
    Counter(u32),
}

impl Object {
    fn footprint(&self) -> usize {
        RECORD_OVERHEAD
            + match self {
                Self::Data(d) => d.len(),
                Self::Counter(_) => 4,
            }
    }
}

pub struct NvsAdapter {
    objects: BTreeMap<u32, Object>,
    capacity: usize,
    /// Live + obsolete bytes.
    used: usize,
    obsolete: usize,
    repacks: u32,
}

impl NvsAdapter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        info!("NvsAdapter: simulation backend, {} bytes", capacity);
        Self {
            objects: BTreeMap::new(),
            capacity,
            used: 0,
            obsolete: 0,
            repacks: 0,
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn used_bytes(&self) -> usize {
        self.used
    }

    pub fn obsolete_bytes(&self) -> usize {
        self.obsolete
    }

    pub fn repack_count(&self) -> u32 {
        self.repacks
    }

    fn put(&mut self, key: u32, object: Object) -> Result<(), StorageError> {
        let cost = object.footprint();
        if self.used + cost > self.capacity {
            debug!(
                "NvsAdapter: full writing 0x{:06X} ({} used, {} obsolete)",
                key, self.used, self.obsolete
            );
            return Err(StorageError::Full);
        }
        self.used += cost;
        if let Some(old) = self.objects.insert(key, object) {
            self.obsolete += old.footprint();
        }
        Ok(())
    }
}

impl Default for NvsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for NvsAdapter {
    fn object_len(&self, key: u32) -> Result<usize, StorageError> {
        match self.objects.get(&key) {
            Some(Object::Data(d)) => Ok(d.len()),
            Some(Object::Counter(_)) => Err(StorageError::Corrupted),
            None => Err(StorageError::NotFound),
        }
    }

    fn read(&self, key: u32, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.objects.get(&key) {
            Some(Object::Data(d)) => {
                if buf.len() < d.len() {
                    return Err(StorageError::IoError);
                }
                buf[..d.len()].copy_from_slice(d);
                Ok(d.len())
            }
            Some(Object::Counter(_)) => Err(StorageError::Corrupted),
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, key: u32, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_OBJECT_SIZE {
            return Err(StorageError::Full);
        }
        self.put(key, Object::Data(data.to_vec()))
    }

    fn delete(&mut self, key: u32) -> Result<(), StorageError> {
        if let Some(old) = self.objects.remove(&key) {
            self.obsolete += old.footprint();
        }
        Ok(())
    }

    fn read_counter(&self, key: u32) -> Result<u32, StorageError> {
        match self.objects.get(&key) {
            Some(Object::Counter(v)) => Ok(*v),
            Some(Object::Data(_)) => Err(StorageError::Corrupted),
            None => Err(StorageError::NotFound),
        }
    }

    fn write_counter(&mut self, key: u32, value: u32) -> Result<(), StorageError> {
        if let Some(Object::Data(_)) = self.objects.get(&key) {
            return Err(StorageError::Corrupted);
        }
        self.put(key, Object::Counter(value))
    }

    fn repack_due(&self) -> bool {
        self.obsolete >= self.capacity / 4
    }

    fn repack(&mut self) -> Result<(), StorageError> {
        info!(
            "NvsAdapter: repack reclaimed {} bytes ({} objects live)",
            self.obsolete,
            self.objects.len()
        );
        self.used -= self.obsolete;
        self.obsolete = 0;
        self.repacks += 1;
        Ok(())
    }
}
