//! Application core: provisioning logic behind port traits.
//!
//! Commands decode their request, run against the [`service`] session and
//! encode a response.  All interaction with key storage, flash and the
//! object store happens through **port traits** defined in [`ports`], so
//! this layer is fully testable without a device.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
