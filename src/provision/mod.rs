//! Provisioning building blocks used by the command layer.
//!
//! - [`config_store`]: typed, range-checked access to the object store
//! - [`credentials`]: RAM image of the credential flash page
//! - [`keys`] and [`csr`]: operational key lifecycle and PKCS#10 requests
//! - [`der`]: minimal DER reader/writer
//! - [`onboarding`]: 88-bit onboarding payload and its text forms

pub mod config_store;
pub mod credentials;
pub mod csr;
pub mod der;
pub mod keys;
pub mod onboarding;

#[cfg(test)]
pub(crate) mod test_support;
