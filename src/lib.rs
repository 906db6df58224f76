//! Device provisioning core.
//!
//! A factory host sends type-tagged request frames; the [`rpc::engine`]
//! dispatcher decodes them, runs the command against a
//! [`ProvisioningSession`](app::service::ProvisioningSession) and writes a
//! response frame back.  Platform services (key store, flash, object
//! store, hashing) are reached only through the traits in [`app::ports`];
//! [`adapters`] ships host-side simulations of each.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod provision;
pub mod rpc;
