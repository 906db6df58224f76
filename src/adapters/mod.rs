//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements  | Connects to                      |
//! |------------|-------------|----------------------------------|
//! | `crypto`   | CryptoPort  | Software SHA-256 + DER reader    |
//! | `flash`    | FlashPort   | Simulated NOR page flash         |
//! | `log_sink` | EventSink   | `log` facade                     |
//! | `nvs`      | StoragePort | In-memory object store           |
//!
//! Hardware key stores live with the platform code; the core only sees
//! the [`KeyStore`](crate::app::ports::KeyStore) trait.

pub mod crypto;
pub mod flash;
pub mod log_sink;
pub mod nvs;
