//! Provisioning wire protocol.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Provisioning RPC                      │
//! │                                                          │
//! │  ┌───────────┐   ┌──────────┐   ┌─────────────────────┐  │
//! │  │ Transport │──▶│  Codec   │──▶│ Dispatcher (engine) │  │
//! │  │ (trait)   │   │ (Frame)  │   │ → Command::execute  │  │
//! │  └───────────┘   └──────────┘   └─────────────────────┘  │
//! │       ▲                                    │             │
//! │       └──────────── response frame ────────┘             │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod engine;
pub mod transport;
