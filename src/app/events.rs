//! Outbound provisioning events.
//!
//! The [`Dispatcher`](crate::rpc::engine::Dispatcher) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log to serial, count in a test, …).

use super::commands::CommandId;

/// Structured events emitted by the provisioning core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionEvent {
    /// One request frame was handled and a response written.
    Handled {
        /// Raw command byte as received.
        command: u8,
        /// Recognised command, `None` for ids routed to Void.
        kind: Option<CommandId>,
        /// Status code sent back (0 on success).
        code: i32,
        response_len: usize,
    },

    /// The transport failed while reading or writing a frame.
    TransportError,

    /// The object store reclaimed obsolete space between frames.
    Repacked,
}
