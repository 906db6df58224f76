//! Command dispatcher.
//!
//! One request frame is handled per iteration:
//!
//! ```text
//!   Idle ─▶ DecodingHeader ─▶ DecodingBody ─▶ Executing ─▶ EncodingResponse ─▶ Idle
//!                                  │                              ▲
//!                                  └──────── decode error ────────┘
//! ```
//!
//! The response always opens with the request's command byte followed by a
//! signed status code.  Result fields follow only when the code is zero.
//! Side effects of `execute` are kept even if the response cannot be
//! encoded; the status code then reports the encode failure instead.

use log::{debug, warn};
use zeroize::Zeroize;

use crate::app::commands::{Command, CommandId};
use crate::app::events::ProvisionEvent;
use crate::app::ports::{CryptoPort, EventSink, FlashPort, KeyStore, StoragePort};
use crate::app::service::ProvisioningSession;
use crate::error::ProvisionError;

use super::codec::{Frame, FRAME_CAPACITY};
use super::transport::Transport;

/// Where the dispatcher is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    DecodingHeader,
    DecodingBody,
    Executing,
    EncodingResponse,
}

/// Summary of one handled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub command: u8,
    pub kind: Option<CommandId>,
    pub code: i32,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

pub struct Dispatcher<const N: usize = FRAME_CAPACITY> {
    state: DispatchState,
    response: Frame<N>,
    frames_handled: u32,
}

impl<const N: usize> Dispatcher<N> {
    pub const fn new() -> Self {
        Self {
            state: DispatchState::Idle,
            response: Frame::new(),
            frames_handled: 0,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn frames_handled(&self) -> u32 {
        self.frames_handled
    }

    /// Response produced by the last handled frame.
    pub fn response(&self) -> &[u8] {
        self.response.as_bytes()
    }

    /// Handle one request frame and build its response.
    ///
    /// Returns `None` for an empty request; nothing is produced then.
    pub fn handle<S, K, F, C>(
        &mut self,
        request: &[u8],
        session: &mut ProvisioningSession<S, K, F, C>,
    ) -> Option<Outcome>
    where
        S: StoragePort,
        K: KeyStore,
        F: FlashPort,
        C: CryptoPort,
    {
        let &id = request.first()?;
        self.response.clear();

        self.state = DispatchState::DecodingHeader;
        let mut command = Command::for_id(id);
        let mut result = match Frame::<N>::from_bytes(request) {
            Ok(mut frame) => {
                let decoded = match frame.get_header() {
                    Ok(_) => {
                        self.state = DispatchState::DecodingBody;
                        command.decode(&mut frame)
                    }
                    Err(e) => Err(e.into()),
                };
                // The request copy may hold an imported private key.
                frame.wipe();
                decoded
            }
            Err(e) => Err(e.into()),
        };

        if result.is_ok() {
            self.state = DispatchState::Executing;
            result = command.execute(session);
        }

        self.state = DispatchState::EncodingResponse;
        let code = match result {
            Ok(()) => 0,
            Err(e) => {
                warn!("Dispatcher: {} (0x{:02X}) failed: {}", command.name(), id, e);
                e.code()
            }
        };
        let code = match self.encode_response(id, code, &command) {
            Ok(()) => code,
            Err(e) => {
                warn!("Dispatcher: {} response encode failed: {}", command.name(), e);
                self.encode_status_only(id, e.code());
                e.code()
            }
        };

        self.frames_handled = self.frames_handled.wrapping_add(1);
        self.state = DispatchState::Idle;
        debug!(
            "Dispatcher: {} -> code {} ({} bytes)",
            command.name(),
            code,
            self.response.len()
        );

        Some(Outcome {
            command: id,
            kind: CommandId::from_wire(id),
            code,
        })
    }

    /// Read one frame from `transport`, handle it and write the response.
    ///
    /// The transport must deliver a whole frame per read.  Returns `true`
    /// when a frame was handled.  Between frames the object store is
    /// repacked if it reports enough obsolete space.
    pub fn poll<T, E, S, K, F, C>(
        &mut self,
        transport: &mut T,
        session: &mut ProvisioningSession<S, K, F, C>,
        sink: &mut E,
    ) -> bool
    where
        T: Transport,
        E: EventSink,
        S: StoragePort,
        K: KeyStore,
        F: FlashPort,
        C: CryptoPort,
    {
        let mut buf = [0u8; N];
        let n = match transport.read(&mut buf) {
            Ok(n) => n.min(N),
            Err(e) => {
                warn!("Dispatcher: transport read failed: {:?}", e);
                sink.emit(&ProvisionEvent::TransportError);
                return false;
            }
        };

        let outcome = self.handle(&buf[..n], session);
        // Import requests carry raw key material.
        buf[..n].zeroize();
        let Some(outcome) = outcome else {
            return false;
        };

        let written = transport
            .write(self.response.as_bytes())
            .and_then(|_| transport.flush());
        if let Err(e) = written {
            warn!("Dispatcher: transport write failed: {:?}", e);
            sink.emit(&ProvisionEvent::TransportError);
        }

        sink.emit(&ProvisionEvent::Handled {
            command: outcome.command,
            kind: outcome.kind,
            code: outcome.code,
            response_len: self.response.len(),
        });

        match session.maintain() {
            Ok(true) => sink.emit(&ProvisionEvent::Repacked),
            Ok(false) => {}
            Err(e) => warn!("Dispatcher: repack failed: {}", e),
        }
        true
    }

    fn encode_response(
        &mut self,
        id: u8,
        code: i32,
        command: &Command,
    ) -> Result<(), ProvisionError> {
        self.response.add_header(id)?;
        self.response.add_i32(code)?;
        if code == 0 {
            command.encode(&mut self.response)?;
        }
        Ok(())
    }

    fn encode_status_only(&mut self, id: u8, code: i32) {
        self.response.clear();
        // Six bytes; only a frame smaller than that can refuse them.
        if self.response.add_header(id).and_then(|()| self.response.add_i32(code)).is_err() {
            self.response.clear();
        }
    }
}

impl<const N: usize> Default for Dispatcher<N> {
    fn default() -> Self {
        Self::new()
    }
}
