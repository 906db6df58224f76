//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one line per provisioning event to
//! the `log` facade.  Whatever logger the host installs decides where the
//! lines end up (UART, stdout, a test capture).

use log::{info, warn};

use crate::app::events::ProvisionEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`ProvisionEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink {
    failures: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames answered with a non-zero code, plus transport errors.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ProvisionEvent) {
        match event {
            ProvisionEvent::Handled {
                command,
                kind,
                code,
                response_len,
            } => {
                if *code == 0 {
                    info!(
                        "PROV | cmd=0x{:02X} ({:?}) | ok | {} bytes",
                        command, kind, response_len
                    );
                } else {
                    self.failures = self.failures.saturating_add(1);
                    warn!(
                        "PROV | cmd=0x{:02X} ({:?}) | code={} | {} bytes",
                        command, kind, code, response_len
                    );
                }
            }
            ProvisionEvent::TransportError => {
                self.failures = self.failures.saturating_add(1);
                warn!("PROV | transport error");
            }
            ProvisionEvent::Repacked => {
                info!("PROV | object store repacked");
            }
        }
    }
}
