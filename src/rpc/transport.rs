//! Transport abstraction for provisioning frames.
//!
//! A transport hands the dispatcher one complete request frame per
//! [`Transport::read`] and takes back one response frame per
//! [`Transport::write`].  Serial links, debugger mailboxes and test
//! loopbacks all fit behind it.

/// Frame-oriented transport channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read one request frame into `buf`.
    /// Returns its length, or 0 if nothing is pending (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write one response frame.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Check if a request is pending.
    fn available(&self) -> bool;
}
