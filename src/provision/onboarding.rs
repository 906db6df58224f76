//! Onboarding payload packer.
//!
//! The payload is a fixed 88-bit schedule, written LSB-first:
//!
//! ```text
//!   bit 0                                                          87
//!   │ver:3│vid:16│pid:16│flow:2│rdv:8│disc:12│passcode:27│pad:4│
//! ```
//!
//! Besides the raw 11 bytes this module renders the two text forms a
//! commissioner scans or types: the `MT:` QR string (base-38) and the
//! decimal manual pairing code with its Verhoeff check digit.
//!
//! Unique id and discriminator can be derived from a SHA-256 of the device
//! serial number when the caller does not supply them ([`DefaultHash`]).

use core::fmt::{self, Write as _};

use crate::app::ports::CryptoPort;
use crate::error::Result;

pub const PAYLOAD_LEN: usize = 11;
pub const PAYLOAD_BITS: usize = PAYLOAD_LEN * 8;

/// Highest discriminator value (12 bits).
pub const MAX_DISCRIMINATOR: u16 = 0x0FFF;

/// Length of the derived unique id.
pub const UNIQUE_ID_LEN: usize = 16;

const VERSION_BITS: usize = 3;
const VENDOR_ID_BITS: usize = 16;
const PRODUCT_ID_BITS: usize = 16;
const FLOW_BITS: usize = 2;
const RENDEZVOUS_BITS: usize = 8;
const DISCRIMINATOR_BITS: usize = 12;
const PASSCODE_BITS: usize = 27;
const PADDING_BITS: usize = 4;

/// Commissioning flow values.
pub mod flow {
    pub const STANDARD: u8 = 0;
    pub const USER_INTENT: u8 = 1;
    pub const CUSTOM: u8 = 2;
}

/// Rendezvous capability bits.
pub mod rendezvous {
    pub const SOFT_AP: u8 = 0x01;
    pub const BLE: u8 = 0x02;
    pub const ON_NETWORK: u8 = 0x04;
}

/// Set the low `width` bits of `value` at bit `offset` (LSB-first).
///
/// Bits are only ever set, never cleared, so `buf` must start zeroed.
/// Returns the offset just past the field, or `None` if the field would
/// run past `total` bits or `total` does not fit `buf`.
pub fn pack_bits(
    buf: &mut [u8],
    offset: usize,
    value: u32,
    width: usize,
    total: usize,
) -> Option<usize> {
    if width > 32 || total > buf.len() * 8 {
        return None;
    }
    let end = offset.checked_add(width)?;
    if end > total {
        return None;
    }
    for i in 0..width {
        if (value >> i) & 1 != 0 {
            let bit = offset + i;
            buf[bit / 8] |= 1 << (bit % 8);
        }
    }
    Some(end)
}

/// Fields carried by the onboarding payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OnboardingInfo {
    pub version: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub commissioning_flow: u8,
    pub rendezvous: u8,
    pub discriminator: u16,
    pub passcode: u32,
}

impl OnboardingInfo {
    /// Bit-pack into the 11-byte payload.  Values wider than their field
    /// are truncated to it.
    pub fn pack(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        let fields: [(u32, usize); 8] = [
            (self.version as u32, VERSION_BITS),
            (self.vendor_id as u32, VENDOR_ID_BITS),
            (self.product_id as u32, PRODUCT_ID_BITS),
            (self.commissioning_flow as u32, FLOW_BITS),
            (self.rendezvous as u32, RENDEZVOUS_BITS),
            (self.discriminator as u32, DISCRIMINATOR_BITS),
            (self.passcode, PASSCODE_BITS),
            (0, PADDING_BITS),
        ];
        let mut offset = 0;
        for (value, width) in fields {
            // The schedule sums to exactly PAYLOAD_BITS.
            offset = pack_bits(&mut out, offset, value, width, PAYLOAD_BITS).unwrap_or(offset);
        }
        out
    }

    /// `MT:` followed by the base-38 payload.
    pub fn qr_code(&self) -> core::result::Result<heapless::String<32>, fmt::Error> {
        let mut s = heapless::String::new();
        s.push_str("MT:").map_err(|_| fmt::Error)?;
        base38_encode(&self.pack(), &mut s)?;
        Ok(s)
    }

    /// Manual pairing code: 11 digits, or 21 when the flow is not
    /// Standard (vendor and product id appended).
    pub fn manual_code(&self) -> core::result::Result<heapless::String<24>, fmt::Error> {
        let disc = (self.discriminator & MAX_DISCRIMINATOR) as u32;
        let passcode = self.passcode & 0x07FF_FFFF;
        let long = self.commissioning_flow != flow::STANDARD;

        let chunk1 = (u32::from(long) << 2) | (disc >> 10);
        let chunk2 = ((disc & 0x300) << 6) | (passcode & 0x3FFF);
        let chunk3 = passcode >> 14;

        let mut s = heapless::String::<24>::new();
        write!(s, "{}{:05}{:04}", chunk1, chunk2, chunk3)?;
        if long {
            write!(s, "{:05}{:05}", self.vendor_id, self.product_id)?;
        }
        let check = verhoeff_check(s.as_bytes());
        s.push(char::from(b'0' + check)).map_err(|_| fmt::Error)?;
        Ok(s)
    }
}

// ── Base-38 ──────────────────────────────────────────────────

const BASE38: &[u8; 38] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-.";

/// Little-endian chunks of 3/2/1 bytes become 5/4/2 characters.
/// Fails if `out` runs out of room.
pub fn base38_encode<const N: usize>(data: &[u8], out: &mut heapless::String<N>) -> fmt::Result {
    for chunk in data.chunks(3) {
        let mut value = chunk
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);
        let chars = match chunk.len() {
            3 => 5,
            2 => 4,
            _ => 2,
        };
        for _ in 0..chars {
            out.push(char::from(BASE38[(value % 38) as usize]))
                .map_err(|_| fmt::Error)?;
            value /= 38;
        }
    }
    Ok(())
}

// ── Verhoeff ─────────────────────────────────────────────────

const VERHOEFF_D: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

const VERHOEFF_P: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

const VERHOEFF_INV: [u8; 10] = [0, 4, 3, 2, 1, 5, 6, 7, 8, 9];

/// Check digit for a string of ASCII digits.
pub fn verhoeff_check(digits: &[u8]) -> u8 {
    let c = digits.iter().rev().enumerate().fold(0u8, |c, (i, &d)| {
        let d = d.wrapping_sub(b'0') % 10;
        VERHOEFF_D[c as usize][VERHOEFF_P[(i + 1) % 8][d as usize] as usize]
    });
    VERHOEFF_INV[c as usize]
}

// ── Defaults derived from the serial number ─────────────────

/// SHA-256 of the device serial number, computed at most once per owner.
#[derive(Debug, Default, Clone)]
pub struct DefaultHash {
    digest: Option<[u8; 32]>,
}

impl DefaultHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_computed(&self) -> bool {
        self.digest.is_some()
    }

    /// Hash the serial returned by `serial` on first use; later calls
    /// return the cached digest without calling either closure or hash.
    pub fn get<C, F, const N: usize>(&mut self, crypto: &C, serial: F) -> Result<[u8; 32]>
    where
        C: CryptoPort,
        F: FnOnce() -> Result<heapless::Vec<u8, N>>,
    {
        if let Some(d) = self.digest {
            return Ok(d);
        }
        let sn = serial()?;
        let d = crypto.sha256(&sn);
        self.digest = Some(d);
        Ok(d)
    }
}

/// Default unique id: the first 16 bytes of the hash.
pub fn default_unique_id(hash: &[u8; 32]) -> [u8; UNIQUE_ID_LEN] {
    let mut id = [0u8; UNIQUE_ID_LEN];
    id.copy_from_slice(&hash[..UNIQUE_ID_LEN]);
    id
}

/// Default discriminator: the low 12 bits of the last two hash bytes
/// read big-endian.
pub fn default_discriminator(hash: &[u8; 32]) -> u16 {
    u16::from_be_bytes([hash[30], hash[31]]) & MAX_DISCRIMINATOR
}
