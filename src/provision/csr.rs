//! PKCS#10 certificate signing request for the device key.
//!
//! ```text
//!   CertificationRequest SEQUENCE
//!   ├── CertificationRequestInfo SEQUENCE
//!   │   ├── version            INTEGER 0
//!   │   ├── subject            CN, Matter VID, Matter PID
//!   │   ├── subjectPKInfo      id-ecPublicKey / prime256v1, BIT STRING
//!   │   └── attributes         [0] (empty)
//!   ├── signatureAlgorithm     ecdsa-with-SHA256
//!   └── signature              BIT STRING { SEQUENCE { r, s } }
//! ```
//!
//! The request info is hashed through [`CryptoPort::sha256`] and signed by
//! the key store, so the private key never leaves it.  Output is PEM.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::info;

use crate::app::ports::{CryptoPort, KeyId, KeyStore, PublicKey, RawSignature};
use crate::error::{ProvisionError, Result};
use crate::provision::der::{tag, DerError, DerWriter};

/// Smallest output buffer `generate` accepts.
pub const CSR_MIN_LEN: usize = 1024;

/// Largest common name accepted in the subject.
pub const MAX_COMMON_NAME: usize = 64;

const DER_MAX: usize = 512;
const PEM_COLUMNS: usize = 64;
const PEM_BEGIN: &[u8] = b"-----BEGIN CERTIFICATE REQUEST-----\n";
const PEM_END: &[u8] = b"-----END CERTIFICATE REQUEST-----\n";

mod oid {
    pub const COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];
    /// 1.3.6.1.4.1.37244.2.1
    pub const MATTER_VID: &[u8] = &[0x2B, 0x06, 0x01, 0x04, 0x01, 0x82, 0xA2, 0x7C, 0x02, 0x01];
    /// 1.3.6.1.4.1.37244.2.2
    pub const MATTER_PID: &[u8] = &[0x2B, 0x06, 0x01, 0x04, 0x01, 0x82, 0xA2, 0x7C, 0x02, 0x02];
    pub const EC_PUBLIC_KEY: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x02, 0x01];
    pub const PRIME256V1: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07];
    pub const ECDSA_WITH_SHA256: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x02];
}

/// Subject fields of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject<'a> {
    /// Omitted from the subject when empty.
    pub common_name: &'a str,
    pub vendor_id: u16,
    pub product_id: u16,
}

/// Build, sign and PEM-encode a CSR for the key under `key_id`.
/// Returns the number of bytes written to `out`.
pub fn generate<K: KeyStore, C: CryptoPort>(
    keystore: &mut K,
    crypto: &C,
    key_id: KeyId,
    subject: &Subject<'_>,
    out: &mut [u8],
) -> Result<usize> {
    if out.len() < CSR_MIN_LEN {
        return Err(ProvisionError::BufferTooSmall);
    }
    if subject.common_name.len() > MAX_COMMON_NAME {
        return Err(ProvisionError::BufferTooSmall);
    }

    let public = keystore.export_public(key_id)?;
    let info = request_info(subject, &public).map_err(der_error)?;
    let digest = crypto.sha256(info.as_bytes());
    let raw = keystore.sign_hash(key_id, &digest)?;
    let request = assemble(&info, &raw).map_err(der_error)?;

    let n = to_pem(request.as_bytes(), out)?;
    info!(
        "Csr: {} byte request for key 0x{:08X} (VID {:04X}, PID {:04X})",
        n, key_id, subject.vendor_id, subject.product_id
    );
    Ok(n)
}

fn der_error(_: DerError) -> ProvisionError {
    ProvisionError::BufferTooSmall
}

/// Four uppercase hex digits.
fn hex4(value: u16) -> [u8; 4] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    [
        DIGITS[(value >> 12) as usize & 0xF],
        DIGITS[(value >> 8) as usize & 0xF],
        DIGITS[(value >> 4) as usize & 0xF],
        DIGITS[value as usize & 0xF],
    ]
}

fn rdn<const N: usize>(
    name: &mut DerWriter<N>,
    attr: &[u8],
    value: &[u8],
) -> core::result::Result<(), DerError> {
    name.nested(tag::SET, |set| {
        set.nested(tag::SEQUENCE, |atv| {
            atv.tlv(tag::OID, attr)?;
            atv.tlv(tag::UTF8_STRING, value)
        })
    })
}

fn request_info(
    subject: &Subject<'_>,
    public: &PublicKey,
) -> core::result::Result<DerWriter<DER_MAX>, DerError> {
    let mut w = DerWriter::new();
    w.nested(tag::SEQUENCE, |info| {
        info.unsigned_integer(&[0])?;
        info.nested(tag::SEQUENCE, |name| {
            if !subject.common_name.is_empty() {
                rdn(name, oid::COMMON_NAME, subject.common_name.as_bytes())?;
            }
            rdn(name, oid::MATTER_VID, &hex4(subject.vendor_id))?;
            rdn(name, oid::MATTER_PID, &hex4(subject.product_id))
        })?;
        info.nested(tag::SEQUENCE, |spki| {
            spki.nested(tag::SEQUENCE, |alg| {
                alg.tlv(tag::OID, oid::EC_PUBLIC_KEY)?;
                alg.tlv(tag::OID, oid::PRIME256V1)
            })?;
            spki.bit_string(public)
        })?;
        info.tlv(tag::CONTEXT_0, &[])
    })?;
    Ok(w)
}

/// DER `ECDSA-Sig-Value` from a raw `r || s` signature.
pub fn signature_der(raw: &RawSignature) -> core::result::Result<DerWriter<80>, DerError> {
    let mut w = DerWriter::new();
    w.nested(tag::SEQUENCE, |seq| {
        seq.unsigned_integer(&raw[..32])?;
        seq.unsigned_integer(&raw[32..])
    })?;
    Ok(w)
}

fn assemble(
    info: &DerWriter<DER_MAX>,
    raw: &RawSignature,
) -> core::result::Result<DerWriter<DER_MAX>, DerError> {
    let signature = signature_der(raw)?;
    let mut w = DerWriter::new();
    w.nested(tag::SEQUENCE, |req| {
        req.raw(info.as_bytes())?;
        req.nested(tag::SEQUENCE, |alg| alg.tlv(tag::OID, oid::ECDSA_WITH_SHA256))?;
        req.bit_string(signature.as_bytes())
    })?;
    Ok(w)
}

struct Cursor<'a> {
    out: &'a mut [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn push(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.out.len() {
            return Err(ProvisionError::BufferTooSmall);
        }
        self.out[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }
}

fn to_pem(der: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut body = [0u8; 4 * DER_MAX.div_ceil(3)];
    let n = STANDARD
        .encode_slice(der, &mut body)
        .map_err(|_| ProvisionError::BufferTooSmall)?;

    let mut pem = Cursor { out, pos: 0 };
    pem.push(PEM_BEGIN)?;
    for line in body[..n].chunks(PEM_COLUMNS) {
        pem.push(line)?;
        pem.push(b"\n")?;
    }
    pem.push(PEM_END)?;
    Ok(pem.pos)
}
