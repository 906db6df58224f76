//! Software hash / certificate capability.
//!
//! SHA-256 comes from `hmac-sha256`; X.509 parsing walks the certificate
//! with the in-crate DER reader and pulls out the serial number:
//!
//! ```text
//!   Certificate ::= SEQUENCE {
//!       tbsCertificate SEQUENCE {
//!           [0] version        OPTIONAL
//!           serialNumber       INTEGER      ◀── extracted
//!           …
//!       }
//!       signatureAlgorithm, signatureValue
//!   }
//! ```

use log::warn;

use crate::app::ports::{CertificateInfo, CryptoPort, MAX_SERIAL_LEN};
use crate::provision::der::{parse_tlv, tag};

#[derive(Debug, Default, Clone, Copy)]
pub struct SoftCrypto;

impl SoftCrypto {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoPort for SoftCrypto {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        hmac_sha256::Hash::hash(data)
    }

    fn parse_x509(&self, der: &[u8]) -> Option<CertificateInfo> {
        let info = extract_serial(der);
        if info.is_none() {
            warn!("SoftCrypto: certificate rejected ({} bytes)", der.len());
        }
        info
    }
}

fn extract_serial(der: &[u8]) -> Option<CertificateInfo> {
    let (cert, _) = parse_tlv(der).ok()?;
    if cert.tag != tag::SEQUENCE {
        return None;
    }
    let tbs = cert.children().expect(tag::SEQUENCE)?;

    let mut fields = tbs.children();
    let mut next = fields.next()?.ok()?;
    if next.tag == tag::CONTEXT_0 {
        next = fields.next()?.ok()?;
    }
    if next.tag != tag::INTEGER || next.value.is_empty() || next.value.len() > MAX_SERIAL_LEN {
        return None;
    }

    let serial = heapless::Vec::from_slice(next.value).ok()?;
    Some(CertificateInfo { serial })
}
