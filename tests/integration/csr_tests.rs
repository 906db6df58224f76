//! CSR: key generation or adoption, then a PEM request signed by that key.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use factory_provision::error::{CodecError, ProvisionError};
use factory_provision::provision::config_store::keys;
use factory_provision::rpc::engine::Dispatcher;

use crate::mock_hw::{open_response, request, session, KeyCall, MockSession, DEVICE_KEY_DER};

const CSR: u8 = 2;

fn csr(s: &mut MockSession, cn: &str, key_id: u32) -> Result<(u32, String), i32> {
    let mut f = request(CSR);
    f.add_string(cn).unwrap();
    f.add_u16(0xFFF1).unwrap();
    f.add_u16(0x8000).unwrap();
    f.add_u32(key_id).unwrap();

    let mut d: Dispatcher = Dispatcher::new();
    d.handle(f.as_bytes(), s).unwrap();
    let (mut r, code) = open_response(d.response(), CSR);
    if code != 0 {
        return Err(code);
    }
    let key = r.get_u32().unwrap();
    let pem = r.get_vec::<1024>().unwrap();
    Ok((key, String::from_utf8(pem.to_vec()).unwrap()))
}

fn pem_body(pem: &str) -> Vec<u8> {
    let lines: Vec<&str> = pem.lines().collect();
    assert_eq!(lines.first(), Some(&"-----BEGIN CERTIFICATE REQUEST-----"));
    assert_eq!(lines.last(), Some(&"-----END CERTIFICATE REQUEST-----"));
    let body = &lines[1..lines.len() - 1];
    assert!(body.iter().all(|l| l.len() <= 64));
    STANDARD.decode(body.concat()).unwrap()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn fresh_key_is_generated_under_current_id() {
    let mut s = session();
    let (key, pem) = csr(&mut s, "node-7", 0).unwrap();
    assert_eq!(key, 0x4D31);
    assert_eq!(
        s.keystore().calls,
        vec![
            KeyCall::Destroy(0x4D31),
            KeyCall::Generate(0x4D31),
            KeyCall::Sign(0x4D31)
        ]
    );

    let der = pem_body(&pem);
    assert_eq!(der[0], 0x30);
    assert!(contains(&der, b"node-7"));
    assert!(contains(&der, b"FFF1"));
    assert!(contains(&der, b"8000"));
    // The mock public key repeats the scalar of the first generated key.
    assert!(contains(&der, &[0x04, 0x01, 0x01, 0x01]));
}

#[test]
fn second_request_replaces_the_key() {
    let mut s = session();
    csr(&mut s, "a", 0).unwrap();
    csr(&mut s, "a", 0).unwrap();
    assert_eq!(s.keystore().scalar(0x4D31), Some([2; 32]));
}

#[test]
fn nonzero_key_id_adopts_existing_key() {
    let mut s = session();
    let mut f = request(3);
    f.add_u8(1).unwrap();
    f.add_u32(0x0BAD).unwrap();
    f.add_u8(0).unwrap();
    f.add_bytes(DEVICE_KEY_DER).unwrap();
    let mut d: Dispatcher = Dispatcher::new();
    assert!(d.handle(f.as_bytes(), &mut s).unwrap().is_ok());
    s.keystore_mut().calls.clear();

    let (key, pem) = csr(&mut s, "", 0x0BAD).unwrap();
    assert_eq!(key, 0x0BAD);
    assert_eq!(s.keystore().calls, vec![KeyCall::Sign(0x0BAD)]);
    assert_eq!(s.store().read_u32(keys::CREDS_KEY_ID).unwrap(), 0x0BAD);
    // Empty common name is left out of the subject.
    let der = pem_body(&pem);
    assert!(!contains(&der, &[0x55, 0x04, 0x03]));
}

#[test]
fn overlong_common_name_fails_decode() {
    let mut s = session();
    let cn = "x".repeat(65);
    assert_eq!(
        csr(&mut s, &cn, 0),
        Err(ProvisionError::Codec(CodecError::TooLarge).code())
    );
    assert!(s.keystore().calls.is_empty());
}
