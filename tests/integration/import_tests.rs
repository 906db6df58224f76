//! Import: key material, certificate staging and the credential page commit.

use factory_provision::app::ports::FlashPort;
use factory_provision::error::{CryptoError, ProvisionError};
use factory_provision::provision::config_store::keys;
use factory_provision::provision::credentials::FileId;
use factory_provision::rpc::engine::Dispatcher;

use crate::mock_hw::{
    open_response, request, session, KeyCall, MockSession, DAC_DER, DEVICE_KEY_DER, PAGE_BASE,
};

const IMPORT: u8 = 3;

/// Send one Import frame; returns the status code and, on success,
/// `(key_id, page_address, offset, size)`.
fn import(
    s: &mut MockSession,
    file: u8,
    key_id: u32,
    flash: bool,
    data: &[u8],
) -> (i32, Option<(u32, u32, u32, u32)>) {
    let mut f = request(IMPORT);
    f.add_u8(file).unwrap();
    f.add_u32(key_id).unwrap();
    f.add_u8(u8::from(flash)).unwrap();
    f.add_bytes(data).unwrap();

    let mut d: Dispatcher = Dispatcher::new();
    d.handle(f.as_bytes(), s).unwrap();
    let (mut r, code) = open_response(d.response(), IMPORT);
    if code != 0 {
        assert_eq!(r.remaining(), 0);
        return (code, None);
    }
    let fields = (
        r.get_u32().unwrap(),
        r.get_u32().unwrap(),
        r.get_u32().unwrap(),
        r.get_u32().unwrap(),
    );
    (code, Some(fields))
}

#[test]
fn staging_three_files_then_one_commit() {
    let mut s = session();
    let pai = [0xA5u8; 300];
    let cd = [0x5Au8; 600];

    let (code, dac) = import(&mut s, FileId::Dac as u8, 0, false, DAC_DER);
    assert_eq!(code, 0);
    assert_eq!(dac, Some((0x4D31, PAGE_BASE, 0x000, DAC_DER.len() as u32)));
    let (_, p) = import(&mut s, FileId::Pai as u8, 0, false, &pai);
    assert_eq!(p.map(|r| (r.2, r.3)), Some((0x200, 300)));
    let (_, c) = import(&mut s, FileId::Cd as u8, 0, false, &cd);
    assert_eq!(c.map(|r| (r.2, r.3)), Some((0x400, 600)));

    // Nothing reaches flash while staging.
    assert_eq!(s.flash().erase_count(), 0);
    assert_eq!(s.flash().program_count(), 0);

    let image = s.page().image();
    assert_eq!(&image[..DAC_DER.len()], DAC_DER);
    assert!(image[DAC_DER.len()..0x200].iter().all(|&b| b == 0xFF));
    assert_eq!(&image[0x200..0x200 + 300], &pai[..]);
    assert_eq!(&image[0x400..0x400 + 600], &cd[..]);

    assert_eq!(s.store().read_u32(keys::PAI_OFFSET).unwrap(), 0x200);
    assert_eq!(s.store().read_u32(keys::CD_SIZE).unwrap(), 600);
    assert!(s.store().read_u32(keys::CREDS_BASE_ADDR).is_err());

    // Re-import the CD with the commit flag.
    let (code, _) = import(&mut s, FileId::Cd as u8, 0, true, &cd);
    assert_eq!(code, 0);
    assert_eq!(s.flash().erase_count(), 1);
    assert_eq!(s.flash().program_count(), 1);
    assert_eq!(s.store().read_u32(keys::CREDS_BASE_ADDR).unwrap(), PAGE_BASE);

    let mut readback = vec![0u8; 0x800];
    s.flash().read(PAGE_BASE, &mut readback).unwrap();
    assert_eq!(readback, s.page().image());
}

#[test]
fn dac_serial_becomes_device_serial() {
    let mut s = session();
    assert_eq!(import(&mut s, FileId::Dac as u8, 0, false, DAC_DER).0, 0);

    let mut buf = [0u8; 32];
    let n = s.store().read_binary(keys::SERIAL_NUMBER, Some(&mut buf)).unwrap();
    assert_eq!(&buf[..n], &[0x3A, 0x7C, 0x91, 0xD2, 0x4E, 0x0B, 0x5F, 0x68]);
}

#[test]
fn unparseable_dac_is_not_staged() {
    let mut s = session();
    let (code, _) = import(&mut s, FileId::Dac as u8, 0, false, &[0x04, 0x02, 0xAA, 0xBB]);
    assert_eq!(code, ProvisionError::CertParse.code());
    assert!(s.store().read_u32(keys::DAC_SIZE).is_err());
    assert!(s.page().image().iter().all(|&b| b == 0xFF));
}

#[test]
fn unknown_file_ids_are_rejected() {
    let mut s = session();
    for file in [0u8, 5, 0xFF] {
        let (code, fields) = import(&mut s, file, 0, true, &[1, 2, 3]);
        assert_eq!(code, ProvisionError::InvalidFileId(file).code());
        assert_eq!(fields, None);
    }
    assert_eq!(s.flash().erase_count(), 0);
}

#[test]
fn oversized_file_does_not_fit_its_slot() {
    let mut s = session();
    let (code, _) = import(&mut s, FileId::Pai as u8, 0, false, &[0u8; 513]);
    assert_eq!(code, ProvisionError::BufferTooSmall.code());
}

#[test]
fn key_import_adopts_key_id() {
    let mut s = session();
    let (code, fields) = import(&mut s, FileId::Key as u8, 0x77, false, DEVICE_KEY_DER);
    assert_eq!(code, 0);
    assert_eq!(fields, Some((0x77, PAGE_BASE, 0, 0)));

    let mut scalar = vec![0x1F, 0x2E, 0x3D, 0x4C, 0x5B, 0x6A, 0x79, 0x88];
    scalar.extend(1u8..=0x18);
    assert_eq!(
        s.keystore().calls,
        vec![KeyCall::Destroy(0x77), KeyCall::Import { id: 0x77, scalar }]
    );
    assert_eq!(s.key_manager().key_id(), 0x77);
    assert_eq!(s.store().read_u32(keys::CREDS_KEY_ID).unwrap(), 0x77);
}

#[test]
fn key_import_never_touches_the_page() {
    let mut s = session();
    let (code, fields) = import(&mut s, FileId::Key as u8, 0, true, DEVICE_KEY_DER);
    assert_eq!(code, 0);
    assert_eq!(fields, Some((0x4D31, PAGE_BASE, 0, 0)));
    assert_eq!(s.flash().erase_count(), 0);
    assert_eq!(s.flash().program_count(), 0);
    assert!(s.store().read_u32(keys::CREDS_BASE_ADDR).is_err());
}

#[test]
fn key_import_keeps_committed_certificates() {
    let mut s = session();
    assert_eq!(import(&mut s, FileId::Dac as u8, 0, true, DAC_DER).0, 0);
    assert_eq!(s.flash().erase_count(), 1);

    assert_eq!(import(&mut s, FileId::Key as u8, 0, true, DEVICE_KEY_DER).0, 0);
    assert_eq!(s.flash().erase_count(), 1);
    assert_eq!(s.flash().program_count(), 1);
    let mut head = vec![0u8; DAC_DER.len()];
    s.flash().read(PAGE_BASE, &mut head).unwrap();
    assert_eq!(head, DAC_DER);
}

#[test]
fn malformed_key_leaves_existing_key_alone() {
    let mut s = session();
    assert_eq!(import(&mut s, FileId::Key as u8, 0, false, DEVICE_KEY_DER).0, 0);
    s.keystore_mut().calls.clear();

    let (code, _) = import(&mut s, FileId::Key as u8, 0, false, &[0x30, 0x03, 0x02, 0x01, 0x01]);
    assert_eq!(code, ProvisionError::Crypto(CryptoError::MalformedKey).code());
    assert!(s.keystore().calls.is_empty());
    assert!(s.keystore().holds(0x4D31));
}
