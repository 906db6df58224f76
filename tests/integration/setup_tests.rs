//! Setup: factory identity, hash-derived defaults and the onboarding payload.

use factory_provision::error::{ProvisionError, StorageError};
use factory_provision::provision::config_store::keys;
use factory_provision::provision::onboarding::rendezvous;
use factory_provision::rpc::codec::Frame;
use factory_provision::rpc::engine::Dispatcher;

use crate::mock_hw::{open_response, request, session, MockSession, DAC_DER};

const SETUP: u8 = 4;
const GOLDEN: [u8; 11] = [0xF0, 0x57, 0xA6, 0x91, 0x40, 0x80, 0x57, 0x2B, 0x9A, 0xB7, 0x0E];

struct Setup<'a> {
    serial: &'a str,
    unique_id: &'a [u8],
    discriminator: u16,
}

fn setup_frame(p: &Setup<'_>) -> Frame {
    let mut f = request(SETUP);
    f.add_u16(0xCAFE).unwrap();
    f.add_string("Acme").unwrap();
    f.add_u16(0x1234).unwrap();
    f.add_string("Widget").unwrap();
    f.add_u16(3).unwrap();
    f.add_string(p.serial).unwrap();
    f.add_string("2026-01-15").unwrap();
    f.add_bytes(p.unique_id).unwrap();
    f.add_u8(0).unwrap();
    f.add_u8(rendezvous::BLE).unwrap();
    f.add_u16(p.discriminator).unwrap();
    f.add_u32(123_456_789).unwrap();
    f.add_u32(1000).unwrap();
    f.add_bytes(&[0x11; 16]).unwrap();
    f.add_bytes(&[0x22; 97]).unwrap();
    f
}

struct Reply {
    passcode: u32,
    discriminator: u16,
    unique_id: Vec<u8>,
    payload: Vec<u8>,
}

fn run(s: &mut MockSession, p: &Setup<'_>) -> Result<Reply, i32> {
    let mut d: Dispatcher = Dispatcher::new();
    d.handle(setup_frame(p).as_bytes(), s).unwrap();
    let (mut r, code) = open_response(d.response(), SETUP);
    if code != 0 {
        return Err(code);
    }
    let passcode = r.get_u32().unwrap();
    let discriminator = r.get_u16().unwrap();
    let unique_id = r.get_vec::<32>().unwrap().to_vec();
    let payload = r.get_vec::<11>().unwrap().to_vec();
    assert_eq!(r.remaining(), 0);
    Ok(Reply {
        passcode,
        discriminator,
        unique_id,
        payload,
    })
}

#[test]
fn golden_payload_with_explicit_values() {
    let mut s = session();
    let reply = run(
        &mut s,
        &Setup {
            serial: "SN-0001",
            unique_id: &[0x42; 16],
            discriminator: 0xABC,
        },
    )
    .unwrap();

    assert_eq!(reply.passcode, 123_456_789);
    assert_eq!(reply.discriminator, 0xABC);
    assert_eq!(reply.unique_id, vec![0x42; 16]);
    assert_eq!(reply.payload, GOLDEN);
    // Neither default was needed, so nothing was hashed.
    assert_eq!(s.crypto().hashes(), 0);

    let store = s.store();
    let mut buf = [0u8; 16];
    let n = store.read_binary(keys::SETUP_PAYLOAD, Some(&mut buf)).unwrap();
    assert_eq!(&buf[..n], &GOLDEN);
    assert_eq!(store.read_u16(keys::VENDOR_ID).unwrap(), 0xCAFE);
    assert_eq!(store.read_u16(keys::HW_VERSION).unwrap(), 3);
    assert_eq!(store.read_u32(keys::SPAKE2P_ITERATIONS).unwrap(), 1000);
    assert_eq!(store.read_binary(keys::SPAKE2P_VERIFIER, None).unwrap(), 97);
    let n = store.read_string(keys::PRODUCT_NAME, Some(&mut buf)).unwrap();
    assert_eq!(&buf[..n], b"Widget");
    assert_eq!(store.read_counter(keys::SETUP_GENERATION).unwrap(), 1);
}

#[test]
fn defaults_share_one_hash() {
    let mut s = session();
    let reply = run(
        &mut s,
        &Setup {
            serial: "SN-0001",
            unique_id: &[],
            discriminator: 0xFFFF,
        },
    )
    .unwrap();

    assert_eq!(s.crypto().hashes(), 1);
    assert_eq!(reply.discriminator, 0x92B);
    assert_eq!(
        reply.unique_id,
        [
            0x3F, 0x41, 0x21, 0x28, 0x0D, 0xAE, 0x21, 0x69, 0x13, 0x5B, 0x90, 0x90, 0xBB, 0xD6,
            0xF4, 0xD4
        ]
    );
    assert_eq!(s.store().read_u16(keys::SETUP_DISCRIMINATOR).unwrap(), 0x92B);
}

#[test]
fn defaults_fall_back_to_dac_serial() {
    let mut s = session();
    let mut d: Dispatcher = Dispatcher::new();
    let mut f = request(3);
    f.add_u8(2).unwrap();
    f.add_u32(0).unwrap();
    f.add_u8(0).unwrap();
    f.add_bytes(DAC_DER).unwrap();
    assert!(d.handle(f.as_bytes(), &mut s).unwrap().is_ok());

    let reply = run(
        &mut s,
        &Setup {
            serial: "",
            unique_id: &[],
            discriminator: 0x1000,
        },
    )
    .unwrap();
    assert_eq!(reply.discriminator, 0x9ED);
    assert_eq!(&reply.unique_id[..4], &[0x76, 0x70, 0x0F, 0x64]);
}

#[test]
fn missing_serial_fails_without_rollback() {
    let mut s = session();
    let code = run(
        &mut s,
        &Setup {
            serial: "",
            unique_id: &[],
            discriminator: 0x100,
        },
    )
    .err();
    assert_eq!(code, Some(ProvisionError::Storage(StorageError::NotFound).code()));
    // Fields written before the failure stay written.
    assert_eq!(s.store().read_u16(keys::VENDOR_ID).unwrap(), 0xCAFE);
    assert!(s.store().read_binary(keys::SETUP_PAYLOAD, None).is_err());
}

#[test]
fn every_setup_bumps_the_generation() {
    let mut s = session();
    let p = Setup {
        serial: "SN-0002",
        unique_id: &[1; 8],
        discriminator: 0x123,
    };
    run(&mut s, &p).unwrap();
    run(&mut s, &p).unwrap();
    assert_eq!(s.store().read_counter(keys::SETUP_GENERATION).unwrap(), 2);
}
