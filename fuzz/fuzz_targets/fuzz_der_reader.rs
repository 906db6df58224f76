//! Fuzz target: DER reader, private-key search and certificate parsing
//!
//! cargo fuzz run fuzz_der_reader

#![no_main]

use factory_provision::adapters::crypto::SoftCrypto;
use factory_provision::app::ports::{CryptoPort, MAX_SERIAL_LEN};
use factory_provision::provision::der::DerReader;
use factory_provision::provision::keys::{find_private_scalar, PRIVATE_SCALAR_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for tlv in DerReader::new(data).flatten() {
        assert!(tlv.value.len() <= data.len());
        if tlv.is_constructed() {
            for child in tlv.children().flatten() {
                assert!(child.value.len() <= tlv.value.len());
            }
        }
    }

    if let Some(scalar) = find_private_scalar(data) {
        assert_eq!(scalar.len(), PRIVATE_SCALAR_LEN);
    }

    if let Some(info) = SoftCrypto::new().parse_x509(data) {
        assert!(info.serial.len() <= MAX_SERIAL_LEN);
    }
});
