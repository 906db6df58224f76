//! Session setup from a station profile.

use factory_provision::adapters::flash::SimFlash;
use factory_provision::adapters::nvs::NvsAdapter;
use factory_provision::config::ProvisionConfig;
use factory_provision::error::{ProvisionError, StorageError};

use crate::mock_hw::{CountingCrypto, MockKeyStore, MockSession, PAGE_BASE};

const PROFILE: &str = r#"{"default_key_id":7,"credentials_address":1040384,
    "key_ranges":{"protocol":{"lo":553472,"hi":557055},
    "allowed":{"lo":553472,"hi":554239}}}"#;

fn open(json: &str) -> Result<MockSession, ProvisionError> {
    MockSession::from_profile(
        NvsAdapter::new(),
        MockKeyStore::new(),
        SimFlash::new(PAGE_BASE, 1),
        CountingCrypto::default(),
        json,
    )
}

#[test]
fn profile_is_applied_and_persisted() {
    let s = open(PROFILE).unwrap();
    assert_eq!(s.key_manager().key_id(), 7);
    assert_eq!(s.page().address(), PAGE_BASE);

    let stored = ProvisionConfig::load(s.store()).unwrap();
    assert_eq!(stored.as_ref(), Some(s.config()));
}

#[test]
fn bad_profiles_are_rejected() {
    let corrupted = Some(ProvisionError::Storage(StorageError::Corrupted));
    assert_eq!(open("{").err(), corrupted);
    let zero = PROFILE.replace("\"default_key_id\":7", "\"default_key_id\":0");
    assert_eq!(open(&zero).err(), corrupted);
}
