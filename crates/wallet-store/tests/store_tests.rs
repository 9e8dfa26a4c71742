//! Integration tests for the encrypted wallet store.
//!
//! Tests cover:
//!  1. Round trip of every schema key, sensitive or not
//!  2. Wrong password never opens
//!  3. Interrupted writes leave the previous file intact
//!  4. Schema enforcement leaves the file byte-for-byte unchanged
//!  5. Secrets never appear in the raw file
//!  6. Close / reopen scenario
//!  7. Tampering detection, outer record and single sealed fields
//!  8. Authenticated but malformed records

use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use wallet_store::{atomic, cipher, kdf};
use wallet_store::schema::{self, GAP_LIMIT, MNEMONIC, PASSWORD_HASH};
use wallet_store::{Password, Retention, SecretStore, StoreError, Updates};

const PASSWORD: &str = "correct-horse";

fn create_store(dir: &Path) -> (SecretStore, PathBuf) {
    let path = dir.join("wallet.dat");
    fs::write(&path, b"").unwrap();
    let store = SecretStore::open(&path, &mut Password::from(PASSWORD)).unwrap();
    (store, path)
}

fn wallet_key() -> kdf::DerivedKey {
    kdf::derive(&mut Password::from(PASSWORD), Retention::Erase)
}

/// Decrypt the outer record, let `edit` change it, and seal it back in place.
fn rewrite_record(path: &Path, edit: impl FnOnce(&mut Map<String, Value>)) {
    let key = wallet_key();
    let token = fs::read_to_string(path).unwrap();
    let plaintext = cipher::decrypt(&key, &token).unwrap();
    let mut record: Map<String, Value> = serde_json::from_slice(&plaintext).unwrap();
    edit(&mut record);
    let sealed = cipher::encrypt(&key, &serde_json::to_vec(&record).unwrap()).unwrap();
    fs::write(path, sealed).unwrap();
}

fn sample_value(key: &str) -> Value {
    match key {
        "MNEMONIC" => json!("abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"),
        "XPRIV" => json!("xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"),
        "XPUB" => json!("xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"),
        "PATH" => json!("m/84'/0'/0'"),
        "GAP_LIMIT" => json!(20),
        "SEGWIT" => json!(true),
        "ADDRESSES_RECEIVING" | "ADDRESSES_CHANGE" | "ADDRESSES_USED" => {
            json!(["bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"])
        }
        "ADDRESS_BALS" => json!({"bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq": [1500, 0]}),
        "TXNS" => json!([{"txid": "ab12", "value": -2500, "confirmations": 3}]),
        "PRICE" => json!(64123.55),
        "WALLET_BAL" => json!([1500, 0]),
        "UNSPENT_OUTS" => json!([{"txid": "ab12", "vout": 1, "value": 1500}]),
        "PASSWORD_HASH" => json!("00ff"),
        "ADDRESS_WIF_KEYS" => {
            json!({"bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq": "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"})
        }
        other => panic!("no sample for {other}"),
    }
}

#[test]
fn every_schema_key_round_trips() {
    let dir = tempdir().unwrap();
    let (mut store, _) = create_store(dir.path());
    for key in schema::keys() {
        let value = sample_value(key);
        let updates: Updates = [(key, value.clone())].into_iter().collect();
        store.write_values(updates, false).unwrap();
        assert_eq!(store.get_value(key).unwrap(), value, "{key}");
    }
}

#[test]
fn wrong_password_never_opens() {
    let dir = tempdir().unwrap();
    let (store, path) = create_store(dir.path());
    drop(store);
    for wrong in ["wrong-horse", "", "correct-horse ", "CORRECT-HORSE"] {
        let err = SecretStore::open(&path, &mut Password::from(wrong)).unwrap_err();
        assert!(matches!(err, StoreError::IncorrectPassword), "{wrong:?}");
    }
}

#[test]
fn scenario_close_and_reopen() {
    let dir = tempdir().unwrap();
    let (mut store, path) = create_store(dir.path());
    store.write_value(GAP_LIMIT, &20).unwrap();
    store.close();

    let reopened = SecretStore::open(&path, &mut Password::from(PASSWORD)).unwrap();
    assert_eq!(reopened.get_value(GAP_LIMIT).unwrap(), json!(20));
    assert!(reopened.check_password());

    let err = SecretStore::open(&path, &mut Password::from("wrong-horse")).unwrap_err();
    assert!(matches!(err, StoreError::IncorrectPassword));
}

#[test]
fn schema_violations_leave_file_untouched() {
    let dir = tempdir().unwrap();
    let (mut store, path) = create_store(dir.path());
    let before = fs::read(&path).unwrap();

    let err = store.write_value("NOT_A_KEY", &1).unwrap_err();
    assert!(matches!(err, StoreError::UnknownKey(_)));
    assert_eq!(fs::read(&path).unwrap(), before);

    let err = store.write_value(GAP_LIMIT, "five").unwrap_err();
    assert!(matches!(err, StoreError::TypeMismatch { .. }));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn mnemonic_never_hits_disk_in_clear() {
    let dir = tempdir().unwrap();
    let (mut store, path) = create_store(dir.path());
    let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon zoo";
    store.write_value(MNEMONIC, phrase).unwrap();

    let raw = fs::read(&path).unwrap();
    assert!(!raw.windows(b"abandon".len()).any(|w| w == b"abandon"));
    assert_eq!(store.get_as::<String>(MNEMONIC).unwrap(), phrase);
}

#[test]
fn interrupted_write_keeps_previous_file() {
    let dir = tempdir().unwrap();
    let (mut store, path) = create_store(dir.path());
    store.write_value(GAP_LIMIT, &20).unwrap();
    let before = fs::read(&path).unwrap();

    // Interrupted before the rename: the target is untouched.
    let staged = atomic::stage(&path, b"half-written garbage").unwrap();
    assert_eq!(fs::read(&path).unwrap(), before);
    drop(staged);
    assert_eq!(fs::read(&path).unwrap(), before);

    // A crash leaves the temp file behind; the next open removes it.
    let orphan = dir.path().join(".wallet.dat.5f1c2a.tmp");
    fs::write(&orphan, b"half-written garbage").unwrap();
    store.close();

    let reopened = SecretStore::open(&path, &mut Password::from(PASSWORD)).unwrap();
    assert_eq!(reopened.get_value(GAP_LIMIT).unwrap(), json!(20));
    assert!(!orphan.exists());
}

#[test]
fn committed_write_is_complete() {
    let dir = tempdir().unwrap();
    let (store, path) = create_store(dir.path());
    drop(store);

    let staged = atomic::stage(&path, b"replacement").unwrap();
    staged.commit().unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"replacement");
}

#[test]
fn tampered_file_reads_as_incorrect_password() {
    let dir = tempdir().unwrap();
    let (store, path) = create_store(dir.path());
    drop(store);

    let mut raw = fs::read(&path).unwrap();
    let mid = raw.len() / 2;
    raw[mid] = if raw[mid] == b'A' { b'B' } else { b'A' };
    fs::write(&path, &raw).unwrap();

    let err = SecretStore::open(&path, &mut Password::from(PASSWORD)).unwrap_err();
    assert!(matches!(err, StoreError::IncorrectPassword));
}

#[test]
fn outer_corruption_after_open_is_authentication_failure() {
    let dir = tempdir().unwrap();
    let (store, path) = create_store(dir.path());
    fs::write(&path, b"garbage").unwrap();
    assert!(!store.check_password());
    assert!(matches!(
        store.get_value(GAP_LIMIT),
        Err(StoreError::AuthenticationFailure)
    ));
}

#[test]
fn preserved_password_opens_a_second_store() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("a.dat");
    let second = dir.path().join("b.dat");

    let mut pw = Password::from(PASSWORD);
    let _a = SecretStore::create(&first, &mut pw, Retention::Preserve).unwrap();
    assert_eq!(pw.as_bytes(), PASSWORD.as_bytes());
    let b = SecretStore::create(&second, &mut pw, Retention::Erase).unwrap();
    assert!(pw.is_erased());
    assert!(b.validate_password(&mut Password::from(PASSWORD)).unwrap());
}

#[test]
fn reopen_refreshes_password_hash() {
    let dir = tempdir().unwrap();
    let (mut store, path) = create_store(dir.path());
    store.write_value(PASSWORD_HASH, "stale").unwrap();
    store.close();

    let reopened = SecretStore::open(&path, &mut Password::from(PASSWORD)).unwrap();
    assert!(reopened
        .validate_password(&mut Password::from(PASSWORD))
        .unwrap());
}

#[test]
fn tampered_sealed_field_fails_alone() {
    let dir = tempdir().unwrap();
    let (mut store, path) = create_store(dir.path());
    store.write_value(MNEMONIC, "abandon ability able about").unwrap();

    rewrite_record(&path, |record| {
        let token = record[MNEMONIC].as_str().unwrap().to_string();
        let mut chars: Vec<char> = token.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        record.insert(MNEMONIC.to_string(), Value::String(chars.into_iter().collect()));
    });

    assert!(matches!(
        store.get_value(MNEMONIC),
        Err(StoreError::AuthenticationFailure)
    ));
    assert_eq!(store.get_value(GAP_LIMIT).unwrap(), json!(0));
    assert!(store.check_password());

    store.close();
    let reopened = SecretStore::open(&path, &mut Password::from(PASSWORD)).unwrap();
    assert!(matches!(
        reopened.get_value(MNEMONIC),
        Err(StoreError::AuthenticationFailure)
    ));
}

#[test]
fn unsealed_sensitive_slot_is_authentication_failure() {
    let dir = tempdir().unwrap();
    let (store, path) = create_store(dir.path());
    rewrite_record(&path, |record| {
        record.insert(MNEMONIC.to_string(), json!(42));
    });

    assert!(matches!(
        store.get_value(MNEMONIC),
        Err(StoreError::AuthenticationFailure)
    ));
    assert!(store.check_password());
}

#[test]
fn authenticated_non_json_record_is_serialization_failure() {
    let dir = tempdir().unwrap();
    let (store, path) = create_store(dir.path());
    let sealed = cipher::encrypt(&wallet_key(), b"not a json record").unwrap();
    fs::write(&path, sealed).unwrap();

    assert!(matches!(
        store.get_value(GAP_LIMIT),
        Err(StoreError::SerializationFailure(_))
    ));
    drop(store);

    let err = SecretStore::open(&path, &mut Password::from(PASSWORD)).unwrap_err();
    assert!(matches!(err, StoreError::SerializationFailure(_)));
}
