//! Fixture builders shared by unit tests: keyed archives, RNCryptor
//! containers, and the outer backup wrapping.

use std::rc::Rc;

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use plist::{Dictionary, Uid, Value};
use rand::RngCore;

use crate::archive::value::{Decoded, Fields};
use crate::backup::OUTER_KEY_SEED;
use crate::crypto::cipher::derive_key;
use crate::crypto::container::PBKDF2_ITERATIONS;
use crate::crypto::integrity::{hmac_sha256, pbkdf2_sha1};

pub fn encrypt_aes_cbc(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0u8; plaintext.len() + 16];
    buffer[..plaintext.len()].copy_from_slice(plaintext);
    let len = cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
        .expect("key and iv should be valid")
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, plaintext.len())
        .expect("buffer should have room for padding")
        .len();
    buffer.truncate(len);
    buffer
}

/// Seals `plaintext` into an RNCryptor v3 container with random salts and IV.
pub fn seal_container(plaintext: &[u8], password: &str) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut encryption_salt = [0u8; 8];
    let mut hmac_salt = [0u8; 8];
    let mut iv = [0u8; 16];
    rng.fill_bytes(&mut encryption_salt);
    rng.fill_bytes(&mut hmac_salt);
    rng.fill_bytes(&mut iv);

    let encryption_key = pbkdf2_sha1(password.as_bytes(), &encryption_salt, PBKDF2_ITERATIONS);
    let hmac_key = pbkdf2_sha1(password.as_bytes(), &hmac_salt, PBKDF2_ITERATIONS);

    let mut data = vec![3u8, 1u8];
    data.extend_from_slice(&encryption_salt);
    data.extend_from_slice(&hmac_salt);
    data.extend_from_slice(&iv);
    data.extend_from_slice(&encrypt_aes_cbc(plaintext, &encryption_key, &iv));
    let tag = hmac_sha256(&hmac_key, &data);
    data.extend_from_slice(&tag);
    data
}

/// Applies the fixed application-key encryption that wraps every backup file.
pub fn wrap_outer(archive: &[u8]) -> Vec<u8> {
    encrypt_aes_cbc(archive, &derive_key(OUTER_KEY_SEED), &[0u8; 16])
}

pub fn uid(index: u64) -> Value {
    Value::Uid(Uid::new(index))
}

pub fn string(text: &str) -> Value {
    Value::String(text.to_string())
}

pub fn int(number: i64) -> Value {
    Value::Integer(number.into())
}

pub fn dict(entries: &[(&str, Value)]) -> Value {
    let mut dictionary = Dictionary::new();
    for (key, value) in entries {
        dictionary.insert((*key).to_string(), value.clone());
    }
    Value::Dictionary(dictionary)
}

/// A `$classes`/`$classname` descriptor object.
pub fn class(name: &str) -> Value {
    dict(&[
        ("$classes", Value::Array(vec![string(name), string("NSObject")])),
        ("$classname", string(name)),
    ])
}

/// Serializes a binary keyed archive rooted at object 1.
pub fn keyed_archive(objects: Vec<Value>) -> Vec<u8> {
    document(objects, "NSKeyedArchiver", Some(uid(1)))
}

pub fn document(objects: Vec<Value>, archiver: &str, root: Option<Value>) -> Vec<u8> {
    let mut top = Dictionary::new();
    if let Some(root) = root {
        top.insert("root".to_string(), root);
    }
    let mut document = Dictionary::new();
    document.insert("$version".to_string(), int(100_000));
    document.insert("$archiver".to_string(), string(archiver));
    document.insert("$top".to_string(), Value::Dictionary(top));
    document.insert("$objects".to_string(), Value::Array(objects));

    let mut bytes = Vec::new();
    Value::Dictionary(document)
        .to_writer_binary(&mut bytes)
        .expect("plist should serialize");
    bytes
}

pub fn map(entries: &[(&str, Decoded)]) -> Decoded {
    let fields: Fields = entries
        .iter()
        .map(|(key, value)| ((*key).to_string(), Rc::new(value.clone())))
        .collect();
    Decoded::Map(fields)
}

/// Inner backup payload: two folders, one with a TOTP and a HOTP account and
/// one empty. Account 1 spells its type as a string to exercise both enum
/// input forms.
pub fn backup_payload() -> Vec<u8> {
    keyed_archive(vec![
        string("$null"),
        // 1: root dictionary
        dict(&[
            ("NS.keys", Value::Array(vec![uid(2)])),
            ("NS.objects", Value::Array(vec![uid(3)])),
            ("$class", uid(4)),
        ]),
        string("Folders"),
        // 3: folder list
        dict(&[("NS.objects", Value::Array(vec![uid(5), uid(13)])), ("$class", uid(6))]),
        class("NSDictionary"),
        // 5: first folder
        dict(&[("name", string("Work")), ("accounts", uid(7)), ("$class", uid(8))]),
        class("NSArray"),
        dict(&[("NS.objects", Value::Array(vec![uid(9), uid(11)])), ("$class", uid(6))]),
        class("ACOTPFolder"),
        // 9: TOTP account
        dict(&[
            ("secret", uid(10)),
            ("label", string("alice@example.com")),
            ("issuer", string("GitHub")),
            ("type", string("totp")),
            ("algorithm", int(2)),
            ("digits", int(8)),
            ("period", int(60)),
            ("$class", uid(12)),
        ]),
        Value::Data(b"Hello!\xde\xad\xbe\xef".to_vec()),
        // 11: HOTP account relying on defaults
        dict(&[
            ("secret", Value::Data(b"12345678901234567890".to_vec())),
            ("label", string("bob")),
            ("type", int(1)),
            ("counter", int(7)),
            ("$class", uid(12)),
        ]),
        class("ACOTPAccount"),
        // 13: empty folder
        dict(&[("name", string("Personal")), ("$class", uid(8))]),
    ])
}
