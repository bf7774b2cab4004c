//! End-to-end decoding of an authenticator backup file.
//!
//! A backup is encrypted twice. The file itself is AES-256-CBC under a key
//! fixed by the application; inside is a keyed archive whose `WrappedData`
//! field holds an RNCryptor container sealed with the user's password. That
//! container decrypts to a second keyed archive listing the folders.

use std::collections::BTreeMap;

use log::{debug, info};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::archive::{ArchiveError, TypeRegistry, Unarchiver};
use crate::crypto::cipher::{decrypt_aes_cbc, derive_key, CipherError, IV_SIZE};
use crate::crypto::container::{self, ContainerError};
use crate::otp::{self, AccountError, Folder};

/// Hashed with SHA-256 to form the outer wrapping key.
pub const OUTER_KEY_SEED: &[u8] = b"Authenticator";
pub const WRAPPED_DATA_FIELD: &str = "WrappedData";
pub const FOLDERS_FIELD: &str = "Folders";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup archive has no usable {0} field")]
    MissingField(&'static str),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Account(#[from] AccountError),
}

/// Removes the application-key layer and returns the password container.
pub fn unwrap_outer(file_bytes: &[u8]) -> Result<Vec<u8>, BackupError> {
    let archive = decrypt_aes_cbc(file_bytes, &derive_key(OUTER_KEY_SEED), &[0u8; IV_SIZE])?;
    let root = Unarchiver::parse(&archive)?.unarchive()?;
    let wrapped = root
        .get(WRAPPED_DATA_FIELD)
        .and_then(|value| value.as_bytes())
        .ok_or(BackupError::MissingField(WRAPPED_DATA_FIELD))?;
    debug!("unwrapped {} byte password container", wrapped.len());
    Ok(wrapped.to_vec())
}

/// Builds the registry used for the inner archive: Foundation classes plus
/// the account and folder records.
pub fn payload_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::with_builtins();
    otp::register_types(&mut registry);
    registry
}

/// Decodes an already-decrypted inner archive into folders keyed by name.
/// A later folder with a duplicate name replaces the earlier one.
pub fn decode_payload(archive: &[u8]) -> Result<BTreeMap<String, Folder>, BackupError> {
    let root = Unarchiver::with_registry(archive, payload_registry())?.unarchive()?;
    let folders = root
        .get(FOLDERS_FIELD)
        .and_then(|value| value.as_list())
        .ok_or(BackupError::MissingField(FOLDERS_FIELD))?;

    let mut by_name = BTreeMap::new();
    for raw in folders {
        let folder = Folder::from_decoded(raw)?;
        debug!("folder {:?}: {} accounts", folder.name, folder.accounts.len());
        by_name.insert(folder.name.clone(), folder);
    }
    Ok(by_name)
}

/// Runs the whole pipeline over the raw bytes of a backup file.
pub fn decode_backup(
    file_bytes: &[u8],
    password: &str,
) -> Result<BTreeMap<String, Folder>, BackupError> {
    let wrapped = unwrap_outer(file_bytes)?;
    let archive = Zeroizing::new(container::decrypt(&wrapped, password)?);
    let folders = decode_payload(&archive)?;
    info!(
        "decoded {} folders, {} accounts",
        folders.len(),
        folders.values().map(|folder| folder.accounts.len()).sum::<usize>()
    );
    Ok(folders)
}

#[cfg(test)]
mod tests {
    use plist::Value;

    use super::{decode_backup, decode_payload, unwrap_outer, BackupError};
    use crate::crypto::container::ContainerError;
    use crate::otp::{AccountError, AccountType, Algorithm, UriBuilder};
    use crate::testing::{
        backup_payload, class, dict, int, keyed_archive, seal_container, string, uid, wrap_outer,
    };

    fn outer_archive(wrapped: Vec<u8>) -> Vec<u8> {
        keyed_archive(vec![
            string("$null"),
            dict(&[("WrappedData", uid(2)), ("Version", Value::Real(1.1))]),
            Value::Data(wrapped),
        ])
    }

    fn backup_file(password: &str) -> Vec<u8> {
        let container = seal_container(&backup_payload(), password);
        wrap_outer(&outer_archive(container))
    }

    #[test]
    fn decodes_full_backup() {
        let folders = decode_backup(&backup_file("correct horse"), "correct horse")
            .expect("backup should decode");
        assert_eq!(folders.keys().collect::<Vec<_>>(), ["Personal", "Work"]);
        assert!(folders["Personal"].accounts.is_empty());

        let work = &folders["Work"].accounts;
        assert_eq!(work.len(), 2);
        assert_eq!(work[0].label, "alice@example.com");
        assert_eq!(work[0].kind, AccountType::Totp);
        assert_eq!(work[0].algorithm, Algorithm::Sha256);
        assert_eq!((work[0].digits, work[0].period), (8, 60));
        assert_eq!(work[0].secret, b"Hello!\xde\xad\xbe\xef");

        assert_eq!(work[1].kind, AccountType::Hotp);
        assert_eq!(work[1].algorithm, Algorithm::Unknown);
        assert_eq!((work[1].digits, work[1].period, work[1].counter), (6, 30, 7));
        assert_eq!(work[1].issuer, None);
    }

    #[test]
    fn decoded_accounts_render_uris() {
        let folders = decode_backup(&backup_file("pw"), "pw").expect("backup should decode");
        let builder = UriBuilder::default();
        let uris: Vec<String> = folders["Work"].accounts.iter().map(|a| builder.uri(a)).collect();
        assert_eq!(
            uris[0],
            "otpauth://totp/GitHub%3Aalice%40example.com\
             ?secret=JBSWY3DPEHPK3PXP&algorithm=sha256&period=60&digits=8&issuer=GitHub&counter=0"
        );
        assert_eq!(
            uris[1],
            "otpauth://hotp/bob\
             ?secret=GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ&algorithm=sha1&period=30&digits=6&counter=7"
        );
    }

    #[test]
    fn wrong_password_is_authentication_failure() {
        let err = decode_backup(&backup_file("right"), "hunter2").unwrap_err();
        assert!(matches!(
            err,
            BackupError::Container(ContainerError::AuthenticationFailed)
        ));
        assert!(!format!("{err}").contains("hunter2"), "error text must not echo the password");
    }

    #[test]
    fn unwrap_outer_returns_container_bytes() {
        let file = wrap_outer(&outer_archive(vec![3, 1, 2, 3]));
        assert_eq!(unwrap_outer(&file).expect("outer layer should unwrap"), vec![3, 1, 2, 3]);
    }

    #[test]
    fn missing_wrapped_data() {
        let archive = keyed_archive(vec![string("$null"), dict(&[("Version", Value::Real(1.1))])]);
        let err = unwrap_outer(&wrap_outer(&archive)).unwrap_err();
        assert!(matches!(err, BackupError::MissingField("WrappedData")));
    }

    #[test]
    fn outer_layer_must_be_block_aligned() {
        let err = unwrap_outer(&[0u8; 17]).unwrap_err();
        assert!(matches!(err, BackupError::Cipher(_)));
    }

    #[test]
    fn duplicate_folder_names_keep_the_last() {
        let archive = keyed_archive(vec![
            string("$null"),
            dict(&[("Folders", uid(2))]),
            dict(&[("NS.objects", Value::Array(vec![uid(4), uid(5)])), ("$class", uid(3))]),
            class("NSArray"),
            dict(&[("name", string("Same")), ("$class", uid(6))]),
            dict(&[("name", string("Same")), ("accounts", uid(7)), ("$class", uid(6))]),
            class("ACOTPFolder"),
            dict(&[("NS.objects", Value::Array(vec![uid(8)])), ("$class", uid(3))]),
            dict(&[("label", string("kept")), ("$class", uid(9))]),
            class("ACOTPAccount"),
        ]);
        let folders = decode_payload(&archive).expect("payload should decode");
        assert_eq!(folders.len(), 1);
        assert_eq!(folders["Same"].accounts[0].label, "kept");
    }

    #[test]
    fn payload_without_folders() {
        let archive = keyed_archive(vec![string("$null"), dict(&[("Other", string("x"))])]);
        let err = decode_payload(&archive).unwrap_err();
        assert!(matches!(err, BackupError::MissingField("Folders")));
    }

    #[test]
    fn bad_enum_code_aborts_the_decode() {
        let archive = keyed_archive(vec![
            string("$null"),
            dict(&[("Folders", Value::Array(vec![uid(2)]))]),
            dict(&[("accounts", Value::Array(vec![uid(3)])), ("$class", uid(4))]),
            dict(&[("type", int(7)), ("$class", uid(5))]),
            class("ACOTPFolder"),
            class("ACOTPAccount"),
        ]);
        let err = decode_payload(&archive).unwrap_err();
        assert!(matches!(
            err,
            BackupError::Account(AccountError::EnumRange { field: "type", code: 7 })
        ));
    }
}
