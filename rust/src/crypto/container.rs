//! RNCryptor v3 password containers.
//!
//! Layout: `[version:1][options:1][encryption salt:8][hmac salt:8][iv:16][ciphertext][hmac:32]`.
//! The HMAC covers everything before the tag and is checked before any
//! ciphertext is decrypted, so a wrong password never yields plaintext.

use log::debug;
use thiserror::Error;
use zeroize::Zeroize;

use super::cipher::{decrypt_aes_cbc, CipherError, IV_SIZE};
use super::integrity::{hmac_sha256, pbkdf2_sha1, tags_match, HMAC_SIZE};

pub const SUPPORTED_VERSION: u8 = 3;
pub const SALT_SIZE: usize = 8;
pub const PBKDF2_ITERATIONS: u32 = 10_000;

const HEADER_SIZE: usize = 2 + SALT_SIZE + SALT_SIZE + IV_SIZE;
pub const MIN_CONTAINER_SIZE: usize = HEADER_SIZE + HMAC_SIZE;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("data too short for RNCryptor format: {len} bytes (minimum {MIN_CONTAINER_SIZE})")]
    TooShort { len: usize },
    #[error("unsupported RNCryptor version: {0}")]
    UnsupportedVersion(u8),
    #[error("HMAC verification failed - wrong password or corrupted data")]
    AuthenticationFailed,
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// A parsed container borrowing from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedContainer<'a> {
    pub version: u8,
    pub options: u8,
    pub encryption_salt: [u8; SALT_SIZE],
    pub hmac_salt: [u8; SALT_SIZE],
    pub iv: [u8; IV_SIZE],
    pub ciphertext: &'a [u8],
    pub hmac_tag: [u8; HMAC_SIZE],
    /// Everything except the trailing tag; the HMAC input.
    pub header_and_ciphertext: &'a [u8],
}

impl<'a> EncryptedContainer<'a> {
    /// Splits `data` into its fields after checking length and version.
    pub fn parse(data: &'a [u8]) -> Result<Self, ContainerError> {
        if data.len() < MIN_CONTAINER_SIZE {
            return Err(ContainerError::TooShort { len: data.len() });
        }
        if data[0] != SUPPORTED_VERSION {
            return Err(ContainerError::UnsupportedVersion(data[0]));
        }

        let (header_and_ciphertext, tag) = data.split_at(data.len() - HMAC_SIZE);
        let ciphertext = &header_and_ciphertext[HEADER_SIZE..];

        let mut encryption_salt = [0u8; SALT_SIZE];
        encryption_salt.copy_from_slice(&data[2..10]);
        let mut hmac_salt = [0u8; SALT_SIZE];
        hmac_salt.copy_from_slice(&data[10..18]);
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&data[18..HEADER_SIZE]);
        let mut hmac_tag = [0u8; HMAC_SIZE];
        hmac_tag.copy_from_slice(tag);

        Ok(Self {
            version: data[0],
            options: data[1],
            encryption_salt,
            hmac_salt,
            iv,
            ciphertext,
            hmac_tag,
            header_and_ciphertext,
        })
    }

    /// Verifies the tag with a key derived from `password` and, only if it
    /// matches, decrypts the payload.
    pub fn decrypt(&self, password: &str) -> Result<Vec<u8>, ContainerError> {
        let keys = DerivedKeys::derive(password.as_bytes(), self);

        let expected = hmac_sha256(&keys.hmac_key, self.header_and_ciphertext);
        if !tags_match(&expected, &self.hmac_tag) {
            debug!("container HMAC mismatch");
            return Err(ContainerError::AuthenticationFailed);
        }
        debug!(
            "container HMAC verified, decrypting {} bytes",
            self.ciphertext.len()
        );

        Ok(decrypt_aes_cbc(self.ciphertext, &keys.encryption_key, &self.iv)?)
    }
}

/// Parses and decrypts in one step.
pub fn decrypt(data: &[u8], password: &str) -> Result<Vec<u8>, ContainerError> {
    let container = EncryptedContainer::parse(data)?;
    debug!(
        "parsed RNCryptor v{} container (options {:#04x}, {} byte payload)",
        container.version,
        container.options,
        container.ciphertext.len()
    );
    container.decrypt(password)
}

/// Encryption and HMAC keys, each derived from the password with its own salt.
struct DerivedKeys {
    encryption_key: [u8; 32],
    hmac_key: [u8; 32],
}

impl DerivedKeys {
    fn derive(password: &[u8], container: &EncryptedContainer<'_>) -> Self {
        Self {
            encryption_key: pbkdf2_sha1(password, &container.encryption_salt, PBKDF2_ITERATIONS),
            hmac_key: pbkdf2_sha1(password, &container.hmac_salt, PBKDF2_ITERATIONS),
        }
    }
}

impl Drop for DerivedKeys {
    fn drop(&mut self) {
        self.encryption_key.zeroize();
        self.hmac_key.zeroize();
    }
}
