//! AES-256-CBC decryption with the lenient padding removal used by OTP Auth
//! backups. Both the outer file wrapping and RNCryptor payloads go through
//! `decrypt_aes_cbc`.

use aes::Aes256;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use log::trace;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;
pub const BLOCK_SIZE: usize = 16;

type Aes256CbcDec = cbc::Decryptor<Aes256>;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid key length; expected {KEY_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("invalid IV length; expected {IV_SIZE} bytes, got {0}")]
    InvalidIvLength(usize),
    #[error("ciphertext length {0} is not a multiple of the {BLOCK_SIZE}-byte block size")]
    UnalignedCiphertext(usize),
}

/// Decrypts `ciphertext` with AES-256-CBC and strips trailing padding with
/// [`strip_padding`].
pub fn decrypt_aes_cbc(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CipherError> {
    if key.len() != KEY_SIZE {
        return Err(CipherError::InvalidKeyLength(key.len()));
    }
    if iv.len() != IV_SIZE {
        return Err(CipherError::InvalidIvLength(iv.len()));
    }
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::UnalignedCiphertext(ciphertext.len()));
    }

    let decryptor = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
    let mut buffer = ciphertext.to_vec();
    let plaintext_len = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| CipherError::UnalignedCiphertext(ciphertext.len()))?
        .len();
    buffer.truncate(plaintext_len);

    let unpadded_len = strip_padding(&buffer).len();
    trace!(
        "decrypted {} bytes, removed {} padding bytes",
        ciphertext.len(),
        buffer.len() - unpadded_len
    );
    buffer.truncate(unpadded_len);
    Ok(buffer)
}

/// Removes PKCS#7-style padding when it is well formed and returns the input
/// untouched otherwise. A trailing length byte of 0 or above 16, or a run of
/// bytes that does not all equal that length, means "not padded".
pub fn strip_padding(data: &[u8]) -> &[u8] {
    let Some(&last) = data.last() else {
        return data;
    };
    let pad_len = last as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return data;
    }

    let (body, suffix) = data.split_at(data.len() - pad_len);
    if suffix.iter().all(|&byte| byte == last) {
        body
    } else {
        data
    }
}

/// Hashes `content` with the digest `D`. Used to build fixed application keys
/// from constant strings.
pub fn derive_key_with<D: Digest>(content: &[u8]) -> Vec<u8> {
    D::digest(content).to_vec()
}

/// SHA-256 flavour of [`derive_key_with`].
pub fn derive_key(content: &[u8]) -> [u8; KEY_SIZE] {
    Sha256::digest(content).into()
}
