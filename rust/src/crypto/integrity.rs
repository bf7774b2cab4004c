//! Key derivation and message authentication primitives for RNCryptor
//! containers. Kept apart from the cipher so the authenticate-then-decrypt
//! order stays visible at the call site.

use hmac::digest::generic_array::GenericArray;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

pub const HMAC_SIZE: usize = 32;

/// SHA-256 input block size; HMAC keys are normalized to this length.
const SHA256_BLOCK_SIZE: usize = 64;

type HmacSha256 = Hmac<Sha256>;

/// Derives a 32-byte key with PBKDF2-HMAC-SHA1.
pub fn pbkdf2_sha1(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut output = [0u8; 32];
    pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut output);
    output
}

/// Generates an HMAC-SHA256 tag for the provided data. Keys of any length are
/// accepted: short keys are zero-padded to the block size and longer keys
/// are hashed first, as RFC 2104 defines.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; HMAC_SIZE] {
    let mut block = [0u8; SHA256_BLOCK_SIZE];
    if key.len() > SHA256_BLOCK_SIZE {
        block[..HMAC_SIZE].copy_from_slice(&Sha256::digest(key));
    } else {
        block[..key.len()].copy_from_slice(key);
    }
    let mut mac = <HmacSha256 as Mac>::new(GenericArray::from_slice(&block));
    block.zeroize();
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Compares two tags without short-circuiting on the first differing byte.
pub fn tags_match(expected: &[u8], actual: &[u8]) -> bool {
    expected.ct_eq(actual).into()
}
