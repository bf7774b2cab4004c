//! Cryptography for OTP Auth backups: the AES-CBC primitive, PBKDF2/HMAC
//! integrity helpers, and the RNCryptor v3 container built on top of them.

pub mod cipher;
pub mod container;
pub mod integrity;
