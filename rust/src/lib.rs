//! Decoder for encrypted OTP Auth backup files.
//!
//! The pipeline peels the application-key wrapping, authenticates and
//! decrypts the password-protected RNCryptor container, then walks the
//! NSKeyedArchiver object graph inside into [`otp::Folder`] and
//! [`otp::Account`] records.

pub mod archive;
pub mod backup;
pub mod config;
pub mod crypto;
pub mod otp;

#[cfg(test)]
mod testing;
