//! OTP account records and the normalization rules applied when they are
//! read from a decoded archive.

use std::fmt;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use serde::{Serialize, Serializer};
use thiserror::Error;
use zeroize::Zeroize;

use crate::archive::value::{Decoded, Fields};

pub const DEFAULT_PERIOD: i64 = 30;
pub const DEFAULT_DIGITS: i64 = 6;
pub const DEFAULT_COUNTER: i64 = 0;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{field} code {code} does not name a known variant")]
    EnumRange { field: &'static str, code: i64 },
    #[error("field {field} should be {expected}, found {found}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// Enums stored in backups either by name or by integer code.
///
/// Names are matched case-insensitively and unknown names fall back to the
/// first variant. Codes must match a declared variant exactly.
pub trait CodedEnum: Sized + Copy + 'static {
    const FIELD: &'static str;
    const VARIANTS: &'static [Self];

    fn name(self) -> &'static str;
    fn code(self) -> i64;

    fn from_name(name: &str) -> Self {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|variant| variant.name().eq_ignore_ascii_case(name))
            .unwrap_or(Self::VARIANTS[0])
    }

    fn from_code(code: i64) -> Result<Self, AccountError> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|variant| variant.code() == code)
            .ok_or(AccountError::EnumRange {
                field: Self::FIELD,
                code,
            })
    }

    fn normalize(raw: &Decoded) -> Result<Self, AccountError> {
        match raw {
            Decoded::String(name) => Ok(Self::from_name(name)),
            Decoded::Integer(code) => Self::from_code(*code),
            Decoded::Float(code) if code.fract() == 0.0 => Self::from_code(*code as i64),
            other => Err(AccountError::InvalidField {
                field: Self::FIELD,
                expected: "a name or integer code",
                found: other.kind(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Unknown,
    Hotp,
    Totp,
}

impl CodedEnum for AccountType {
    const FIELD: &'static str = "type";
    const VARIANTS: &'static [Self] = &[AccountType::Unknown, AccountType::Hotp, AccountType::Totp];

    fn name(self) -> &'static str {
        match self {
            AccountType::Unknown => "Unknown",
            AccountType::Hotp => "HOTP",
            AccountType::Totp => "TOTP",
        }
    }

    fn code(self) -> i64 {
        match self {
            AccountType::Unknown => 0,
            AccountType::Hotp => 1,
            AccountType::Totp => 2,
        }
    }
}

impl AccountType {
    /// Host component of an otpauth URI.
    pub fn uri_value(self) -> &'static str {
        match self {
            AccountType::Unknown => "unknown",
            AccountType::Hotp => "hotp",
            AccountType::Totp => "totp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Unknown,
    Sha1,
    Sha256,
    Sha512,
    Md5,
}

impl CodedEnum for Algorithm {
    const FIELD: &'static str = "algorithm";
    const VARIANTS: &'static [Self] = &[
        Algorithm::Unknown,
        Algorithm::Sha1,
        Algorithm::Sha256,
        Algorithm::Sha512,
        Algorithm::Md5,
    ];

    fn name(self) -> &'static str {
        match self {
            Algorithm::Unknown => "Unknown",
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha512 => "SHA512",
            Algorithm::Md5 => "MD5",
        }
    }

    fn code(self) -> i64 {
        match self {
            Algorithm::Unknown => 0,
            Algorithm::Sha1 => 1,
            Algorithm::Sha256 => 2,
            Algorithm::Sha512 => 3,
            Algorithm::Md5 => 4,
        }
    }
}

impl Algorithm {
    /// Query value for an otpauth URI; `Unknown` is rendered as SHA-1.
    pub fn uri_value(self) -> &'static str {
        match self {
            Algorithm::Unknown | Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
            Algorithm::Md5 => "md5",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    #[serde(serialize_with = "serialize_secret")]
    pub secret: Vec<u8>,
    pub label: String,
    pub period: i64,
    #[serde(rename = "type")]
    pub kind: AccountType,
    pub issuer: Option<String>,
    pub digits: i64,
    pub algorithm: Algorithm,
    pub counter: i64,
}

impl Account {
    /// Builds an account from a decoded `ACOTPAccount` record or plain map,
    /// filling defaults for absent fields.
    pub fn from_decoded(value: &Decoded) -> Result<Self, AccountError> {
        let fields = value.as_fields().ok_or(AccountError::InvalidField {
            field: "account",
            expected: "a map",
            found: value.kind(),
        })?;
        Self::from_fields(fields)
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, AccountError> {
        Ok(Self {
            secret: bytes_field(fields, "secret")?,
            label: string_field(fields, "label")?.unwrap_or_default(),
            period: int_field(fields, "period")?.unwrap_or(DEFAULT_PERIOD),
            kind: enum_field(fields)?,
            issuer: string_field(fields, "issuer")?,
            digits: int_field(fields, "digits")?.unwrap_or(DEFAULT_DIGITS),
            algorithm: enum_field(fields)?,
            counter: int_field(fields, "counter")?.unwrap_or(DEFAULT_COUNTER),
        })
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("secret", &"[REDACTED]")
            .field("label", &self.label)
            .field("period", &self.period)
            .field("type", &self.kind)
            .field("issuer", &self.issuer)
            .field("digits", &self.digits)
            .field("algorithm", &self.algorithm)
            .field("counter", &self.counter)
            .finish()
    }
}

impl Account {
    /// Overwrites the secret bytes and leaves the secret empty.
    pub fn wipe_secret(&mut self) {
        self.secret.zeroize();
    }
}

impl Drop for Account {
    fn drop(&mut self) {
        self.wipe_secret();
    }
}

fn serialize_secret<S: Serializer>(secret: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD_NO_PAD.encode(secret))
}

/// A field that is absent or explicitly null.
fn present<'a>(fields: &'a Fields, field: &str) -> Option<&'a Decoded> {
    fields.get(field).map(|value| &**value).filter(|value| !value.is_null())
}

fn bytes_field(fields: &Fields, field: &'static str) -> Result<Vec<u8>, AccountError> {
    match present(fields, field) {
        None => Ok(Vec::new()),
        Some(Decoded::Bytes(bytes)) => Ok(bytes.clone()),
        Some(Decoded::String(text)) => Ok(text.as_bytes().to_vec()),
        Some(other) => Err(AccountError::InvalidField {
            field,
            expected: "bytes",
            found: other.kind(),
        }),
    }
}

fn string_field(fields: &Fields, field: &'static str) -> Result<Option<String>, AccountError> {
    match present(fields, field) {
        None => Ok(None),
        Some(Decoded::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(AccountError::InvalidField {
            field,
            expected: "a string",
            found: other.kind(),
        }),
    }
}

fn int_field(fields: &Fields, field: &'static str) -> Result<Option<i64>, AccountError> {
    match present(fields, field) {
        None => Ok(None),
        Some(Decoded::Integer(number)) => Ok(Some(*number)),
        Some(other) => Err(AccountError::InvalidField {
            field,
            expected: "an integer",
            found: other.kind(),
        }),
    }
}

fn enum_field<E: CodedEnum>(fields: &Fields) -> Result<E, AccountError> {
    match present(fields, E::FIELD) {
        None => Ok(E::VARIANTS[0]),
        Some(raw) => E::normalize(raw),
    }
}
