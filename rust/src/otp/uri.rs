//! otpauth:// provisioning URIs, the format authenticator apps import from
//! QR codes.

use data_encoding::BASE32_NOPAD;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::account::Account;

pub const DEFAULT_SCHEME: &str = "otpauth";

/// Characters left unescaped in the label path segment.
const LABEL: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

#[derive(Debug, Clone)]
pub struct UriBuilder {
    scheme: String,
}

impl Default for UriBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEME)
    }
}

impl UriBuilder {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self { scheme: scheme.into() }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// `{scheme}://{type}/{label}?{parameters}`
    pub fn uri(&self, account: &Account) -> String {
        format!(
            "{}://{}/{}?{}",
            self.scheme,
            account.kind.uri_value(),
            label(account),
            parameters(account)
        )
    }
}

/// Percent-encoded `issuer:label`, or just the label without an issuer.
pub fn label(account: &Account) -> String {
    let raw = match &account.issuer {
        Some(issuer) => format!("{issuer}:{}", account.label),
        None => account.label.clone(),
    };
    utf8_percent_encode(&raw, LABEL).to_string()
}

pub fn parameters(account: &Account) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("secret", &BASE32_NOPAD.encode(&account.secret))
        .append_pair("algorithm", account.algorithm.uri_value())
        .append_pair("period", &account.period.to_string())
        .append_pair("digits", &account.digits.to_string());
    if let Some(issuer) = &account.issuer {
        query.append_pair("issuer", issuer);
    }
    query.append_pair("counter", &account.counter.to_string());
    query.finish()
}

#[cfg(test)]
mod tests {
    use super::{label, UriBuilder};
    use crate::otp::account::{Account, AccountType, Algorithm};

    fn account() -> Account {
        Account {
            secret: b"Hello!\xde\xad\xbe\xef".to_vec(),
            label: "alice@example.com".to_string(),
            period: 30,
            kind: AccountType::Totp,
            issuer: Some("Acme Co".to_string()),
            digits: 6,
            algorithm: Algorithm::Sha256,
            counter: 0,
        }
    }

    #[test]
    fn builds_full_uri() {
        assert_eq!(
            UriBuilder::default().uri(&account()),
            "otpauth://totp/Acme%20Co%3Aalice%40example.com\
             ?secret=JBSWY3DPEHPK3PXP&algorithm=sha256&period=30&digits=6&issuer=Acme+Co&counter=0"
        );
    }

    #[test]
    fn omits_missing_issuer() {
        let mut account = account();
        account.issuer = None;
        account.kind = AccountType::Hotp;
        account.algorithm = Algorithm::Unknown;
        account.counter = 12;
        assert_eq!(
            UriBuilder::default().uri(&account),
            "otpauth://hotp/alice%40example.com\
             ?secret=JBSWY3DPEHPK3PXP&algorithm=sha1&period=30&digits=6&counter=12"
        );
    }

    #[test]
    fn keeps_unreserved_label_characters() {
        let mut account = account();
        account.issuer = None;
        account.label = "a_b.c-d~e/f g".to_string();
        assert_eq!(label(&account), "a_b.c-d~e/f%20g");
    }

    #[test]
    fn custom_scheme() {
        let builder = UriBuilder::new("otpauth-migration");
        assert_eq!(builder.scheme(), "otpauth-migration");
        assert!(builder.uri(&account()).starts_with("otpauth-migration://totp/"));
    }

    #[test]
    fn empty_secret_encodes_empty() {
        let mut account = account();
        account.secret.clear();
        assert!(UriBuilder::default().uri(&account).contains("?secret=&algorithm="));
    }
}
