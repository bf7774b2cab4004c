use serde::Serialize;

use super::account::{Account, AccountError};
use crate::archive::value::Decoded;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    pub name: String,
    pub accounts: Vec<Account>,
}

impl Folder {
    /// Builds a folder from a decoded `ACOTPFolder` record or plain map. A
    /// missing name is empty and a missing account list is an empty folder.
    pub fn from_decoded(value: &Decoded) -> Result<Self, AccountError> {
        let fields = value.as_fields().ok_or(AccountError::InvalidField {
            field: "folder",
            expected: "a map",
            found: value.kind(),
        })?;

        let name = match fields.get("name").map(|value| &**value) {
            None | Some(Decoded::Null) => String::new(),
            Some(Decoded::String(name)) => name.clone(),
            Some(other) => {
                return Err(AccountError::InvalidField {
                    field: "name",
                    expected: "a string",
                    found: other.kind(),
                })
            }
        };

        let accounts = match fields.get("accounts").map(|value| &**value) {
            None | Some(Decoded::Null) => Vec::new(),
            Some(Decoded::List(items)) => items
                .iter()
                .map(|item| Account::from_decoded(item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(AccountError::InvalidField {
                    field: "accounts",
                    expected: "a list",
                    found: other.kind(),
                })
            }
        };

        Ok(Self { name, accounts })
    }
}
