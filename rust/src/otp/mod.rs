//! Authenticator domain records decoded from backup archives.

pub mod account;
pub mod folder;
pub mod uri;

pub use account::{Account, AccountError, AccountType, Algorithm, CodedEnum};
pub use folder::Folder;
pub use uri::UriBuilder;

use crate::archive::{RecordHandler, TypeRegistry};

pub const ACCOUNT_CLASS: &str = "ACOTPAccount";
pub const FOLDER_CLASS: &str = "ACOTPFolder";

/// Registers record handlers for the authenticator's archived classes.
pub fn register_types(registry: &mut TypeRegistry) {
    registry.register(&[ACCOUNT_CLASS], RecordHandler::new(ACCOUNT_CLASS));
    registry.register(&[FOLDER_CLASS], RecordHandler::new(FOLDER_CLASS));
}
