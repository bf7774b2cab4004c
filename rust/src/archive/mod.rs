//! NSKeyedArchiver object graphs.
//!
//! An archive stores every object once in a flat `$objects` table and links
//! them with integer UIDs. [`Unarchiver`] walks that table from the `$top`
//! root, dispatching classed objects to handlers from a [`TypeRegistry`].

pub mod builtins;
pub mod registry;
pub mod unarchiver;
pub mod value;

use thiserror::Error;

pub use registry::{RecordHandler, Resolver, TypeHandler, TypeRegistry};
pub use unarchiver::{ArchiveInfo, Session, Unarchiver};
pub use value::{Decoded, Fields, ValueRef};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("plist parse failed: {0}")]
    Plist(String),
    #[error("invalid keyed archive: {0}")]
    Format(String),
    #[error("object reference {index} is outside the {len}-entry object table")]
    DanglingReference { index: u64, len: usize },
    #[error("object {0} references itself before it finished decoding")]
    Cycle(u64),
    #[error("object graph nests deeper than {depth} levels")]
    TooDeep { depth: usize },
}
