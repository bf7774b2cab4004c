//! Values produced by the keyed-archive decoder.
//!
//! Decoded values are reference counted so an object referenced from several
//! places in the archive decodes to one shared instance.

use std::collections::BTreeMap;
use std::rc::Rc;

/// A decoded value shared between every reference to the same archive object.
pub type ValueRef = Rc<Decoded>;

/// Field maps keep keys sorted so output is deterministic.
pub type Fields = BTreeMap<String, ValueRef>;

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
    /// Seconds since 1970-01-01 UTC.
    Timestamp(f64),
    List(Vec<ValueRef>),
    Map(Fields),
    /// An object decoded by a registered domain handler, tagged with its class.
    Record { class: String, fields: Fields },
}

impl Decoded {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Decoded::Null => "null",
            Decoded::String(_) => "string",
            Decoded::Integer(_) => "integer",
            Decoded::Float(_) => "float",
            Decoded::Boolean(_) => "boolean",
            Decoded::Bytes(_) => "bytes",
            Decoded::Timestamp(_) => "timestamp",
            Decoded::List(_) => "list",
            Decoded::Map(_) => "map",
            Decoded::Record { .. } => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Decoded::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Decoded::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Decoded::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Decoded::Float(value) | Decoded::Timestamp(value) => Some(*value),
            Decoded::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Decoded::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Decoded::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ValueRef]> {
        match self {
            Decoded::List(items) => Some(items),
            _ => None,
        }
    }

    /// Field map of a plain map or a domain record.
    pub fn as_fields(&self) -> Option<&Fields> {
        match self {
            Decoded::Map(fields) | Decoded::Record { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Looks up `key` in a map or record.
    pub fn get(&self, key: &str) -> Option<&ValueRef> {
        self.as_fields().and_then(|fields| fields.get(key))
    }
}

impl From<&str> for Decoded {
    fn from(value: &str) -> Self {
        Decoded::String(value.to_string())
    }
}

impl From<String> for Decoded {
    fn from(value: String) -> Self {
        Decoded::String(value)
    }
}

impl From<i64> for Decoded {
    fn from(value: i64) -> Self {
        Decoded::Integer(value)
    }
}

impl From<f64> for Decoded {
    fn from(value: f64) -> Self {
        Decoded::Float(value)
    }
}

impl From<bool> for Decoded {
    fn from(value: bool) -> Self {
        Decoded::Boolean(value)
    }
}

impl From<Vec<u8>> for Decoded {
    fn from(value: Vec<u8>) -> Self {
        Decoded::Bytes(value)
    }
}
