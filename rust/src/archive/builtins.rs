//! Handlers for the Foundation value classes found in every keyed archive.

use log::trace;
use plist::{Dictionary, Value};

use super::registry::{Resolver, TypeRegistry};
use super::value::{Decoded, Fields, ValueRef};
use super::ArchiveError;

/// Seconds between the Unix epoch and the Cocoa reference date (2001-01-01).
pub const COCOA_EPOCH_OFFSET: f64 = 978_307_200.0;

const NS_STRING: &str = "NS.string";
const NS_INTVAL: &str = "NS.intval";
const NS_DBLVAL: &str = "NS.dblval";
const NS_BOOLVAL: &str = "NS.boolval";
const NS_DATA: &str = "NS.data";
const NS_TIME: &str = "NS.time";
const NS_OBJECTS: &str = "NS.objects";
const NS_KEYS: &str = "NS.keys";

pub fn register(registry: &mut TypeRegistry) {
    registry.register(&["NSString", "NSMutableString"], decode_string);
    registry.register(&["NSNumber"], decode_number);
    registry.register(&["NSData", "NSMutableData"], decode_data);
    registry.register(&["NSDate"], decode_date);
    registry.register(&["NSArray", "NSMutableArray"], decode_array);
    registry.register(&["NSDictionary", "NSMutableDictionary"], decode_dictionary);
}

fn field(
    fields: &Dictionary,
    key: &str,
    resolver: &mut dyn Resolver,
) -> Result<Option<ValueRef>, ArchiveError> {
    fields.get(key).map(|raw| resolver.resolve_value(raw)).transpose()
}

fn wrong_kind(key: &str, expected: &str, found: &Decoded) -> ArchiveError {
    ArchiveError::Format(format!(
        "field {key} should be {expected}, found {}",
        found.kind()
    ))
}

fn decode_string(fields: &Dictionary, resolver: &mut dyn Resolver) -> Result<Decoded, ArchiveError> {
    match field(fields, NS_STRING, resolver)? {
        None => Ok(Decoded::String(String::new())),
        Some(value) => match value.as_str() {
            Some(text) => Ok(Decoded::String(text.to_string())),
            None => Err(wrong_kind(NS_STRING, "a string", &value)),
        },
    }
}

/// Integer, then double, then boolean; an empty NSNumber decodes as 0.
fn decode_number(fields: &Dictionary, resolver: &mut dyn Resolver) -> Result<Decoded, ArchiveError> {
    if let Some(value) = field(fields, NS_INTVAL, resolver)? {
        return match *value {
            Decoded::Integer(number) => Ok(Decoded::Integer(number)),
            ref other => Err(wrong_kind(NS_INTVAL, "an integer", other)),
        };
    }
    if let Some(value) = field(fields, NS_DBLVAL, resolver)? {
        return match value.as_f64() {
            Some(number) => Ok(Decoded::Float(number)),
            None => Err(wrong_kind(NS_DBLVAL, "a number", &value)),
        };
    }
    if let Some(value) = field(fields, NS_BOOLVAL, resolver)? {
        return match *value {
            Decoded::Boolean(flag) => Ok(Decoded::Boolean(flag)),
            Decoded::Integer(number) => Ok(Decoded::Boolean(number != 0)),
            ref other => Err(wrong_kind(NS_BOOLVAL, "a boolean", other)),
        };
    }
    Ok(Decoded::Integer(0))
}

fn decode_data(fields: &Dictionary, resolver: &mut dyn Resolver) -> Result<Decoded, ArchiveError> {
    match field(fields, NS_DATA, resolver)? {
        None => Ok(Decoded::Bytes(Vec::new())),
        Some(value) => match value.as_bytes() {
            Some(bytes) => Ok(Decoded::Bytes(bytes.to_vec())),
            None => Err(wrong_kind(NS_DATA, "bytes", &value)),
        },
    }
}

fn decode_date(fields: &Dictionary, resolver: &mut dyn Resolver) -> Result<Decoded, ArchiveError> {
    let seconds = match field(fields, NS_TIME, resolver)? {
        None => 0.0,
        Some(value) => match *value {
            Decoded::Float(seconds) => seconds,
            Decoded::Integer(seconds) => seconds as f64,
            ref other => return Err(wrong_kind(NS_TIME, "a number", other)),
        },
    };
    Ok(Decoded::Timestamp(seconds + COCOA_EPOCH_OFFSET))
}

fn reference_list<'a>(fields: &'a Dictionary, key: &str) -> Result<&'a [Value], ArchiveError> {
    match fields.get(key) {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(ArchiveError::Format(format!("field {key} should be an array"))),
    }
}

fn decode_array(fields: &Dictionary, resolver: &mut dyn Resolver) -> Result<Decoded, ArchiveError> {
    let items = reference_list(fields, NS_OBJECTS)?
        .iter()
        .map(|raw| resolver.resolve_value(raw))
        .collect::<Result<Vec<_>, _>>()?;
    trace!("decoded array of {} items", items.len());
    Ok(Decoded::List(items))
}

/// Zips parallel `NS.keys`/`NS.objects` lists. Without both lists the object
/// is decoded like an unclassed field map.
fn decode_dictionary(fields: &Dictionary, resolver: &mut dyn Resolver) -> Result<Decoded, ArchiveError> {
    if !(fields.contains_key(NS_KEYS) && fields.contains_key(NS_OBJECTS)) {
        return Ok(Decoded::Map(resolver.resolve_fields(fields)?));
    }

    let keys = reference_list(fields, NS_KEYS)?;
    let values = reference_list(fields, NS_OBJECTS)?;
    let mut map = Fields::new();
    for (raw_key, raw_value) in keys.iter().zip(values) {
        let key = resolver.resolve_value(raw_key)?;
        let key = match *key {
            Decoded::String(ref text) => text.clone(),
            Decoded::Integer(number) => number.to_string(),
            ref other => {
                return Err(ArchiveError::Format(format!(
                    "dictionary key should be a string, found {}",
                    other.kind()
                )))
            }
        };
        let value = resolver.resolve_value(raw_value)?;
        map.insert(key, value);
    }
    trace!("decoded dictionary of {} entries", map.len());
    Ok(Decoded::Map(map))
}
