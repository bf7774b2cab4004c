//! Keyed-archive decoding: document validation, UID resolution, and the
//! per-session resolution cache.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, trace};
use plist::{Dictionary, Value};
use serde::Serialize;

use super::registry::{Resolver, TypeHandler, TypeRegistry};
use super::value::{Decoded, Fields, ValueRef};
use super::ArchiveError;

pub const ARCHIVER_NAME: &str = "NSKeyedArchiver";

const ARCHIVER_KEY: &str = "$archiver";
const VERSION_KEY: &str = "$version";
const TOP_KEY: &str = "$top";
const OBJECTS_KEY: &str = "$objects";
const ROOT_KEY: &str = "root";
const CLASS_KEY: &str = "$class";
const CLASS_NAME_KEY: &str = "$classname";
const METADATA_PREFIX: char = '$';

/// Deepest chain of nested objects a session will follow.
pub const MAX_DEPTH: usize = 256;

/// Summary of an archive's envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveInfo {
    pub archiver: String,
    pub version: Option<i64>,
    pub object_count: usize,
    pub top_keys: Vec<String>,
}

/// A parsed keyed archive plus the registry used to decode it.
#[derive(Debug)]
pub struct Unarchiver {
    archiver: String,
    version: Option<i64>,
    top: Dictionary,
    objects: Vec<Value>,
    registry: TypeRegistry,
}

impl Unarchiver {
    /// Parses `bytes` (binary or XML plist) with the built-in Foundation handlers.
    pub fn parse(bytes: &[u8]) -> Result<Self, ArchiveError> {
        Self::with_registry(bytes, TypeRegistry::with_builtins())
    }

    pub fn with_registry(bytes: &[u8], registry: TypeRegistry) -> Result<Self, ArchiveError> {
        let document = Value::from_reader(Cursor::new(bytes))
            .map_err(|e| ArchiveError::Plist(format!("{e}")))?;
        let Value::Dictionary(mut document) = document else {
            return Err(ArchiveError::Format("document root is not a dictionary".to_string()));
        };

        let archiver = match document.get(ARCHIVER_KEY) {
            Some(Value::String(name)) if name == ARCHIVER_NAME => name.clone(),
            _ => {
                return Err(ArchiveError::Format(format!(
                    "{ARCHIVER_KEY} is not {ARCHIVER_NAME}"
                )))
            }
        };
        let version = match document.get(VERSION_KEY) {
            Some(Value::Integer(version)) => version.as_signed(),
            _ => None,
        };
        let top = match document.remove(TOP_KEY) {
            None => Dictionary::new(),
            Some(Value::Dictionary(top)) => top,
            Some(_) => return Err(ArchiveError::Format(format!("{TOP_KEY} is not a dictionary"))),
        };
        let objects = match document.remove(OBJECTS_KEY) {
            Some(Value::Array(objects)) => objects,
            _ => return Err(ArchiveError::Format(format!("{OBJECTS_KEY} is missing or not an array"))),
        };

        debug!(
            "parsed keyed archive: {} objects, top keys {:?}",
            objects.len(),
            top.keys().collect::<Vec<_>>()
        );
        Ok(Self {
            archiver,
            version,
            top,
            objects,
            registry,
        })
    }

    /// Adds a handler for extra classes before decoding.
    pub fn register_type<H>(&mut self, class_names: &[&str], handler: H)
    where
        H: TypeHandler + 'static,
    {
        self.registry.register(class_names, handler);
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn info(&self) -> ArchiveInfo {
        ArchiveInfo {
            archiver: self.archiver.clone(),
            version: self.version,
            object_count: self.objects.len(),
            top_keys: self.top.keys().cloned().collect(),
        }
    }

    /// Decodes the object graph reachable from `$top.root`. A missing root
    /// decodes as [`Decoded::Null`].
    pub fn unarchive(&self) -> Result<ValueRef, ArchiveError> {
        match self.top.get(ROOT_KEY) {
            Some(Value::Uid(root)) => self.session().resolve_ref(root.get()),
            _ => Ok(Rc::new(Decoded::Null)),
        }
    }

    /// Starts a resolution session with an empty cache.
    pub fn session(&self) -> Session<'_> {
        Session {
            objects: &self.objects,
            registry: &self.registry,
            cache: HashMap::new(),
            in_progress: HashSet::new(),
            depth: 0,
        }
    }
}

/// One decoding pass over an archive. Every index is decoded at most once
/// per session; repeated references share the cached value.
pub struct Session<'a> {
    objects: &'a [Value],
    registry: &'a TypeRegistry,
    cache: HashMap<u64, ValueRef>,
    in_progress: HashSet<u64>,
    depth: usize,
}

impl Session<'_> {
    /// Every reference and inline container passes through here.
    fn decode_node(&mut self, raw: &Value) -> Result<ValueRef, ArchiveError> {
        if self.depth >= MAX_DEPTH {
            return Err(ArchiveError::TooDeep { depth: MAX_DEPTH });
        }
        self.depth += 1;
        let decoded = self.decode_entry(raw);
        self.depth -= 1;
        decoded
    }

    fn decode_entry(&mut self, raw: &Value) -> Result<ValueRef, ArchiveError> {
        let decoded = match raw {
            Value::Uid(uid) => return self.resolve_ref(uid.get()),
            Value::Dictionary(fields) => match fields.get(CLASS_KEY) {
                None => Decoded::Map(self.resolve_fields(fields)?),
                Some(class_ref) => {
                    let class_name = self.class_name(class_ref)?;
                    match self.registry.resolve(&class_name) {
                        Some(handler) => {
                            trace!("decoding {class_name} with registered handler");
                            handler.decode(fields, self)?
                        }
                        None => {
                            debug!("no handler for class {class_name}, decoding its fields");
                            Decoded::Map(self.resolve_fields(fields)?)
                        }
                    }
                }
            },
            Value::Array(items) => Decoded::List(
                items
                    .iter()
                    .map(|item| self.resolve_value(item))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::String(text) => Decoded::String(text.clone()),
            Value::Integer(number) => match number.as_signed() {
                Some(number) => Decoded::Integer(number),
                None => {
                    return Err(ArchiveError::Format(format!(
                        "integer {number:?} does not fit in 64 signed bits"
                    )))
                }
            },
            Value::Real(number) => Decoded::Float(*number),
            Value::Boolean(flag) => Decoded::Boolean(*flag),
            Value::Data(bytes) => Decoded::Bytes(bytes.clone()),
            Value::Date(date) => Decoded::Timestamp(unix_seconds(SystemTime::from(date.clone()))),
            _ => return Err(ArchiveError::Format("unsupported plist value".to_string())),
        };
        Ok(Rc::new(decoded))
    }

    fn class_name(&self, class_ref: &Value) -> Result<String, ArchiveError> {
        let Value::Uid(uid) = class_ref else {
            return Err(ArchiveError::Format(format!("{CLASS_KEY} is not a UID")));
        };
        let class = lookup(self.objects, uid.get())?;
        match class.as_dictionary().and_then(|info| info.get(CLASS_NAME_KEY)) {
            Some(Value::String(name)) => Ok(name.clone()),
            _ => Err(ArchiveError::Format(format!(
                "object {} has no {CLASS_NAME_KEY}",
                uid.get()
            ))),
        }
    }
}

impl Resolver for Session<'_> {
    fn resolve_ref(&mut self, index: u64) -> Result<ValueRef, ArchiveError> {
        if index == 0 {
            return Ok(Rc::new(Decoded::Null));
        }
        if let Some(cached) = self.cache.get(&index) {
            trace!("object {index} served from cache");
            return Ok(Rc::clone(cached));
        }

        let raw = lookup(self.objects, index)?;
        if !self.in_progress.insert(index) {
            return Err(ArchiveError::Cycle(index));
        }
        let decoded = self.decode_node(raw);
        self.in_progress.remove(&index);

        let value = decoded?;
        self.cache.insert(index, Rc::clone(&value));
        Ok(value)
    }

    fn resolve_value(&mut self, raw: &Value) -> Result<ValueRef, ArchiveError> {
        self.decode_node(raw)
    }

    fn resolve_fields(&mut self, fields: &Dictionary) -> Result<Fields, ArchiveError> {
        let mut resolved = Fields::new();
        for (key, raw) in fields.iter() {
            if key.starts_with(METADATA_PREFIX) {
                continue;
            }
            resolved.insert(key.clone(), self.resolve_value(raw)?);
        }
        Ok(resolved)
    }
}

fn lookup(objects: &[Value], index: u64) -> Result<&Value, ArchiveError> {
    usize::try_from(index)
        .ok()
        .and_then(|position| objects.get(position))
        .ok_or(ArchiveError::DanglingReference {
            index,
            len: objects.len(),
        })
}

fn unix_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}
