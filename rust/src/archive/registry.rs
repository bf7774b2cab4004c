//! Class-name dispatch for archived objects.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use plist::{Dictionary, Value};

use super::builtins;
use super::value::{Decoded, Fields, ValueRef};
use super::ArchiveError;

/// Callback handed to type handlers so they can follow references.
pub trait Resolver {
    /// Decodes the object stored at `index` in the object table.
    fn resolve_ref(&mut self, index: u64) -> Result<ValueRef, ArchiveError>;

    /// Decodes a field value: UIDs are followed, inline values are converted.
    fn resolve_value(&mut self, raw: &Value) -> Result<ValueRef, ArchiveError>;

    /// Decodes every field whose key does not start with `$`.
    fn resolve_fields(&mut self, fields: &Dictionary) -> Result<Fields, ArchiveError>;
}

/// Decodes the raw field map of one archived class.
pub trait TypeHandler: Send + Sync {
    fn decode(&self, fields: &Dictionary, resolver: &mut dyn Resolver) -> Result<Decoded, ArchiveError>;
}

impl<F> TypeHandler for F
where
    F: Fn(&Dictionary, &mut dyn Resolver) -> Result<Decoded, ArchiveError> + Send + Sync,
{
    fn decode(&self, fields: &Dictionary, resolver: &mut dyn Resolver) -> Result<Decoded, ArchiveError> {
        self(fields, resolver)
    }
}

/// Resolves all fields and tags the result with a class name. Domain types
/// register this and convert the record afterwards.
#[derive(Debug, Clone)]
pub struct RecordHandler {
    class: String,
}

impl RecordHandler {
    pub fn new(class: impl Into<String>) -> Self {
        Self { class: class.into() }
    }
}

impl TypeHandler for RecordHandler {
    fn decode(&self, fields: &Dictionary, resolver: &mut dyn Resolver) -> Result<Decoded, ArchiveError> {
        Ok(Decoded::Record {
            class: self.class.clone(),
            fields: resolver.resolve_fields(fields)?,
        })
    }
}

/// Maps class names to handlers. Aliases registered together share one
/// handler instance; a later registration replaces an earlier one.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    handlers: HashMap<String, Arc<dyn TypeHandler>>,
}

impl TypeRegistry {
    /// An empty registry; every classed object falls back to field decoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the Foundation value classes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register(&mut registry);
        registry
    }

    pub fn register<H>(&mut self, class_names: &[&str], handler: H)
    where
        H: TypeHandler + 'static,
    {
        self.register_shared(class_names, Arc::new(handler));
    }

    pub fn register_shared(&mut self, class_names: &[&str], handler: Arc<dyn TypeHandler>) {
        for name in class_names {
            self.handlers.insert((*name).to_string(), Arc::clone(&handler));
        }
    }

    pub fn resolve(&self, class_name: &str) -> Option<Arc<dyn TypeHandler>> {
        self.handlers.get(class_name).cloned()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.handlers.contains_key(class_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry").field("classes", &names).finish()
    }
}
