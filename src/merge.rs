//! Deep merge of variable documents into the template namespace.
//!
//! Documents are applied left to right, each one overriding the ones before it:
//!
//! - mappings merge recursively, keys present on only one side survive;
//! - scalars and sequences replace the earlier value wholesale (sequences are
//!   never concatenated);
//! - an empty document contributes nothing;
//! - a document whose root is not a mapping is rejected.

use crate::error::{RenderError, Result};
use crate::variables::VariableDocument;
use serde::Serialize;
use serde_yaml_ng::{Mapping, Value};
use tracing::debug;

/// The merged variable namespace handed to the template engine
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Namespace(Mapping);

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one document on top of the namespace.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidDocumentShape` if the document root is a
    /// scalar, sequence or tagged value.
    pub fn merge_document(&mut self, document: VariableDocument) -> Result<()> {
        match document.value {
            Value::Null => {
                debug!(origin = %document.origin, "skipping empty variables document");
                Ok(())
            }
            Value::Mapping(map) => {
                debug!(origin = %document.origin, keys = map.len(), "merging variables document");
                merge_mapping(&mut self.0, map);
                Ok(())
            }
            other => Err(RenderError::InvalidDocumentShape {
                origin: document.origin,
                found: kind_name(&other),
            }),
        }
    }

    /// Looks up a top-level variable
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Mapping(self.0)
    }

    /// Turns the namespace back into a document so it can take part in a
    /// further merge.
    pub fn into_document(self, origin: impl Into<String>) -> VariableDocument {
        VariableDocument::new(origin, self.into_value())
    }
}

impl From<Mapping> for Namespace {
    fn from(map: Mapping) -> Self {
        Self(map)
    }
}

/// Merges documents in order of increasing precedence.
///
/// # Errors
///
/// Returns `RenderError::InvalidDocumentShape` for the first document whose
/// root is not a mapping.
pub fn merge<I>(documents: I) -> Result<Namespace>
where
    I: IntoIterator<Item = VariableDocument>,
{
    documents
        .into_iter()
        .try_fold(Namespace::new(), |mut namespace, document| {
            namespace.merge_document(document)?;
            Ok(namespace)
        })
}

/// Overlays `layer` onto `target`: mappings merge key by key, anything else
/// replaces `target`.
pub fn merge_value(target: &mut Value, layer: Value) {
    match (target, layer) {
        (Value::Mapping(existing), Value::Mapping(incoming)) => merge_mapping(existing, incoming),
        (target, layer) => *target = layer,
    }
}

fn merge_mapping(target: &mut Mapping, incoming: Mapping) {
    for (key, value) in incoming {
        match target.get_mut(&key) {
            Some(existing) => merge_value(existing, value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
