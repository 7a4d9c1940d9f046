//! Loading of variable documents.
//!
//! A variable document is one parsed YAML file (or an ambient source such as
//! the process environment or `KEY=VALUE` command-line definitions) that
//! contributes to the template namespace.

use crate::error::{RenderError, Result, SourceLocation};
use crate::fs_utils::read_file_contents;
use crate::merge::merge_value;
use regex::Regex;
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Key under which environment variables are exposed to templates
pub const ENV_KEY: &str = "env";

/// Origin label of the environment document
pub const ENV_ORIGIN: &str = "<environment>";

/// Origin label of the command-line definitions document
pub const DEFINE_ORIGIN: &str = "<define>";

#[allow(clippy::expect_used)]
static DEFINE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*(\.[A-Za-z_][A-Za-z0-9_-]*)*$")
        .expect("define key pattern is a valid regex")
});

/// One parsed variable document together with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDocument {
    /// Human-readable source, used in diagnostics
    pub origin: String,
    /// Parsed root value; `Null` for an empty document
    pub value: Value,
}

impl VariableDocument {
    pub fn new(origin: impl Into<String>, value: Value) -> Self {
        Self {
            origin: origin.into(),
            value,
        }
    }

    /// A document that contributes nothing to the namespace
    pub fn empty(origin: impl Into<String>) -> Self {
        Self::new(origin, Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_null()
    }
}

/// Loads and parses the YAML variables file at `path`. Every call re-reads the file.
///
/// # Errors
///
/// - `RenderError::DocumentNotFound` if the file can't be opened or read.
/// - `RenderError::DocumentParse` if the content isn't valid UTF-8 YAML.
pub fn load_document(path: &Path) -> Result<VariableDocument> {
    info!(path = %path.display(), "reading variables");
    let text = read_file_contents(path).map_err(|source| match source.kind() {
        io::ErrorKind::InvalidData => RenderError::DocumentParse {
            origin: path.display().to_string(),
            location: SourceLocation::default(),
            message: source.to_string(),
        },
        _ => RenderError::DocumentNotFound {
            path: path.to_path_buf(),
            source,
        },
    })?;
    parse_document(&text, &path.display().to_string())
}

/// Parses YAML text into a variable document. Blank input yields an empty
/// document; YAML merge keys (`<<`) are resolved.
///
/// # Errors
///
/// Returns `RenderError::DocumentParse` with the parser's line and column.
pub fn parse_document(text: &str, origin: &str) -> Result<VariableDocument> {
    if text.trim().is_empty() {
        debug!(origin, "variables document is empty");
        return Ok(VariableDocument::empty(origin));
    }

    let mut value: Value =
        serde_yaml_ng::from_str(text).map_err(|e| parse_error(origin, &e))?;
    value.apply_merge().map_err(|e| parse_error(origin, &e))?;

    Ok(VariableDocument::new(origin, value))
}

fn parse_error(origin: &str, err: &serde_yaml_ng::Error) -> RenderError {
    let location = err.location().map_or_else(SourceLocation::default, |loc| {
        SourceLocation {
            line: Some(loc.line()),
            column: Some(loc.column()),
        }
    });
    RenderError::DocumentParse {
        origin: origin.to_string(),
        location,
        message: err.to_string(),
    }
}

/// Builds the `{env: {NAME: value}}` document from the process environment.
/// Variables whose name or value isn't valid UTF-8 are skipped.
pub fn environment_document() -> VariableDocument {
    environment_document_from(
        std::env::vars_os()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?))),
    )
}

/// Builds the environment document from explicit name/value pairs
pub fn environment_document_from<I>(vars: I) -> VariableDocument
where
    I: IntoIterator<Item = (String, String)>,
{
    let sorted: BTreeMap<String, String> = vars.into_iter().collect();
    let env: Mapping = sorted
        .into_iter()
        .map(|(name, value)| (Value::String(name), Value::String(value)))
        .collect();

    let mut root = Mapping::new();
    root.insert(Value::String(ENV_KEY.to_string()), Value::Mapping(env));
    VariableDocument::new(ENV_ORIGIN, Value::Mapping(root))
}

/// Builds a document from `KEY=VALUE` definitions. Dotted keys (`server.port`)
/// create nested mappings; values are read as YAML scalars so `8080` is a
/// number and `true` a boolean. Later definitions win.
///
/// # Errors
///
/// Returns `RenderError::InvalidDefine` if a definition has no `=` or its key
/// isn't a dotted identifier.
pub fn define_document<S: AsRef<str>>(defines: &[S]) -> Result<VariableDocument> {
    let mut root = Value::Mapping(Mapping::new());
    for definition in defines {
        let layer = parse_define(definition.as_ref())?;
        merge_value(&mut root, layer);
    }
    Ok(VariableDocument::new(DEFINE_ORIGIN, root))
}

fn parse_define(definition: &str) -> Result<Value> {
    let invalid = |reason| RenderError::InvalidDefine {
        definition: definition.to_string(),
        reason,
    };

    let (key, raw) = definition
        .split_once('=')
        .ok_or_else(|| invalid("expected KEY=VALUE"))?;
    let key = key.trim();
    if !DEFINE_KEY.is_match(key) {
        return Err(invalid("key must be a dotted identifier"));
    }

    let value = parse_scalar(raw);
    Ok(key.rsplit('.').fold(value, |inner, segment| {
        let mut map = Mapping::new();
        map.insert(Value::String(segment.to_string()), inner);
        Value::Mapping(map)
    }))
}

/// Reads a define value as a YAML scalar. Anything else (comments, flow
/// collections, `a: b`) is kept verbatim as a string.
fn parse_scalar(raw: &str) -> Value {
    let verbatim = || Value::String(raw.to_string());
    if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
        return verbatim();
    }
    match serde_yaml_ng::from_str(raw) {
        Ok(value @ (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => verbatim(),
    }
}
