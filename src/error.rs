use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for generic I/O failures (stdin, serialization of diagnostics)
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for invalid option combinations
pub const EXIT_USAGE: i32 = 2;
/// Exit code when a template or variables file cannot be read
pub const EXIT_LOAD: i32 = 3;
/// Exit code when a variables file is not valid YAML
pub const EXIT_PARSE: i32 = 4;
/// Exit code when a variables document is not a mapping
pub const EXIT_SHAPE: i32 = 5;
/// Exit code when the template fails to compile or render
pub const EXIT_RENDER: i32 = 6;
/// Exit code when the rendered output cannot be written
pub const EXIT_WRITE: i32 = 7;

/// Line/column position reported by the YAML parser or the template engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl SourceLocation {
    pub fn line(line: Option<usize>) -> Self {
        Self { line, column: None }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, " at line {line}, column {column}"),
            (Some(line), None) => write!(f, " at line {line}"),
            _ => Ok(()),
        }
    }
}

/// Main error type for yamlrender operations
#[derive(Error, Debug)]
pub enum RenderError {
    /// IO error outside of the template/variables/output paths (e.g. stdin)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Template file could not be opened or read
    #[error("Template not found or unreadable: {}: {source}", .path.display())]
    TemplateNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Variables file could not be opened or read
    #[error("Variables file not found or unreadable: {}: {source}", .path.display())]
    DocumentNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Variables file is not syntactically valid YAML
    #[error("YAML parse error in {origin}{location}: {message}")]
    DocumentParse {
        origin: String,
        location: SourceLocation,
        message: String,
    },

    /// Variables document root is a scalar or sequence instead of a mapping
    #[error("Variables document {origin} must be a mapping at its root, found {found}")]
    InvalidDocumentShape { origin: String, found: &'static str },

    /// Malformed `KEY=VALUE` command-line definition
    #[error("Invalid variable definition '{definition}': {reason}")]
    InvalidDefine {
        definition: String,
        reason: &'static str,
    },

    /// Template source is malformed
    #[error("Template syntax error in {name}{location}: {message}")]
    TemplateSyntax {
        name: String,
        location: SourceLocation,
        message: String,
    },

    /// Template referenced a variable missing from the namespace (strict mode only)
    #[error("Undefined variable in {name}{location}: {message}")]
    UndefinedVariable {
        name: String,
        location: SourceLocation,
        message: String,
    },

    /// Any other failure raised by the template engine while rendering
    #[error("Template render error in {name}: {message}")]
    Render { name: String, message: String },

    /// Included template resolves outside of the template directory
    #[error("Path traversal detected (template outside template directory): {}", .path.display())]
    PathTraversal { path: PathBuf },

    /// Rendered text could not be written to its destination
    #[error("Failed to write output to {destination}: {source}")]
    OutputWrite {
        destination: String,
        #[source]
        source: io::Error,
    },

    /// Options that cannot be combined
    #[error("Invalid options: {message}")]
    InvalidOptions { message: String },

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    /// Process exit code for this failure class, so build scripts can tell
    /// load, parse, shape, render and write failures apart.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) | Self::Yaml(_) | Self::Json(_) => EXIT_FAILURE,
            Self::InvalidOptions { .. } => EXIT_USAGE,
            Self::TemplateNotFound { .. } | Self::DocumentNotFound { .. } => EXIT_LOAD,
            Self::DocumentParse { .. } => EXIT_PARSE,
            Self::InvalidDocumentShape { .. } | Self::InvalidDefine { .. } => EXIT_SHAPE,
            Self::TemplateSyntax { .. }
            | Self::UndefinedVariable { .. }
            | Self::Render { .. }
            | Self::PathTraversal { .. } => EXIT_RENDER,
            Self::OutputWrite { .. } => EXIT_WRITE,
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::DocumentParse {
            origin: "vars.yml".to_string(),
            location: SourceLocation {
                line: Some(3),
                column: Some(7),
            },
            message: "did not find expected key".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "YAML parse error in vars.yml at line 3, column 7: did not find expected key"
        );

        let err = RenderError::InvalidDocumentShape {
            origin: "list.yml".to_string(),
            found: "a sequence",
        };
        assert_eq!(
            format!("{err}"),
            "Variables document list.yml must be a mapping at its root, found a sequence"
        );

        let err = RenderError::TemplateSyntax {
            name: "page.j2".to_string(),
            location: SourceLocation::line(Some(2)),
            message: "unexpected end of input".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Template syntax error in page.j2 at line 2: unexpected end of input"
        );

        let err = RenderError::UndefinedVariable {
            name: "page.j2".to_string(),
            location: SourceLocation::default(),
            message: "undefined value".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Undefined variable in page.j2: undefined value"
        );

        let err = RenderError::PathTraversal {
            path: PathBuf::from("/etc/passwd"),
        };
        assert!(format!("{err}").contains("Path traversal detected"));

        let err = RenderError::DocumentNotFound {
            path: PathBuf::from("missing.yml"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(format!("{err}").contains("missing.yml"));
        assert!(format!("{err}").contains("no such file"));
    }

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        let load = RenderError::DocumentNotFound {
            path: PathBuf::from("a.yml"),
            source: not_found,
        };
        let parse = RenderError::DocumentParse {
            origin: "a.yml".to_string(),
            location: SourceLocation::default(),
            message: "bad".to_string(),
        };
        let shape = RenderError::InvalidDocumentShape {
            origin: "a.yml".to_string(),
            found: "a string",
        };
        let render = RenderError::UndefinedVariable {
            name: "t".to_string(),
            location: SourceLocation::default(),
            message: "missing".to_string(),
        };
        let write = RenderError::OutputWrite {
            destination: "out.txt".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };

        let codes = [
            load.exit_code(),
            parse.exit_code(),
            shape.exit_code(),
            render.exit_code(),
            write.exit_code(),
        ];
        assert_eq!(
            codes,
            [EXIT_LOAD, EXIT_PARSE, EXIT_SHAPE, EXIT_RENDER, EXIT_WRITE]
        );
        assert!(codes.iter().all(|code| *code != 0));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test");
        let err: RenderError = io_err.into();
        assert!(matches!(err, RenderError::Io(_)));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: RenderError = json_err.into();
        assert!(matches!(err, RenderError::Json(_)));
    }
}
