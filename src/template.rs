//! Template rendering on top of minijinja.
//!
//! Templates see the merged namespace as their context. Output is plain text
//! (no HTML escaping) and `include`/`import`/`extends` load files from the
//! template directory only.

use crate::error::{RenderError, Result, SourceLocation};
use crate::fs_utils::{read_file_contents, resolve_template_path};
use crate::merge::Namespace;
use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior};
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// Configuration for template rendering
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    /// Abort the render when the template references a variable missing from
    /// the namespace. When off, undefined variables render as empty text.
    pub strict: bool,
    /// Directory that `include`/`import`/`extends` names are resolved against.
    /// Defaults to the current working directory.
    pub template_dir: Option<PathBuf>,
}

impl RenderConfig {
    /// Effective template directory
    pub fn template_dir(&self) -> PathBuf {
        self.template_dir.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    /// Copy of this config whose template directory falls back to `dir` when
    /// none was configured explicitly
    pub fn with_default_template_dir(&self, dir: PathBuf) -> Self {
        Self {
            strict: self.strict,
            template_dir: Some(self.template_dir.clone().unwrap_or(dir)),
        }
    }
}

fn environment<'source>(config: &RenderConfig) -> Environment<'source> {
    let mut env = Environment::new();
    // Output is arbitrary text, never HTML-escape
    env.set_auto_escape_callback(|_| AutoEscape::None);
    // Chainable lets `missing.attr` render empty like `missing` does
    env.set_undefined_behavior(if config.strict {
        UndefinedBehavior::Strict
    } else {
        UndefinedBehavior::Chainable
    });

    let base_dir = config.template_dir();
    env.set_loader(move |name| {
        let path = resolve_template_path(name, &base_dir)
            .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
        debug!(template = name, path = %path.display(), "loading included template");
        match read_file_contents(&path) {
            Ok(source) => Ok(Some(source)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(minijinja::Error::new(
                ErrorKind::InvalidOperation,
                format!("failed to read template {}", path.display()),
            )
            .with_source(e)),
        }
    });
    env
}

/// Renders `source` with the namespace as its variable context.
///
/// `name` identifies the template in diagnostics. Rendering the same source
/// with the same namespace always produces the same text.
///
/// # Errors
///
/// - `RenderError::TemplateSyntax` if the template (or an included one) is malformed.
/// - `RenderError::UndefinedVariable` if a variable is missing in strict mode.
/// - `RenderError::Render` for any other engine failure (missing include,
///   failing filter, ...).
pub fn render(
    name: &str,
    source: &str,
    namespace: &Namespace,
    config: &RenderConfig,
) -> Result<String> {
    debug!(template = name, strict = config.strict, "rendering template");
    let env = environment(config);
    let template = env
        .template_from_named_str(name, source)
        .map_err(|e| engine_error(name, &e, config.strict))?;
    template
        .render(namespace)
        .map_err(|e| engine_error(name, &e, config.strict))
}

/// Classifies an engine error. Undefined-variable errors are only reported as
/// such in strict mode.
fn engine_error(fallback_name: &str, err: &minijinja::Error, strict: bool) -> RenderError {
    let name = err.name().unwrap_or(fallback_name).to_string();
    let location = SourceLocation::line(err.line());
    let message = err
        .detail()
        .map_or_else(|| err.kind().to_string(), ToString::to_string);

    match err.kind() {
        ErrorKind::SyntaxError => RenderError::TemplateSyntax {
            name,
            location,
            message,
        },
        ErrorKind::UndefinedError if strict => RenderError::UndefinedVariable {
            name,
            location,
            message,
        },
        _ => RenderError::Render {
            name,
            message: err.to_string(),
        },
    }
}
