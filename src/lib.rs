//! # yamlrender
//!
//! Renders Jinja templates with variables taken from one or more YAML files.
//! Meant to run as a build step: a defaults file, then override files, then
//! per-target files are merged into one namespace and fed to the template.
//!
//! ## Features
//!
//! - Deep merge of variable files, later files taking precedence
//! - Permissive (empty) or strict (error) handling of undefined variables
//! - `include`/`import`/`extends` resolved next to the template, never outside it
//! - Optional environment (`env.*`) and `KEY=VALUE` command-line variables
//! - Atomic output: a failed run never leaves a half-written file
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use yamlrender::{OutputTarget, PipelineOptions, TemplateSource};
//!
//! let options = PipelineOptions {
//!     templates: vec![TemplateSource::File("nginx.conf.j2".into())],
//!     variables: vec!["defaults.yml".into(), "prod.yml".into()],
//!     output: OutputTarget::File("nginx.conf".into()),
//!     ..PipelineOptions::default()
//! };
//!
//! if let Err(e) = yamlrender::run(&options) {
//!     eprintln!("Error: {e}");
//! }
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Render to stdout
//! yamlrender nginx.conf.j2 -f defaults.yml -f prod.yml
//!
//! # Render to a file, failing on undefined variables
//! yamlrender nginx.conf.j2 -f vars.yml --strict -o nginx.conf
//!
//! # One output per template in build/
//! yamlrender -s -O build a.conf.j2 b.conf.j2 -f vars.yml
//! ```

pub mod error;
pub mod fs_utils;
pub mod merge;
pub mod pipeline;
pub mod template;
pub mod variables;

// Re-export main types and functions for convenience
pub use error::{RenderError, Result, SourceLocation};
pub use merge::{Namespace, merge, merge_value};
pub use pipeline::{
    OutputTarget, PipelineOptions, RenderedOutput, TemplateSource, load_namespace,
    render_outputs, run,
};
pub use template::{RenderConfig, render};
pub use variables::{
    VariableDocument, define_document, environment_document, load_document, parse_document,
};
