//! End-to-end rendering: read templates, load and merge variables, render,
//! then write. Nothing is written unless every stage succeeded: all outputs
//! are staged to temporary files before the first one is moved into place.

use crate::error::{RenderError, Result};
use crate::fs_utils::{
    StagedWrite, parent_dir, read_file_contents, read_stdin, separate_output_path, stage_write,
    write_atomic,
};
use crate::merge::{Namespace, merge};
use crate::template::{RenderConfig, render};
use crate::variables::{define_document, environment_document, load_document};
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a template is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Stdin,
    File(PathBuf),
}

impl TemplateSource {
    /// Maps a command-line argument to a source, `-` meaning stdin
    pub fn from_arg(arg: PathBuf) -> Self {
        if arg.as_path() == Path::new("-") {
            Self::Stdin
        } else {
            Self::File(arg)
        }
    }

    /// Name used for the template in diagnostics
    pub fn name(&self) -> String {
        match self {
            Self::Stdin => "<stdin>".to_string(),
            Self::File(path) => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
        }
    }

    /// Reads the template text.
    ///
    /// # Errors
    ///
    /// - `RenderError::TemplateNotFound` if a template file can't be read.
    /// - `RenderError::Io` if stdin can't be read.
    pub fn read(&self) -> Result<String> {
        match self {
            Self::Stdin => {
                info!("reading template from stdin");
                read_stdin()
            }
            Self::File(path) => {
                info!(path = %path.display(), "reading template");
                read_file_contents(path).map_err(|source| RenderError::TemplateNotFound {
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    fn directory(&self) -> PathBuf {
        match self {
            Self::Stdin => PathBuf::from("."),
            Self::File(path) => parent_dir(path),
        }
    }
}

/// Where rendered text goes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputTarget {
    /// All templates combined into one document on stdout
    #[default]
    Stdout,
    /// All templates combined into one document written to this file
    File(PathBuf),
    /// One document per template, written to this directory
    Directory(PathBuf),
}

/// Everything one run needs
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Templates in order; empty means a single template from stdin
    pub templates: Vec<TemplateSource>,
    /// Variables files, later files overriding earlier ones
    pub variables: Vec<PathBuf>,
    /// `KEY=VALUE` definitions applied on top of all variables files
    pub defines: Vec<String>,
    /// Expose the process environment as `env`, below all variables files
    pub include_env: bool,
    pub output: OutputTarget,
    pub config: RenderConfig,
}

/// One fully rendered document waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    /// `None` for stdout
    pub destination: Option<PathBuf>,
    pub text: String,
}

impl RenderedOutput {
    /// The text as written: the rendered document followed by a newline
    pub fn document(&self) -> String {
        format!("{}\n", self.text)
    }

    /// Writes the document to a temporary file next to its destination.
    /// Returns `None` for stdout, which can't be staged.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::OutputWrite` if the temporary file can't be written
    /// or the destination is a directory.
    pub fn stage(&self) -> Result<Option<StagedWrite>> {
        self.destination
            .as_deref()
            .map(|path| stage_write(path, &self.document()))
            .transpose()
    }

    /// Writes the document followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::OutputWrite` if the destination can't be written.
    pub fn write(&self) -> Result<()> {
        let document = self.document();
        match &self.destination {
            Some(path) => {
                info!(path = %path.display(), "writing output");
                write_atomic(path, &document)
            }
            None => {
                debug!("writing output to stdout");
                let mut stdout = io::stdout().lock();
                stdout
                    .write_all(document.as_bytes())
                    .and_then(|()| stdout.flush())
                    .map_err(|source| RenderError::OutputWrite {
                        destination: "<stdout>".to_string(),
                        source,
                    })
            }
        }
    }
}

/// Loads every variables source and merges them: environment first (when
/// enabled), then each variables file in order, then command-line definitions.
///
/// # Errors
///
/// Returns the first load, parse, shape or definition error encountered.
pub fn load_namespace(options: &PipelineOptions) -> Result<Namespace> {
    let mut documents = Vec::with_capacity(options.variables.len() + 2);
    if options.include_env {
        documents.push(environment_document());
    }
    for path in &options.variables {
        documents.push(load_document(path)?);
    }
    if !options.defines.is_empty() {
        documents.push(define_document(&options.defines)?);
    }

    let namespace = merge(documents)?;
    debug!(variables = namespace.len(), "namespace ready");
    Ok(namespace)
}

/// Renders every output in memory without writing anything.
///
/// # Errors
///
/// Returns the first error of any stage.
pub fn render_outputs(options: &PipelineOptions) -> Result<Vec<RenderedOutput>> {
    let stdin = [TemplateSource::Stdin];
    let templates: &[TemplateSource] = if options.templates.is_empty() {
        &stdin
    } else {
        &options.templates
    };

    match &options.output {
        OutputTarget::Directory(outdir) => render_separate(templates, outdir, options),
        OutputTarget::File(path) => {
            render_combined(templates, Some(path.clone()), options).map(|output| vec![output])
        }
        OutputTarget::Stdout => {
            render_combined(templates, None, options).map(|output| vec![output])
        }
    }
}

fn render_combined(
    templates: &[TemplateSource],
    destination: Option<PathBuf>,
    options: &PipelineOptions,
) -> Result<RenderedOutput> {
    info!(templates = templates.len(), "processing combined template");
    let mut source = String::new();
    for template in templates {
        source.push_str(&template.read()?);
    }
    let name = templates
        .iter()
        .map(TemplateSource::name)
        .collect::<Vec<_>>()
        .join("+");

    let namespace = load_namespace(options)?;
    let directory = templates
        .first()
        .map_or_else(|| PathBuf::from("."), TemplateSource::directory);
    let config = options.config.with_default_template_dir(directory);

    let text = render(&name, &source, &namespace, &config)?;
    Ok(RenderedOutput { destination, text })
}

fn render_separate(
    templates: &[TemplateSource],
    outdir: &Path,
    options: &PipelineOptions,
) -> Result<Vec<RenderedOutput>> {
    info!(templates = templates.len(), outdir = %outdir.display(), "processing separate templates");
    let mut sources = Vec::with_capacity(templates.len());
    let mut destinations = HashSet::with_capacity(templates.len());
    for template in templates {
        let TemplateSource::File(path) = template else {
            return Err(RenderError::InvalidOptions {
                message: "separate mode requires template files, not stdin".to_string(),
            });
        };
        let destination = separate_output_path(path, outdir)?;
        if !destinations.insert(destination.clone()) {
            return Err(RenderError::InvalidOptions {
                message: format!(
                    "more than one template renders to {}",
                    destination.display()
                ),
            });
        }
        sources.push((template, destination, template.read()?));
    }

    let namespace = load_namespace(options)?;

    sources
        .into_iter()
        .map(|(template, destination, source)| -> Result<RenderedOutput> {
            let config = options.config.with_default_template_dir(template.directory());
            let text = render(&template.name(), &source, &namespace, &config)?;
            Ok(RenderedOutput {
                destination: Some(destination),
                text,
            })
        })
        .collect()
}

/// Runs the whole pipeline. All documents are rendered, then every file
/// output is staged, before the first destination is replaced. A failing
/// stage leaves every destination untouched.
///
/// # Errors
///
/// Returns the first error of any stage.
pub fn run(options: &PipelineOptions) -> Result<()> {
    let outputs = render_outputs(options)?;

    let mut staged = Vec::with_capacity(outputs.len());
    for output in &outputs {
        match output.stage()? {
            Some(write) => staged.push(write),
            None => output.write()?,
        }
    }
    for write in staged {
        info!(path = %write.destination().display(), "writing output");
        write.commit()?;
    }

    info!(documents = outputs.len(), "rendering complete");
    Ok(())
}
