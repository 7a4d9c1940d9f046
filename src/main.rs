use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use yamlrender::{
    OutputTarget, PipelineOptions, RenderConfig, Result, TemplateSource, load_namespace,
    render_outputs,
};

const LONG_HELP: &str = r#"
Variables:
  Variables files are YAML mappings merged in the order given, later files
  overriding earlier ones. Nested mappings merge key by key; lists and
  scalars are replaced wholesale.

  Precedence, lowest first:
    --env                 process environment, exposed as {{ env.NAME }}
    -f/--vars FILE ...    variables files, in order
    -D/--define K=V ...   command-line definitions (dotted keys nest)

Exit codes:
  0  success
  1  I/O error
  2  invalid arguments
  3  template or variables file not found
  4  variables file is not valid YAML
  5  variables document is not a mapping / invalid --define
  6  template syntax error, undefined variable (--strict) or render error
  7  output could not be written

Examples:
  # Render to stdout
  yamlrender nginx.conf.j2 -f defaults.yml -f prod.yml
  # Render from stdin
  echo 'Hello {{ name }}' | yamlrender -D name=world
  # Write to a file, failing on undefined variables
  yamlrender nginx.conf.j2 -f vars.yml --strict -o nginx.conf
  # One output per template (name without last extension) in build/
  yamlrender --separate --outdir build a.conf.j2 b.conf.j2 -f vars.yml
  # Show the merged variables
  yamlrender -f defaults.yml -f prod.yml --print-vars=json
"#;

/// Render Jinja templates from layered YAML variable files.
#[derive(Parser, Debug)]
#[command(
    name = "yamlrender",
    version,
    about = "Render Jinja templates from layered YAML variable files.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Templates to render; read from stdin when none are given or for '-'
    #[arg(value_name = "TEMPLATE")]
    templates: Vec<PathBuf>,

    /// YAML variables file (repeatable, later files take precedence)
    #[arg(short = 'f', long = "vars", value_name = "FILE", action = clap::ArgAction::Append)]
    variables: Vec<PathBuf>,

    /// Define a variable, overriding all files (repeatable)
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    defines: Vec<String>,

    /// Expose environment variables as `env`
    #[arg(long)]
    env: bool,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE", conflicts_with = "separate")]
    output: Option<PathBuf>,

    /// Render each template to its own file instead of concatenating them
    #[arg(short, long, requires = "templates")]
    separate: bool,

    /// Directory for output files in separate mode
    #[arg(short = 'O', long, value_name = "DIR", requires = "separate")]
    outdir: Option<PathBuf>,

    /// Fail on variables missing from the namespace instead of rendering them empty
    #[arg(long, env = "YAMLRENDER_STRICT")]
    strict: bool,

    /// Directory for resolving include/import/extends (defaults to the template's directory)
    #[arg(short = 'I', long, value_name = "DIR", env = "YAMLRENDER_TEMPLATE_DIR")]
    template_dir: Option<PathBuf>,

    /// Render everything but write nothing
    #[arg(long, conflicts_with = "print_vars")]
    check: bool,

    /// Print the merged variables (yaml or json) and exit
    #[arg(long, value_name = "FORMAT", num_args = 0..=1, require_equals = true, default_missing_value = "yaml")]
    print_vars: Option<VarsFormat>,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum VarsFormat {
    /// YAML document
    Yaml,
    /// Pretty-printed JSON
    Json,
}

impl Cli {
    fn pipeline_options(&self) -> PipelineOptions {
        let output = match (&self.output, self.separate) {
            (_, true) => OutputTarget::Directory(
                self.outdir.clone().unwrap_or_else(|| PathBuf::from(".")),
            ),
            (Some(path), false) => OutputTarget::File(path.clone()),
            (None, false) => OutputTarget::Stdout,
        };

        PipelineOptions {
            templates: self
                .templates
                .iter()
                .cloned()
                .map(TemplateSource::from_arg)
                .collect(),
            variables: self.variables.clone(),
            defines: self.defines.clone(),
            include_env: self.env,
            output,
            config: RenderConfig {
                strict: self.strict,
                template_dir: self.template_dir.clone(),
            },
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let options = cli.pipeline_options();
    let result = if let Some(format) = cli.print_vars {
        print_vars(&options, format)
    } else if cli.check {
        check(&options)
    } else {
        yamlrender::run(&options)
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_vars(options: &PipelineOptions, format: VarsFormat) -> Result<()> {
    let namespace = load_namespace(options)?;
    let rendered = match format {
        VarsFormat::Yaml => serde_yaml_ng::to_string(&namespace)?,
        VarsFormat::Json => serde_json::to_string_pretty(&namespace)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn check(options: &PipelineOptions) -> Result<()> {
    let outputs = render_outputs(options)?;
    for output in &outputs {
        let destination = output
            .destination
            .as_ref()
            .map_or_else(|| "<stdout>".to_string(), |p| p.display().to_string());
        info!(destination = %destination, bytes = output.text.len() + 1, "would write");
    }
    println!("{} document(s) rendered, nothing written", outputs.len());
    Ok(())
}
