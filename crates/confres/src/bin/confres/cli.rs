//! confres cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; confres ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve every reference in a document
    ///
    /// Reads YAML from stdin unless a file is given with -f
    Resolve(ResolveCommand),

    /// List the references of a document without resolving them
    Analyze(AnalyzeCommand),
}

#[derive(Parser, Debug)]
pub struct ResolveCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub resolution: ResolutionArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Print resolution metadata alongside the resolved document
    #[clap(short = 'm', long = "metadata")]
    pub metadata: bool,
}

#[derive(Parser, Debug)]
pub struct AnalyzeCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub resolution: ResolutionArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Load a file (json, yaml, toml or hcl, by extension)
    #[clap(short = 'f', long = "input-file")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ResolutionArgs {
    /// Value for `${opt:<key>}`, as key=value
    ///
    /// Can be specified multiple times.
    #[clap(short = 'o', long = "opt", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,

    /// Emit references of unknown type verbatim
    #[clap(long)]
    pub allow_unknown: bool,

    /// Turn references whose lookups are all undefined into null
    #[clap(long)]
    pub allow_undefined: bool,

    /// Emit references that cannot be resolved verbatim
    #[clap(long)]
    pub allow_unresolved: bool,

    /// Merge arrays of objects under this key into one object
    #[clap(long = "merge-key")]
    pub merge_keys: Vec<String>,

    /// Leave strings under this key untouched
    #[clap(long = "verbatim-key")]
    pub verbatim_keys: Vec<String>,

    /// Text before the opening token of a reference
    #[clap(long, default_value = "$")]
    pub prefix: String,

    /// Opening token of a reference
    #[clap(long, default_value = "{")]
    pub open: String,

    /// Closing token of a reference
    #[clap(long, default_value = "}")]
    pub close: String,

    /// Maximum number of references resolved at the same time
    #[clap(long, default_value_t = 8)]
    pub concurrency: usize,
}

fn parse_key_value(text: &str) -> Result<(String, String), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{text}`"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in `{text}`"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
