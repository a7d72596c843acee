mod cli;

use confres::documents::{self, Format};
use confres::scanner::Delimiters;
use confres::{DocumentSource, Options, Value};

#[tokio::main]
async fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CONFRES_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Resolve(resolve_cli) => resolve(resolve_cli).await,
        cli::Command::Analyze(analyze_cli) => analyze(analyze_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub async fn resolve(cli: cli::ResolveCommand) -> anyhow::Result<()> {
    let source = load(&cli.input)?;
    let options = options(&cli.resolution)?;

    if !cli.metadata {
        let value = confres::resolve(source, options).await?;
        return output(&cli.output, &value);
    }

    match confres::resolve_with_metadata(source, options).await {
        Ok(resolved) => output(&cli.output, &resolved),
        Err(failed) => {
            // best-effort diagnostics go to stderr, the error itself is reported by main
            eprintln!("{}", serde_json::to_string_pretty(&failed.metadata)?);
            Err(failed.error.into())
        }
    }
}

pub fn analyze(cli: cli::AnalyzeCommand) -> anyhow::Result<()> {
    let source = load(&cli.input)?;
    let options = options(&cli.resolution)?;

    let analysis = confres::analyze(source, &options)?;
    output(&cli.output, &analysis)
}

fn load(input: &cli::InputArgs) -> anyhow::Result<DocumentSource> {
    if let Some(file) = &input.file {
        return Ok(file.clone().into());
    }

    let stdin = std::io::read_to_string(std::io::stdin())?;
    let tree = documents::parse_str(&stdin, Format::Yaml, std::path::Path::new("<stdin>"))?;
    Ok(tree.into())
}

fn options(args: &cli::ResolutionArgs) -> anyhow::Result<Options> {
    let delimiters = Delimiters::new(&args.prefix, &args.open, &args.close)?;

    let mut options = Options::new()
        .with_delimiters(delimiters)
        .with_concurrency(args.concurrency)
        .allow_unknown(args.allow_unknown)
        .allow_undefined(args.allow_undefined)
        .allow_unresolved(args.allow_unresolved);

    for (key, value) in &args.options {
        options = options.with_option(key, Value::from(value.as_str()));
    }
    for key in &args.merge_keys {
        options = options.with_merge_key(key);
    }
    for key in &args.verbatim_keys {
        options = options.with_verbatim_key(key);
    }

    tracing::debug!(?options, "options");
    Ok(options)
}

fn output(output: &cli::OutputArgs, value: &impl serde::Serialize) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}
