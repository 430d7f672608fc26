//! rcfg - Reactive Config CLI tool
//!
//! Loads, merges and diffs configuration trees from the command line.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use reactive_config::error::{Error, Result};
use reactive_config::source::{DocumentParser, JsonParser, ParseError};
use reactive_config::value::{self, Map, Value};
use reactive_config::{
    diff, merge_documents, ConflictPolicy, DiffResult, DirectoryLoader, YamlParser,
};

/// rcfg - load, merge and diff configuration trees
#[derive(Parser, Debug)]
#[command(name = "rcfg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for debug logs)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output location. Use '-' for stdout
    #[arg(short, long, default_value = "-", global = true)]
    output: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Yaml, global = true)]
    format: Format,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load config directories and print the merged tree
    Load {
        /// Directory holding the config directories
        #[arg(long)]
        root: PathBuf,

        /// Config directory under the root, in override order
        #[arg(long = "dir", required = true)]
        dirs: Vec<String>,

        /// Template parameter as KEY=VALUE
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        /// Print only the documents of this kind
        #[arg(long)]
        kind: Option<String>,

        /// Descend into subdirectories
        #[arg(long)]
        recursive: bool,

        /// Merge documents sharing a kind and name instead of replacing them
        #[arg(long)]
        deep: bool,
    },

    /// Print what CANDIDATE changed, added and removed relative to CURRENT
    Diff {
        candidate: PathBuf,
        current: PathBuf,

        /// List dotted leaf paths instead of the changed, added and removed trees
        #[arg(long)]
        paths: bool,
    },

    /// Merge the documents of several files into one tree
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Merge documents sharing a kind and name instead of replacing them
        #[arg(long)]
        deep: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_tracing(verbose: u8) {
    let filter = if verbose > 0 {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut output: Box<dyn Write> = if cli.output == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(fs::File::create(&cli.output).map_err(|e| Error::io(&cli.output, e))?)
    };

    let tree: Map = match cli.command {
        Command::Load {
            root,
            dirs,
            params,
            kind,
            recursive,
            deep,
        } => {
            let loader = DirectoryLoader::new(root, dirs)
                .with_params(params.into_iter().collect())
                .with_policy(policy(deep))
                .recursive(recursive);
            match kind {
                Some(kind) => loader.load_kind(&kind)?,
                None => loader.load()?,
            }
        }
        Command::Diff {
            candidate,
            current,
            paths,
        } => {
            let candidate = read_tree(&candidate)?;
            let current = read_tree(&current)?;
            let delta = diff(&candidate, &current);
            debug!(empty = delta.is_empty(), "computed diff");
            if paths {
                write!(output, "{}", delta).map_err(|e| Error::io(&cli.output, e))?;
                if !delta.is_empty() {
                    writeln!(output).map_err(|e| Error::io(&cli.output, e))?;
                }
                return Ok(());
            }
            diff_document(delta)
        }
        Command::Merge { files, deep } => {
            let mut docs = Vec::new();
            for file in &files {
                docs.extend(read_documents(file)?);
            }
            merge_documents(docs, policy(deep))?
        }
    };

    let text = match cli.format {
        Format::Yaml => value::to_yaml(&Value::Map(tree))?,
        Format::Json => value::to_json_pretty(&Value::Map(tree))? + "\n",
    };
    output
        .write_all(text.as_bytes())
        .map_err(|e| Error::io(&cli.output, e))?;
    Ok(())
}

/// The three parts of a diff as one tree, for yaml and json output.
fn diff_document(delta: DiffResult) -> Map {
    [
        ("changed", delta.changed),
        ("added", delta.added),
        ("removed", delta.removed),
    ]
    .into_iter()
    .collect()
}

fn policy(deep: bool) -> ConflictPolicy {
    if deep {
        ConflictPolicy::DeepMerge
    } else {
        ConflictPolicy::Overwrite
    }
}

/// Parses `KEY=VALUE`; scalar YAML values keep their type.
fn parse_param(s: &str) -> std::result::Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    let value = match value::from_yaml(raw) {
        Ok(v) if !v.is_container() && !v.is_null() => v,
        _ => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json")
}

fn read_documents(path: &Path) -> Result<Vec<Map>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let docs = if is_json(path) {
        JsonParser.parse(&text)?
    } else {
        YamlParser.parse(&text)?
    };
    Ok(docs)
}

fn read_tree(path: &Path) -> Result<Map> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let tree = if is_json(path) {
        value::from_json(&text)?
    } else {
        value::from_yaml(&text)?
    };
    match tree {
        Value::Map(m) => Ok(m),
        Value::Null => Ok(Map::new()),
        other => Err(ParseError::new(format!(
            "{}: expected a mapping at the root, got a {}",
            path.display(),
            other.type_name()
        ))
        .into()),
    }
}
