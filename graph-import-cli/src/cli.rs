use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use graph_import::{ClientConfig, HttpUploadClient, ImportConfig, Importer, output};

use crate::logging;
use crate::progress::TerminalProgress;

#[derive(Debug, Parser)]
#[command(name = "graph-import")]
#[command(about = "Validate and upload node, list and relation files to a graph project")]
#[command(version)]
pub struct Cli {
    /// Verbosity: -v for info, -vv for debug (`RUST_LOG` overrides)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate every file, then upload nodes, lists and relations
    Import(ImportArgs),
    /// Validate every file without uploading anything
    Validate(SourceArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Import root containing nodes/, lists/ and relations/
    #[arg(short, long)]
    pub data: String,

    /// File with the project's type definitions
    #[arg(short, long)]
    pub types: String,

    /// Maximum size of a single import file in bytes
    #[arg(long, default_value_t = ImportConfig::default().max_file_size)]
    pub max_file_size: u64,

    /// Follow symbolic links inside the category directories
    #[arg(long)]
    pub follow_links: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Target project id
    #[arg(short, long, env = "GRAPH_IMPORT_PROJECT")]
    pub project: String,

    /// Base URL of the import service
    #[arg(long, env = "GRAPH_IMPORT_ENDPOINT")]
    pub endpoint: String,

    /// Bearer token for the import service
    #[arg(long, env = "GRAPH_IMPORT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Per-request timeout in seconds (no timeout by default)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Format of the summary printed after a successful import
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Import(args) => import(&args).await,
        Command::Validate(args) => validate(&args),
    }
}

async fn import(args: &ImportArgs) -> anyhow::Result<()> {
    let (data, types, config) = load_source(&args.source)?;

    let mut client_config = ClientConfig::new(args.endpoint.clone());
    client_config.token.clone_from(&args.token);
    client_config.timeout = args.timeout_secs.map(Duration::from_secs);
    let client = HttpUploadClient::new(&client_config)?;

    let importer = Importer::new(&data, types, client, config)?;
    tracing::info!(
        project = %args.project,
        endpoint = %args.endpoint,
        root = %importer.root().path().display(),
        "Starting import"
    );
    let mut progress = TerminalProgress::new();
    let result = importer.upload(&args.project, &mut progress).await;
    progress.close_line();
    let summary = result?;

    let mut stdout = std::io::stdout().lock();
    match args.format {
        OutputFormat::Human => output::write_human(&summary, &mut stdout)?,
        OutputFormat::Json => output::write_json(&summary, &mut stdout)?,
    }
    stdout.flush()?;
    Ok(())
}

fn validate(args: &SourceArgs) -> anyhow::Result<()> {
    let (data, types, config) = load_source(args)?;

    let importer = Importer::new(&data, types, (), config)?;
    let mut progress = TerminalProgress::new();
    let result = importer.validate(&mut progress);
    progress.close_line();
    let files = result?;

    println!(
        "\u{2713} {} file(s) valid ({} nodes, {} lists, {} relations)",
        files.len(),
        files.nodes.len(),
        files.lists.len(),
        files.relations.len()
    );
    Ok(())
}

fn load_source(args: &SourceArgs) -> anyhow::Result<(PathBuf, String, ImportConfig)> {
    let data = expand_path(&args.data)?;
    let types_path = expand_path(&args.types)?;
    let types = fs::read_to_string(&types_path)
        .with_context(|| format!("Failed to read type definitions {}", types_path.display()))?;

    let mut config = ImportConfig::default();
    config.max_file_size = args.max_file_size;
    config.follow_links = args.follow_links;
    Ok((data, types, config))
}

/// Expand `~` and environment variables in a user-supplied path.
fn expand_path(raw: &str) -> anyhow::Result<PathBuf> {
    let expanded =
        shellexpand::full(raw).with_context(|| format!("Failed to expand path '{raw}'"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
