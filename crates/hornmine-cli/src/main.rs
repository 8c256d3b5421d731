//! Hornmine CLI - Command line interface for Horn rule mining

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, config as config_cmd, explore, io, mine};
use config::{default_config_path, default_data_dir, Config};
use hornmine_kb::{FileExampleStore, RedbKb};
use hornmine_miner::Miner;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "hornmine")]
#[command(author, version, about = "Discover Horn rules in knowledge graphs")]
pub struct Cli {
    /// Data directory
    #[arg(short, long, global = true)]
    pub data_dir: Option<String>,

    /// Config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format: table, json
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config file path: `--config`, else the per-user default
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    /// Data directory: `--data-dir`, then the config file, then the default
    pub fn data_dir(&self, config: &Config) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| config.data_dir.clone())
            .unwrap_or_else(default_data_dir)
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from(self.format.as_str())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import facts from a TSV file
    Import(io::ImportArgs),
    /// List the relations of the knowledge base
    Relations,
    /// Show the subject and object types of a relation
    Types(explore::TypesArgs),
    /// Discover rules for a relation
    Discover(mine::DiscoverArgs),
    /// Instantiate a rule
    Instantiate(mine::InstantiateArgs),
    /// Show the surrounding graph of entities
    Graph(explore::GraphArgs),
    /// Manage configuration
    Config(config_cmd::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with the knowledge base and miner
pub struct AppContext {
    pub kb: Arc<RedbKb>,
    pub miner: Miner,
}

impl AppContext {
    pub fn new(cli: &Cli, config: &Config) -> anyhow::Result<Self> {
        let data_dir = cli.data_dir(config);
        std::fs::create_dir_all(&data_dir)?;

        let db_path = data_dir.join("hornmine.redb");
        tracing::debug!("Using database at: {:?}", db_path);

        let mut kb = RedbKb::open(&db_path)?;
        if let Some(type_predicate) = &config.type_predicate {
            kb = kb.with_type_predicate(type_predicate.as_str());
        }
        let kb = Arc::new(kb);

        let store = Arc::new(FileExampleStore::new(data_dir.join("examples")));
        let miner = Miner::new(kb.clone(), store, config.miner.clone())?;

        Ok(Self { kb, miner })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting hornmine CLI");

    // Commands that never touch the knowledge base
    match &cli.command {
        Commands::Config(args) => return config_cmd::run(args, &cli.config_path()),
        Commands::Completions(args) => return completions::run(args),
        _ => {}
    }

    let config = Config::load(&cli.config_path())?;
    let mut ctx = AppContext::new(&cli, &config)?;

    match &cli.command {
        Commands::Import(args) => io::run_import(args, &cli, &ctx)?,
        Commands::Relations => explore::run_relations(&cli, &ctx).await?,
        Commands::Types(args) => explore::run_types(args, &cli, &ctx).await?,
        Commands::Discover(args) => mine::run_discover(args, &cli, &mut ctx).await?,
        Commands::Instantiate(args) => mine::run_instantiate(args, &cli, &mut ctx).await?,
        Commands::Graph(args) => explore::run_graph(args, &cli, &ctx).await?,
        Commands::Config(_) | Commands::Completions(_) => {}
    }

    Ok(())
}
