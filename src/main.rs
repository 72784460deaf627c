use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lobbygraph::{
    run_reconciliation, GraphLoader, GraphStore, LobbyingDocument, ReconcilePaths, Roster,
    SqliteGraph, MAX_WRITES_PER_TX,
};

#[derive(Parser)]
#[command(name = "lobbygraph", version, about = "Congressional lobbying ETL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign lobbyist CUIDs and link employers from the raw extract
    Reconcile {
        /// Pipe-delimited lobbyist extract
        #[arg(long, default_value = "datasets/raw/Congress/Lobby/lob_lobbyist.txt")]
        extract: PathBuf,

        /// Firms table from the firm-processing stage
        #[arg(long, default_value = "datasets/processed/lobbying/firms.csv")]
        firms: PathBuf,

        /// Directory receiving lobbyists_store.csv and lobbyists_data.csv
        #[arg(long, default_value = "datasets/processed/lobbying")]
        out_dir: PathBuf,
    },
    /// Clear the graph and load taxonomy, roster and lobbying data
    Load {
        #[arg(long, default_value = "processed_data/congress/congress_list_excerpt.json")]
        roster: PathBuf,

        #[arg(long, default_value = "processed_data/lobbying/lobbying_data.json")]
        lobbying: PathBuf,

        /// Load into a SQLite graph file instead of Neo4j
        #[arg(long)]
        sqlite: Option<PathBuf>,

        /// Writes per transaction before committing
        #[arg(long, default_value_t = MAX_WRITES_PER_TX)]
        max_writes_per_tx: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Reconcile { extract, firms, out_dir } => run_reconcile(ReconcilePaths {
            extract,
            firms,
            out_dir,
        }),
        Commands::Load {
            roster,
            lobbying,
            sqlite,
            max_writes_per_tx,
        } => run_load(roster, lobbying, sqlite, max_writes_per_tx),
    }
}

fn run_reconcile(paths: ReconcilePaths) -> Result<()> {
    info!(extract = %paths.extract.display(), "Reconciling lobbyist identifiers");
    let report = run_reconciliation(&paths)
        .with_context(|| format!("Reconciliation of {} failed", paths.extract.display()))?;
    info!("{}", report.summary());
    Ok(())
}

fn run_load(
    roster_path: PathBuf,
    lobbying_path: PathBuf,
    sqlite: Option<PathBuf>,
    max_writes_per_tx: usize,
) -> Result<()> {
    let roster = Roster::from_path(&roster_path).context("Failed to load roster")?;
    let lobbying = LobbyingDocument::from_path(&lobbying_path).context("Failed to load lobbying data")?;

    match sqlite {
        Some(path) => {
            let store = SqliteGraph::open(&path)
                .with_context(|| format!("Failed to open graph database {}", path.display()))?;
            load_into(store, &roster, &lobbying, max_writes_per_tx)
        }
        None => load_into_neo4j(&roster, &lobbying, max_writes_per_tx),
    }
}

#[cfg(feature = "neo4j")]
fn load_into_neo4j(roster: &Roster, lobbying: &LobbyingDocument, max_writes_per_tx: usize) -> Result<()> {
    let config = lobbygraph::GraphConfig::from_env().context("Graph store configuration")?;
    info!(url = %config.base_url(), database = %config.database, "Connecting to Neo4j");
    let store = lobbygraph::Neo4jHttp::connect(&config).context("Failed to connect to Neo4j")?;
    load_into(store, roster, lobbying, max_writes_per_tx)
}

#[cfg(not(feature = "neo4j"))]
fn load_into_neo4j(_roster: &Roster, _lobbying: &LobbyingDocument, _max_writes_per_tx: usize) -> Result<()> {
    anyhow::bail!("Neo4j support not compiled in; rebuild with --features neo4j or pass --sqlite")
}

fn load_into<S: GraphStore>(
    store: S,
    roster: &Roster,
    lobbying: &LobbyingDocument,
    max_writes_per_tx: usize,
) -> Result<()> {
    let mut loader = GraphLoader::with_max_writes(store, max_writes_per_tx);
    let report = loader
        .run(roster, lobbying)
        .with_context(|| format!("Graph load aborted during {}", loader.phase()))?;
    info!("{}", report.summary());
    Ok(())
}
