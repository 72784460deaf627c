// Lobbying Graph ETL - Core Library
// Exposes both pipelines for use in the CLI and tests

pub mod error;
pub mod config;
pub mod extract;         // Raw pipe-delimited extract reader
pub mod reconciliation;  // Identifier Reconciler - LID → CUID, employer links
pub mod graph;           // Graph store seam + SQLite / Neo4j backends
pub mod loader;          // Graph Loader - taxonomy, roster, lobbying

// Re-export commonly used types
pub use error::{ConfigError, ExtractError, GraphError, LoadError, ReconcileError};
pub use config::{GraphConfig, MAX_WRITES_PER_TX};
pub use extract::{clean_row, index_by, index_by_reader, read_extract, ExtractRow};
pub use reconciliation::{
    bundle, reconcile, run_reconciliation,
    EmployerId, FirmIndex, LobbyistRecord, LobbyistStore,
    Reconciliation, ReconcilePaths, ReconcileReport, StoreRow,
};
pub use graph::{GraphStore, Label, Node, NodeId, RelType, SqliteGraph};
#[cfg(feature = "neo4j")]
pub use graph::Neo4jHttp;
pub use loader::{
    chamber_name, party_name, clear_graph, seed_taxonomy, load_roster, load_lobbying,
    GraphLoader, LoadPhase, LoadReport, LobbyingDocument, Roster, RootNodes, TxBatcher,
    POLITICAL_ROOTS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
