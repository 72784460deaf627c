// Error types for both pipelines
//
// Library modules return these typed errors; the binary wraps them in
// anyhow with context before exiting.

use thiserror::Error;

/// Errors raised while reading the raw pipe-delimited extract
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to open extract {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read extract line {line}: {source}")]
    Read {
        line: u64,
        #[source]
        source: csv::Error,
    },

    /// Row has too few non-empty columns for the requested positions
    #[error("Malformed row at line {line}: {columns} columns, need at least {required}")]
    MalformedRow {
        line: u64,
        columns: usize,
        required: usize,
    },
}

/// Errors raised by the identifier reconciler
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Firm index {path} line {line} is missing the {column} column")]
    FirmIndexRow {
        path: String,
        line: u64,
        column: &'static str,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a graph store backend
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("No transaction is open")]
    NoOpenTransaction,

    #[error("A transaction is already open")]
    TransactionAlreadyOpen,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cypher error {code}: {message}")]
    Cypher { code: String, message: String },

    #[error("Unexpected response from graph store: {0}")]
    Protocol(String),

    #[cfg(feature = "neo4j")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while loading documents into the graph
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A roster entry maps to a chamber or party with no taxonomy node
    #[error("No taxonomy node named '{0}'")]
    MissingAnchor(String),

    #[error("Invalid {document} document: {source}")]
    Document {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while building configuration at startup
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}
