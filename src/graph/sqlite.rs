// Embedded property graph on SQLite
//
// Nodes and relationships live in two tables; node properties are stored
// as a JSON object so the schema never changes with the vocabulary.

use super::{GraphStore, Label, Node, NodeId, RelType};
use crate::error::GraphError;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::path::Path;

/// Node read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub id: NodeId,
    pub label: String,
    pub properties: Map<String, Value>,
}

pub struct SqliteGraph {
    conn: Connection,
    in_tx: bool,
}

impl SqliteGraph {
    pub fn open(path: &Path) -> Result<Self, GraphError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, GraphError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, GraphError> {
        setup_schema(&conn)?;
        Ok(SqliteGraph { conn, in_tx: false })
    }

    pub fn count_nodes(&self, label: Option<Label>) -> Result<i64, GraphError> {
        let count = match label {
            Some(label) => self.conn.query_row(
                "SELECT COUNT(*) FROM nodes WHERE label = ?1",
                [label.as_str()],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    pub fn count_relationships(&self, rel: Option<RelType>) -> Result<i64, GraphError> {
        let count = match rel {
            Some(rel) => self.conn.query_row(
                "SELECT COUNT(*) FROM relationships WHERE rel_type = ?1",
                [rel.as_str()],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    pub fn find_nodes(&self, label: Label) -> Result<Vec<StoredNode>, GraphError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, properties FROM nodes WHERE label = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map([label.as_str()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, label, json)| -> Result<StoredNode, GraphError> {
                Ok(StoredNode {
                    id: NodeId(id),
                    label,
                    properties: serde_json::from_str(&json)?,
                })
            })
            .collect()
    }

    /// Whether a `from_name -[rel]-> to_name` edge exists between named nodes
    pub fn has_relationship(&self, from_name: &str, rel: RelType, to_name: &str) -> Result<bool, GraphError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM relationships r
             JOIN nodes a ON a.id = r.from_node
             JOIN nodes b ON b.id = r.to_node
             WHERE r.rel_type = ?1
               AND COALESCE(json_extract(a.properties, '$.name'), json_extract(a.properties, '$.full_name')) = ?2
               AND COALESCE(json_extract(b.properties, '$.name'), json_extract(b.properties, '$.full_name')) = ?3",
            params![rel.as_str(), from_name, to_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

fn setup_schema(conn: &Connection) -> Result<(), GraphError> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            properties TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS relationships (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            from_node INTEGER NOT NULL REFERENCES nodes(id),
            rel_type TEXT NOT NULL,
            to_node INTEGER NOT NULL REFERENCES nodes(id),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_relationships_type ON relationships(rel_type)",
        [],
    )?;

    Ok(())
}

impl GraphStore for SqliteGraph {
    fn clear(&mut self) -> Result<(), GraphError> {
        self.conn
            .execute_batch("DELETE FROM relationships; DELETE FROM nodes;")?;
        Ok(())
    }

    fn create_node(&mut self, node: &Node) -> Result<NodeId, GraphError> {
        let properties = serde_json::to_string(&node.properties)?;
        self.conn.execute(
            "INSERT INTO nodes (label, properties) VALUES (?1, ?2)",
            params![node.label.as_str(), properties],
        )?;
        Ok(NodeId(self.conn.last_insert_rowid()))
    }

    fn create_relationship(&mut self, from: NodeId, rel: RelType, to: NodeId) -> Result<(), GraphError> {
        self.conn.execute(
            "INSERT INTO relationships (from_node, rel_type, to_node) VALUES (?1, ?2, ?3)",
            params![from.0, rel.as_str(), to.0],
        )?;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), GraphError> {
        if self.in_tx {
            return Err(GraphError::TransactionAlreadyOpen);
        }
        self.conn.execute_batch("BEGIN")?;
        self.in_tx = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), GraphError> {
        if !self.in_tx {
            return Err(GraphError::NoOpenTransaction);
        }
        self.conn.execute_batch("COMMIT")?;
        self.in_tx = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }
}
