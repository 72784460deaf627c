// 🕸️ Graph Store - Labels, relationships and the backend seam
//
// The loader only speaks this trait. Backends:
//   - SqliteGraph: embedded property graph (nodes + relationships tables)
//   - Neo4jHttp:   Neo4j transactional Cypher endpoint (feature "neo4j")

mod sqlite;
#[cfg(feature = "neo4j")]
mod neo4j;

pub use sqlite::{SqliteGraph, StoredNode};
#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jHttp;

use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// VOCABULARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Institution,
    Chamber,
    Party,
    Politician,
    LobbyingAgency,
    Lobbyist,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Institution => "Institution",
            Label::Chamber => "Chamber",
            Label::Party => "Party",
            Label::Politician => "Politician",
            Label::LobbyingAgency => "Lobbying Agency",
            Label::Lobbyist => "Lobbyist",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelType {
    IsAChamberOf,
    MemberOf,
    WorksFor,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::IsAChamberOf => "IS_A_CHAMBER_OF",
            RelType::MemberOf => "MEMBER_OF",
            RelType::WorksFor => "WORKS_FOR",
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-assigned handle of a created node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// NODE
// ============================================================================

/// Node to be created: one label plus string-keyed properties
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub label: Label,
    pub properties: Map<String, Value>,
}

impl Node {
    pub fn new(label: Label) -> Self {
        Node {
            label,
            properties: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Write interface of a graph database
///
/// Writes issued between `begin` and `commit` belong to that transaction;
/// writes issued with no open transaction commit on their own.
pub trait GraphStore {
    /// Delete every node and relationship
    fn clear(&mut self) -> Result<(), GraphError>;

    fn create_node(&mut self, node: &Node) -> Result<NodeId, GraphError>;

    /// Create a directed `from -[rel]-> to` relationship
    fn create_relationship(&mut self, from: NodeId, rel: RelType, to: NodeId) -> Result<(), GraphError>;

    fn begin(&mut self) -> Result<(), GraphError>;

    fn commit(&mut self) -> Result<(), GraphError>;

    fn in_transaction(&self) -> bool;
}

impl<S: GraphStore + ?Sized> GraphStore for &mut S {
    fn clear(&mut self) -> Result<(), GraphError> {
        (**self).clear()
    }

    fn create_node(&mut self, node: &Node) -> Result<NodeId, GraphError> {
        (**self).create_node(node)
    }

    fn create_relationship(&mut self, from: NodeId, rel: RelType, to: NodeId) -> Result<(), GraphError> {
        (**self).create_relationship(from, rel, to)
    }

    fn begin(&mut self) -> Result<(), GraphError> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<(), GraphError> {
        (**self).commit()
    }

    fn in_transaction(&self) -> bool {
        (**self).in_transaction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_names() {
        assert_eq!(Label::LobbyingAgency.as_str(), "Lobbying Agency");
        assert_eq!(Label::Institution.to_string(), "Institution");
    }

    #[test]
    fn test_rel_type_names() {
        assert_eq!(RelType::IsAChamberOf.as_str(), "IS_A_CHAMBER_OF");
        assert_eq!(RelType::MemberOf.as_str(), "MEMBER_OF");
        assert_eq!(RelType::WorksFor.as_str(), "WORKS_FOR");
    }

    #[test]
    fn test_node_builder() {
        let node = Node::new(Label::Lobbyist).with("full_name", "Jane Doe");
        assert_eq!(node.property("full_name"), Some("Jane Doe"));
        assert_eq!(node.property("missing"), None);
    }
}
