// Neo4j transactional Cypher endpoint over HTTP
//
// Endpoints (relative to http://host:port/db/<database>):
//   POST /tx           open a transaction
//   POST /tx/<id>      run statements inside it
//   POST /tx/<id>/commit
//   POST /tx/commit    run statements in a one-shot transaction

use super::{GraphStore, Node, NodeId, RelType};
use crate::config::GraphConfig;
use crate::error::GraphError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Serialize)]
struct Statement {
    statement: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct StatementBatch {
    statements: Vec<Statement>,
}

#[derive(Debug, Deserialize)]
struct CypherResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<CypherFailure>,
    /// Present while a transaction is open
    commit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    data: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CypherFailure {
    code: String,
    message: String,
}

// ============================================================================
// REQUESTS / RESPONSES
// ============================================================================

fn node_statement(node: &Node) -> Statement {
    Statement {
        statement: format!("CREATE (n:`{}` $props) RETURN id(n)", node.label.as_str()),
        parameters: json!({ "props": node.properties }),
    }
}

fn relationship_statement(from: NodeId, rel: RelType, to: NodeId) -> Statement {
    Statement {
        statement: format!(
            "MATCH (a), (b) WHERE id(a) = $from AND id(b) = $to CREATE (a)-[:{}]->(b)",
            rel.as_str()
        ),
        parameters: json!({ "from": from.0, "to": to.0 }),
    }
}

/// Status check, body parse and Cypher error mapping of one reply
fn decode_response(url: &str, status: u16, body: &str) -> Result<CypherResponse, GraphError> {
    if !(200..300).contains(&status) {
        return Err(GraphError::Protocol(format!("{url} returned {status}: {body}")));
    }

    let mut response: CypherResponse = serde_json::from_str(body)?;
    if !response.errors.is_empty() {
        let failure = response.errors.swap_remove(0);
        return Err(GraphError::Cypher {
            code: failure.code,
            message: failure.message,
        });
    }
    Ok(response)
}

/// Transaction URL from the `commit` link of an open-transaction reply
fn transaction_url(response: &CypherResponse) -> Result<String, GraphError> {
    let commit_url = response
        .commit
        .as_deref()
        .ok_or_else(|| GraphError::Protocol("transaction opened without commit URL".to_string()))?;
    Ok(commit_url.trim_end_matches("/commit").to_string())
}

/// `id(n)` of the first row of a CREATE reply
fn created_node_id(response: &CypherResponse) -> Result<NodeId, GraphError> {
    response
        .results
        .first()
        .and_then(|result| result.data.first())
        .and_then(|row| row.row.first())
        .and_then(Value::as_i64)
        .map(NodeId)
        .ok_or_else(|| GraphError::Protocol("CREATE returned no node id".to_string()))
}

pub struct Neo4jHttp {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
    /// URL of the open transaction, if any
    open_tx: Option<String>,
}

impl Neo4jHttp {
    pub fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let store = Neo4jHttp {
            client: Client::builder().build()?,
            endpoint: format!("{}/db/{}", config.base_url(), config.database),
            username: config.username.clone(),
            password: config.password.clone(),
            open_tx: None,
        };

        // Fail at startup rather than on the first write
        store.post(&format!("{}/tx/commit", store.endpoint), Vec::new())?;
        debug!(endpoint = %store.endpoint, "Connected to Neo4j");
        Ok(store)
    }

    fn post(&self, url: &str, statements: Vec<Statement>) -> Result<CypherResponse, GraphError> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&StatementBatch { statements })
            .send()?;

        let status = response.status().as_u16();
        let body = response.text()?;
        decode_response(url, status, &body)
    }

    /// Run one statement in the open transaction, or on its own
    fn run(&self, statement: Statement) -> Result<CypherResponse, GraphError> {
        let url = match &self.open_tx {
            Some(tx_url) => tx_url.clone(),
            None => format!("{}/tx/commit", self.endpoint),
        };
        self.post(&url, vec![statement])
    }
}

impl GraphStore for Neo4jHttp {
    fn clear(&mut self) -> Result<(), GraphError> {
        self.run(Statement {
            statement: "MATCH (n) DETACH DELETE n".to_string(),
            parameters: json!({}),
        })?;
        Ok(())
    }

    fn create_node(&mut self, node: &Node) -> Result<NodeId, GraphError> {
        let response = self.run(node_statement(node))?;
        created_node_id(&response)
    }

    fn create_relationship(&mut self, from: NodeId, rel: RelType, to: NodeId) -> Result<(), GraphError> {
        self.run(relationship_statement(from, rel, to))?;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), GraphError> {
        if self.open_tx.is_some() {
            return Err(GraphError::TransactionAlreadyOpen);
        }
        let response = self.post(&format!("{}/tx", self.endpoint), Vec::new())?;
        let tx_url = transaction_url(&response)?;
        debug!(tx = %tx_url, "Opened transaction");
        self.open_tx = Some(tx_url);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), GraphError> {
        let tx_url = self.open_tx.take().ok_or(GraphError::NoOpenTransaction)?;
        self.post(&format!("{tx_url}/commit"), Vec::new())?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.open_tx.is_some()
    }
}
