// 🏛️ Graph Loader - Congress roster and lobbying agencies into the graph
//
// One run walks a fixed sequence of phases:
//   Clear → SeedTaxonomy → LoadRoster → LoadLobbying → Done
// Nothing is retried. The first error aborts the run; transactions
// committed before it stay in the store.

use crate::config::MAX_WRITES_PER_TX;
use crate::error::{GraphError, LoadError};
use crate::graph::{GraphStore, Label, Node, NodeId, RelType};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// TAXONOMY
// ============================================================================

pub const CONGRESS: &str = "Congress";
pub const SENATE: &str = "Senate";
pub const HOUSE: &str = "House of Representatives";

/// Anchor nodes created at the start of every load
pub const POLITICAL_ROOTS: [(Label, &str); 6] = [
    (Label::Institution, CONGRESS),
    (Label::Chamber, SENATE),
    (Label::Chamber, HOUSE),
    (Label::Party, "Republican"),
    (Label::Party, "Democrat"),
    (Label::Party, "Independent"),
];

/// Display name of a roster chamber key
pub fn chamber_name(chamber: &str) -> &'static str {
    match chamber {
        "house" => HOUSE,
        "senate" => SENATE,
        _ => "Official",
    }
}

/// Full party name of a roster party abbreviation
pub fn party_name(abbreviation: &str) -> &'static str {
    match abbreviation {
        "R" => "Republican",
        "D" => "Democrat",
        _ => "Independent",
    }
}

/// Taxonomy node handles by name
#[derive(Debug, Clone, Default)]
pub struct RootNodes {
    nodes: IndexMap<String, NodeId>,
}

impl RootNodes {
    pub fn get(&self, name: &str) -> Result<NodeId, LoadError> {
        self.nodes
            .get(name)
            .copied()
            .ok_or_else(|| LoadError::MissingAnchor(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ============================================================================
// INPUT DOCUMENTS
// ============================================================================

fn read_document(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub first_name: String,
    pub last_name: String,
    pub party: String,
}

impl RosterEntry {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// `{chamber: [politician, ...]}`, chambers in document order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    pub chambers: IndexMap<String, Vec<RosterEntry>>,
}

impl Roster {
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        serde_json::from_str(json).map_err(|source| LoadError::Document {
            document: "roster",
            source,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        Self::from_json(&read_document(path)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyEntry {
    #[serde(default)]
    pub agency_name: Option<String>,
    pub category: String,
    /// Lobbying target; carried in the document, not written to the graph
    #[serde(default)]
    pub target: Value,
    #[serde(default)]
    pub lobbyists: Vec<String>,
}

impl AgencyEntry {
    pub fn name(&self) -> &str {
        self.agency_name.as_deref().unwrap_or("Unknown")
    }
}

/// `{agencies: [{uniqueId: agency}, ...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LobbyingDocument {
    pub agencies: Vec<IndexMap<String, AgencyEntry>>,
}

impl LobbyingDocument {
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        serde_json::from_str(json).map_err(|source| LoadError::Document {
            document: "lobbying",
            source,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        Self::from_json(&read_document(path)?)
    }

    /// Agencies in document order with their source-assigned ids
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgencyEntry)> {
        self.agencies
            .iter()
            .flat_map(|group| group.iter().map(|(id, agency)| (id.as_str(), agency)))
    }
}

// ============================================================================
// TRANSACTION BATCHING
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub writes: usize,
    pub commits: usize,
}

/// Owns the open transaction and its write counter
///
/// Writes accumulate until `flush_if_full` sees the counter at or above the
/// ceiling, which commits and opens a fresh transaction. `finish` commits
/// whatever is left.
pub struct TxBatcher<'a, S: GraphStore + ?Sized> {
    store: &'a mut S,
    max_writes: usize,
    pending: usize,
    stats: BatchStats,
}

impl<'a, S: GraphStore + ?Sized> TxBatcher<'a, S> {
    pub fn begin(store: &'a mut S, max_writes: usize) -> Result<Self, GraphError> {
        store.begin()?;
        info!(max_writes, "Transaction started");
        Ok(TxBatcher {
            store,
            max_writes: max_writes.max(1),
            pending: 0,
            stats: BatchStats::default(),
        })
    }

    pub fn record_write(&mut self, writes: usize) {
        self.pending += writes;
        self.stats.writes += writes;
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_full(&self) -> bool {
        self.pending >= self.max_writes
    }

    /// Commit and reopen when the ceiling is reached; true if it did
    pub fn flush_if_full(&mut self) -> Result<bool, GraphError> {
        if !self.is_full() {
            return Ok(false);
        }
        self.commit_pending()?;
        self.store.begin()?;
        debug!(tx = self.stats.commits, "Transaction started");
        Ok(true)
    }

    pub fn create_node(&mut self, node: &Node) -> Result<NodeId, GraphError> {
        let id = self.store.create_node(node)?;
        self.record_write(1);
        Ok(id)
    }

    pub fn create_relationship(&mut self, from: NodeId, rel: RelType, to: NodeId) -> Result<(), GraphError> {
        self.store.create_relationship(from, rel, to)?;
        self.record_write(1);
        Ok(())
    }

    fn commit_pending(&mut self) -> Result<(), GraphError> {
        self.store.commit()?;
        self.stats.commits += 1;
        info!(tx = self.stats.commits, writes = self.pending, "Transaction committed");
        self.pending = 0;
        Ok(())
    }

    /// Commit the remaining writes and close the batch
    pub fn finish(mut self) -> Result<BatchStats, GraphError> {
        self.commit_pending()?;
        Ok(self.stats)
    }
}

// ============================================================================
// LOAD STEPS
// ============================================================================

/// Delete every node and relationship; no confirmation
pub fn clear_graph<S: GraphStore + ?Sized>(store: &mut S) -> Result<(), LoadError> {
    store.clear()?;
    info!("Cleared graph");
    Ok(())
}

/// Create the taxonomy nodes and the chamber → Congress edges
pub fn seed_taxonomy<S: GraphStore + ?Sized>(
    store: &mut S,
    roots: &[(Label, &str)],
) -> Result<RootNodes, LoadError> {
    let mut root_nodes = RootNodes::default();
    for (label, name) in roots {
        let id = store.create_node(&Node::new(*label).with("name", *name))?;
        root_nodes.nodes.insert(name.to_string(), id);
    }

    let congress = root_nodes.get(CONGRESS)?;
    for chamber in [SENATE, HOUSE] {
        store.create_relationship(root_nodes.get(chamber)?, RelType::IsAChamberOf, congress)?;
    }

    info!(nodes = root_nodes.len(), "Seeded political taxonomy");
    Ok(root_nodes)
}

/// Create a Politician node per roster entry with its three memberships
///
/// Returns the number of politicians created.
pub fn load_roster<S: GraphStore + ?Sized>(
    store: &mut S,
    roots: &RootNodes,
    roster: &Roster,
) -> Result<usize, LoadError> {
    let congress = roots.get(CONGRESS)?;
    let mut created = 0;

    for (chamber, politicians) in &roster.chambers {
        let chamber_node = roots.get(chamber_name(chamber))?;

        for politician in politicians {
            let node = Node::new(Label::Politician)
                .with("full_name", politician.full_name())
                .with("PUID", uuid::Uuid::new_v4().to_string());
            let id = store.create_node(&node)?;

            let party_node = roots.get(party_name(&politician.party))?;
            for anchor in [chamber_node, congress, party_node] {
                store.create_relationship(id, RelType::MemberOf, anchor)?;
            }
            created += 1;
        }
    }

    info!(politicians = created, "Loaded congress roster");
    Ok(created)
}

/// Create agencies and their lobbyists in bounded transactions
pub fn load_lobbying<S: GraphStore + ?Sized>(
    store: &mut S,
    lobbying: &LobbyingDocument,
    max_writes_per_tx: usize,
) -> Result<LobbyingStats, LoadError> {
    let mut batch = TxBatcher::begin(store, max_writes_per_tx)?;
    let mut stats = LobbyingStats::default();

    for (luid, agency) in lobbying.iter() {
        batch.flush_if_full()?;

        let agency_node = Node::new(Label::LobbyingAgency)
            .with("name", agency.name())
            .with("LUID", luid)
            .with("category", agency.category.as_str());
        let agency_id = batch.create_node(&agency_node)?;
        stats.agencies += 1;

        for employee in &agency.lobbyists {
            let employee_id = batch.create_node(&Node::new(Label::Lobbyist).with("full_name", employee.as_str()))?;
            batch.create_relationship(employee_id, RelType::WorksFor, agency_id)?;
            stats.lobbyists += 1;
        }
    }

    stats.batch = batch.finish()?;
    info!(
        agencies = stats.agencies,
        lobbyists = stats.lobbyists,
        commits = stats.batch.commits,
        "Loaded lobbying agencies"
    );
    Ok(stats)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LobbyingStats {
    pub agencies: usize,
    pub lobbyists: usize,
    pub batch: BatchStats,
}

// ============================================================================
// LOADER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadPhase {
    Clear,
    SeedTaxonomy,
    LoadRoster,
    LoadLobbying,
    Done,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadPhase::Clear => "clear",
            LoadPhase::SeedTaxonomy => "seed_taxonomy",
            LoadPhase::LoadRoster => "load_roster",
            LoadPhase::LoadLobbying => "load_lobbying",
            LoadPhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub politicians: usize,
    pub lobbying: LobbyingStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadReport {
    pub fn summary(&self) -> String {
        format!(
            "{} politicians, {} agencies, {} lobbyists loaded in {} transaction(s)",
            self.politicians,
            self.lobbying.agencies,
            self.lobbying.lobbyists,
            self.lobbying.batch.commits
        )
    }
}

/// Drives one load run against an exclusively owned store
pub struct GraphLoader<S: GraphStore> {
    store: S,
    max_writes_per_tx: usize,
    phase: LoadPhase,
}

impl<S: GraphStore> GraphLoader<S> {
    pub fn new(store: S) -> Self {
        Self::with_max_writes(store, MAX_WRITES_PER_TX)
    }

    pub fn with_max_writes(store: S, max_writes_per_tx: usize) -> Self {
        GraphLoader {
            store,
            max_writes_per_tx,
            phase: LoadPhase::Clear,
        }
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    fn enter(&mut self, phase: LoadPhase) {
        info!(from = %self.phase, to = %phase, "Load phase");
        self.phase = phase;
    }

    pub fn run(&mut self, roster: &Roster, lobbying: &LobbyingDocument) -> Result<LoadReport, LoadError> {
        let started_at = Utc::now();
        if roster.chambers.is_empty() {
            warn!("Roster document has no chambers");
        }

        self.phase = LoadPhase::Clear;
        clear_graph(&mut self.store)?;

        self.enter(LoadPhase::SeedTaxonomy);
        let roots = seed_taxonomy(&mut self.store, &POLITICAL_ROOTS)?;

        self.enter(LoadPhase::LoadRoster);
        let politicians = load_roster(&mut self.store, &roots, roster)?;

        self.enter(LoadPhase::LoadLobbying);
        let lobbying = load_lobbying(&mut self.store, lobbying, self.max_writes_per_tx)?;

        self.enter(LoadPhase::Done);
        Ok(LoadReport {
            politicians,
            lobbying,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SqliteGraph;

    /// Counts writes per committed transaction
    #[derive(Default)]
    struct RecordingStore {
        next_id: i64,
        open: bool,
        pending: usize,
        committed: Vec<usize>,
        autocommitted: usize,
    }

    impl RecordingStore {
        fn write(&mut self) {
            if self.open {
                self.pending += 1;
            } else {
                self.autocommitted += 1;
            }
        }
    }

    impl GraphStore for RecordingStore {
        fn clear(&mut self) -> Result<(), GraphError> {
            Ok(())
        }

        fn create_node(&mut self, _node: &Node) -> Result<NodeId, GraphError> {
            self.write();
            self.next_id += 1;
            Ok(NodeId(self.next_id))
        }

        fn create_relationship(&mut self, _from: NodeId, _rel: RelType, _to: NodeId) -> Result<(), GraphError> {
            self.write();
            Ok(())
        }

        fn begin(&mut self) -> Result<(), GraphError> {
            if self.open {
                return Err(GraphError::TransactionAlreadyOpen);
            }
            self.open = true;
            Ok(())
        }

        fn commit(&mut self) -> Result<(), GraphError> {
            if !self.open {
                return Err(GraphError::NoOpenTransaction);
            }
            self.committed.push(self.pending);
            self.pending = 0;
            self.open = false;
            Ok(())
        }

        fn in_transaction(&self) -> bool {
            self.open
        }
    }

    fn agency(name: Option<&str>, lobbyists: &[&str]) -> AgencyEntry {
        AgencyEntry {
            agency_name: name.map(str::to_string),
            category: "Business".to_string(),
            target: Value::Null,
            lobbyists: lobbyists.iter().map(|l| l.to_string()).collect(),
        }
    }

    fn document(agencies: Vec<(String, AgencyEntry)>) -> LobbyingDocument {
        LobbyingDocument {
            agencies: agencies
                .into_iter()
                .map(|(id, entry)| IndexMap::from([(id, entry)]))
                .collect(),
        }
    }

    const ROSTER_JSON: &str = r#"{
        "senate": [
            {"first_name": "Ada", "last_name": "Lovelace", "party": "D"},
            {"first_name": "Alan", "last_name": "Turing", "party": "R"}
        ],
        "house": [
            {"first_name": "Grace", "last_name": "Hopper", "party": "I"}
        ]
    }"#;

    const LOBBYING_JSON: &str = r#"{
        "agencies": [
            {"A1": {"agency_name": "Acme Partners", "category": "Energy", "target": "Senate",
                    "lobbyists": ["Jane Doe", "John Roe"]}},
            {"A2": {"category": "Health", "target": "House", "lobbyists": []}}
        ]
    }"#;

    #[test]
    fn test_chamber_name() {
        assert_eq!(chamber_name("house"), "House of Representatives");
        assert_eq!(chamber_name("senate"), "Senate");
        assert_eq!(chamber_name("anything_else"), "Official");
    }

    #[test]
    fn test_party_name() {
        assert_eq!(party_name("R"), "Republican");
        assert_eq!(party_name("D"), "Democrat");
        assert_eq!(party_name("X"), "Independent");
    }

    #[test]
    fn test_seed_taxonomy_creates_chamber_edges() {
        let mut graph = SqliteGraph::open_in_memory().unwrap();

        let roots = seed_taxonomy(&mut graph, &POLITICAL_ROOTS).unwrap();

        assert_eq!(roots.len(), 6);
        assert_eq!(graph.count_nodes(None).unwrap(), 6);
        assert_eq!(graph.count_nodes(Some(Label::Party)).unwrap(), 3);
        assert!(graph.has_relationship(SENATE, RelType::IsAChamberOf, CONGRESS).unwrap());
        assert!(graph.has_relationship(HOUSE, RelType::IsAChamberOf, CONGRESS).unwrap());
        assert_eq!(graph.count_relationships(None).unwrap(), 2);
    }

    #[test]
    fn test_load_roster_memberships() {
        let mut graph = SqliteGraph::open_in_memory().unwrap();
        let roots = seed_taxonomy(&mut graph, &POLITICAL_ROOTS).unwrap();
        let roster = Roster::from_json(ROSTER_JSON).unwrap();

        let created = load_roster(&mut graph, &roots, &roster).unwrap();

        assert_eq!(created, 3);
        assert_eq!(graph.count_relationships(Some(RelType::MemberOf)).unwrap(), 9);
        assert!(graph.has_relationship("Ada Lovelace", RelType::MemberOf, SENATE).unwrap());
        assert!(graph.has_relationship("Alan Turing", RelType::MemberOf, "Republican").unwrap());
        assert!(graph.has_relationship("Grace Hopper", RelType::MemberOf, HOUSE).unwrap());
        assert!(graph.has_relationship("Grace Hopper", RelType::MemberOf, "Independent").unwrap());
        assert!(graph.has_relationship("Grace Hopper", RelType::MemberOf, CONGRESS).unwrap());

        let politicians = graph.find_nodes(Label::Politician).unwrap();
        assert_ne!(politicians[0].properties["PUID"], politicians[1].properties["PUID"]);
    }

    #[test]
    fn test_unknown_chamber_aborts_roster() {
        let mut graph = SqliteGraph::open_in_memory().unwrap();
        let roots = seed_taxonomy(&mut graph, &POLITICAL_ROOTS).unwrap();
        let roster = Roster::from_json(
            r#"{"delegates": [{"first_name": "A", "last_name": "B", "party": "D"}]}"#,
        )
        .unwrap();

        let err = load_roster(&mut graph, &roots, &roster).unwrap_err();
        assert!(matches!(err, LoadError::MissingAnchor(ref name) if name == "Official"));
    }

    #[test]
    fn test_load_lobbying_nodes_and_default_name() {
        let mut graph = SqliteGraph::open_in_memory().unwrap();
        let lobbying = LobbyingDocument::from_json(LOBBYING_JSON).unwrap();

        let stats = load_lobbying(&mut graph, &lobbying, MAX_WRITES_PER_TX).unwrap();

        assert_eq!(stats.agencies, 2);
        assert_eq!(stats.lobbyists, 2);
        assert_eq!(stats.batch, BatchStats { writes: 6, commits: 1 });
        assert!(!graph.in_transaction());

        let agencies = graph.find_nodes(Label::LobbyingAgency).unwrap();
        assert_eq!(agencies[0].properties["name"], "Acme Partners");
        assert_eq!(agencies[0].properties["LUID"], "A1");
        assert_eq!(agencies[0].properties["category"], "Energy");
        assert_eq!(agencies[1].properties["name"], "Unknown");
        assert!(graph.has_relationship("Jane Doe", RelType::WorksFor, "Acme Partners").unwrap());
        assert_eq!(graph.count_relationships(Some(RelType::WorksFor)).unwrap(), 2);
    }

    #[test]
    fn test_null_agency_name_defaults_to_unknown() {
        let json = r#"{"agencies": [
            {"A9": {"agency_name": null, "category": "Tax", "target": "House", "lobbyists": []}}
        ]}"#;
        let lobbying = LobbyingDocument::from_json(json).unwrap();

        let (luid, entry) = lobbying.iter().next().unwrap();
        assert_eq!(luid, "A9");
        assert_eq!(entry.agency_name, None);
        assert_eq!(entry.name(), "Unknown");

        let mut graph = SqliteGraph::open_in_memory().unwrap();
        load_lobbying(&mut graph, &lobbying, MAX_WRITES_PER_TX).unwrap();
        let agencies = graph.find_nodes(Label::LobbyingAgency).unwrap();
        assert_eq!(agencies[0].properties["name"], "Unknown");
    }

    #[test]
    fn test_overflow_write_lands_in_second_transaction() {
        // 15,000 agencies x (agency + lobbyist + edge) = exactly 45,000 writes
        let mut agencies: Vec<(String, AgencyEntry)> = (0..15_000)
            .map(|i| (format!("A{i}"), agency(Some("Agency"), &["Lobbyist"])))
            .collect();
        agencies.push(("overflow".to_string(), agency(None, &[])));
        let lobbying = document(agencies);

        let mut store = RecordingStore::default();
        let stats = load_lobbying(&mut store, &lobbying, MAX_WRITES_PER_TX).unwrap();

        assert_eq!(store.committed, vec![45_000, 1]);
        assert_eq!(store.autocommitted, 0);
        assert_eq!(stats.batch, BatchStats { writes: 45_001, commits: 2 });
    }

    #[test]
    fn test_exact_ceiling_commits_once() {
        let agencies: Vec<(String, AgencyEntry)> = (0..15_000)
            .map(|i| (format!("A{i}"), agency(Some("Agency"), &["Lobbyist"])))
            .collect();

        let mut store = RecordingStore::default();
        load_lobbying(&mut store, &document(agencies), MAX_WRITES_PER_TX).unwrap();

        assert_eq!(store.committed, vec![45_000]);
    }

    #[test]
    fn test_flush_checked_before_each_agency() {
        // Ceiling 4: an agency is never split across transactions
        let agencies = (0..3)
            .map(|i| (format!("A{i}"), agency(Some("Agency"), &["L1", "L2"])))
            .collect();

        let mut store = RecordingStore::default();
        load_lobbying(&mut store, &document(agencies), 4).unwrap();

        assert_eq!(store.committed, vec![5, 5, 5]);
    }

    #[test]
    fn test_batcher_flush_if_full() {
        let mut store = RecordingStore::default();
        let mut batch = TxBatcher::begin(&mut store, 2).unwrap();

        batch.record_write(1);
        assert!(!batch.flush_if_full().unwrap());
        batch.record_write(1);
        assert!(batch.flush_if_full().unwrap());
        assert_eq!(batch.pending(), 0);

        let stats = batch.finish().unwrap();
        assert_eq!(stats, BatchStats { writes: 2, commits: 2 });
        assert!(!store.open);
    }

    #[test]
    fn test_invalid_document_is_fatal() {
        let err = LobbyingDocument::from_json("{\"agencies\": [").unwrap_err();
        assert!(matches!(err, LoadError::Document { document: "lobbying", .. }));

        let err = Roster::from_json("[]").unwrap_err();
        assert!(matches!(err, LoadError::Document { document: "roster", .. }));
    }

    #[test]
    fn test_full_run() {
        let roster = Roster::from_json(ROSTER_JSON).unwrap();
        let lobbying = LobbyingDocument::from_json(LOBBYING_JSON).unwrap();
        let mut graph = SqliteGraph::open_in_memory().unwrap();

        // Stale data from an earlier run is cleared first
        graph.create_node(&Node::new(Label::Lobbyist).with("full_name", "Stale")).unwrap();

        let mut loader = GraphLoader::new(&mut graph);
        let report = loader.run(&roster, &lobbying).unwrap();
        assert_eq!(loader.phase(), LoadPhase::Done);

        assert_eq!(report.politicians, 3);
        assert_eq!(report.lobbying.agencies, 2);
        // 6 roots + 3 politicians + 2 agencies + 2 lobbyists
        assert_eq!(graph.count_nodes(None).unwrap(), 13);
        // 2 chamber edges + 9 memberships + 2 employments
        assert_eq!(graph.count_relationships(None).unwrap(), 13);
        assert_eq!(graph.count_nodes(Some(Label::Lobbyist)).unwrap(), 2);

        println!("✅ Full load PASSED: {}", report.summary());
    }
}
