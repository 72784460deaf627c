// ⚖️ Identifier Reconciliation - Lobbyist CUIDs and employer links
//
// Every lobbyist natural key (LID) gets ONE cross-dataset unique identifier
// (CUID) per run. Reports sharing a LID collapse into a single
// semicolon-joined row; each raw row is then bundled with its lobbyist CUID
// and the employer CUID resolved from the firms index.

use crate::error::ReconcileError;
use crate::extract::{self, ExtractRow, LID_COL, SOPR_COL};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Separator used for multi-valued CSV cells
pub const MULTI_VALUE_SEPARATOR: &str = ";";

pub const STORE_FILE: &str = "lobbyists_store.csv";
pub const DATA_FILE: &str = "lobbyists_data.csv";

fn new_cuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// EMPLOYER ID
// ============================================================================

/// Employer reference of a lobbyist row
///
/// Unknown employers are written as the sentinel `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmployerId {
    Known(String),
    Unknown,
}

impl EmployerId {
    pub const SENTINEL: &'static str = "0";

    pub fn as_str(&self) -> &str {
        match self {
            EmployerId::Known(cuid) => cuid,
            EmployerId::Unknown => Self::SENTINEL,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, EmployerId::Known(_))
    }
}

impl fmt::Display for EmployerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EmployerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// FIRM INDEX
// ============================================================================

/// Read-only mapping SOPR id → firm CUID
#[derive(Debug, Clone, Default)]
pub struct FirmIndex {
    firms: IndexMap<String, String>,
}

impl FirmIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the firms table produced by the firm-processing stage
    ///
    /// Column 0 holds the natural key, column 1 the firm CUID. A key cell
    /// may hold several SOPR ids joined with `;`; each maps to the CUID.
    pub fn from_csv(path: &Path) -> Result<Self, ReconcileError> {
        let csv_err = |source: csv::Error| ReconcileError::Csv {
            path: path.display().to_string(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(csv_err)?;

        let mut index = FirmIndex::new();
        for (row_num, result) in reader.records().enumerate() {
            let record = result.map_err(csv_err)?;
            // +2: 1-indexed + header row
            let line = record.position().map(|p| p.line()).unwrap_or(row_num as u64 + 2);

            let keys = record.get(0).ok_or_else(|| ReconcileError::FirmIndexRow {
                path: path.display().to_string(),
                line,
                column: "natural key",
            })?;
            let cuid = record.get(1).ok_or_else(|| ReconcileError::FirmIndexRow {
                path: path.display().to_string(),
                line,
                column: "unique id",
            })?;

            for sopr in keys.split(MULTI_VALUE_SEPARATOR).filter(|k| !k.is_empty()) {
                index.insert(sopr, cuid);
            }
        }

        info!(path = %path.display(), firms = index.len(), "Loaded firm index");
        Ok(index)
    }

    pub fn insert(&mut self, sopr: impl Into<String>, cuid: impl Into<String>) {
        self.firms.insert(sopr.into(), cuid.into());
    }

    pub fn get(&self, sopr: &str) -> Option<&str> {
        self.firms.get(sopr).map(String::as_str)
    }

    /// Resolve a firm, falling back to the unknown-employer sentinel
    pub fn employer_for(&self, sopr: &str) -> EmployerId {
        match self.get(sopr) {
            Some(cuid) => EmployerId::Known(cuid.to_string()),
            None => EmployerId::Unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.firms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firms.is_empty()
    }
}

// ============================================================================
// LOBBYIST STORE
// ============================================================================

/// Mapping LID → lobbyist CUID for one run
#[derive(Debug, Clone, Default)]
pub struct LobbyistStore {
    cuids: IndexMap<String, String>,
}

impl LobbyistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, lobbyist_id: &str) -> Option<&str> {
        self.cuids.get(lobbyist_id).map(String::as_str)
    }

    /// Existing CUID for the LID, or a fresh one that is remembered
    pub fn get_or_assign(&mut self, lobbyist_id: &str) -> &str {
        self.cuids
            .entry(lobbyist_id.to_string())
            .or_insert_with(new_cuid)
    }

    pub fn len(&self) -> usize {
        self.cuids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuids.is_empty()
    }
}

// ============================================================================
// OUTPUT ROWS
// ============================================================================

/// Row of the lobbyist store CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRow {
    #[serde(rename = "CUID_lobbyist")]
    pub cuid: String,

    #[serde(rename = "lobbyist_id")]
    pub lobbyist_id: String,

    /// Report ids joined with `;`
    #[serde(rename = "SOPR_reports")]
    pub sopr_reports: String,
}

/// One raw extract row bundled with its identifiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LobbyistRecord {
    #[serde(rename = "CUID_lobbyist")]
    pub cuid: String,

    #[serde(rename = "CUID_employer")]
    pub employer: EmployerId,

    #[serde(rename = "lobbyist_id")]
    pub lobbyist_id: String,

    #[serde(rename = "lobbyist_name")]
    pub full_name: String,

    #[serde(rename = "former_congressmen")]
    pub former_congressman: String,

    #[serde(rename = "record_year")]
    pub report_year: String,
}

/// Result of [`reconcile`]: store rows plus the LID → CUID mapping
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub rows: Vec<StoreRow>,
    pub store: LobbyistStore,
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Mint a CUID for every LID and collapse its reports into one row
///
/// Always mints: no previous run's store is consulted, so CUIDs are NOT
/// stable across runs. [`bundle`] instead looks CUIDs up.
pub fn reconcile(index: &IndexMap<String, Vec<String>>) -> Reconciliation {
    let mut reconciliation = Reconciliation::default();

    for (lobbyist_id, reports) in index {
        let cuid = new_cuid();
        reconciliation
            .store
            .cuids
            .insert(lobbyist_id.clone(), cuid.clone());
        reconciliation.rows.push(StoreRow {
            cuid,
            lobbyist_id: lobbyist_id.clone(),
            sopr_reports: reports.join(MULTI_VALUE_SEPARATOR),
        });
    }

    reconciliation
}

/// Attach the lobbyist CUID and employer CUID to one extract row
///
/// A LID missing from the store is assigned a CUID that later rows of the
/// run reuse.
pub fn bundle(row: &ExtractRow, store: &mut LobbyistStore, firms: &FirmIndex) -> LobbyistRecord {
    let cuid = store.get_or_assign(&row.lobbyist_id).to_string();
    let employer = firms.employer_for(&row.sopr);
    if !employer.is_known() {
        debug!(sopr = %row.sopr, line = row.line, "Unknown employer, using sentinel");
    }

    LobbyistRecord {
        cuid,
        employer,
        lobbyist_id: row.lobbyist_id.clone(),
        full_name: row.full_name.clone(),
        former_congressman: row.former_congressman.clone(),
        report_year: row.report_year.clone(),
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T], header: &[&str]) -> Result<(), ReconcileError> {
    let csv_err = |source: csv::Error| ReconcileError::Csv {
        path: path.display().to_string(),
        source,
    };

    // Header written explicitly so an empty output still carries it
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_store_csv(path: &Path, rows: &[StoreRow]) -> Result<(), ReconcileError> {
    write_rows(path, rows, &["CUID_lobbyist", "lobbyist_id", "SOPR_reports"])
}

pub fn write_data_csv(path: &Path, records: &[LobbyistRecord]) -> Result<(), ReconcileError> {
    write_rows(
        path,
        records,
        &[
            "CUID_lobbyist",
            "CUID_employer",
            "lobbyist_id",
            "lobbyist_name",
            "former_congressmen",
            "record_year",
        ],
    )
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Input and output locations of a reconciliation run
#[derive(Debug, Clone)]
pub struct ReconcilePaths {
    pub extract: PathBuf,
    pub firms: PathBuf,
    pub out_dir: PathBuf,
}

impl ReconcilePaths {
    pub fn store_path(&self) -> PathBuf {
        self.out_dir.join(STORE_FILE)
    }

    pub fn data_path(&self) -> PathBuf {
        self.out_dir.join(DATA_FILE)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub lobbyists: usize,
    pub rows: usize,
    pub unknown_employers: usize,
    pub finished_at: DateTime<Utc>,
}

impl ReconcileReport {
    pub fn summary(&self) -> String {
        format!(
            "{} lobbyists reconciled from {} rows ({} with unknown employer)",
            self.lobbyists, self.rows, self.unknown_employers
        )
    }
}

/// Index the extract, write the lobbyist store, then bundle every row
pub fn run_reconciliation(paths: &ReconcilePaths) -> Result<ReconcileReport, ReconcileError> {
    std::fs::create_dir_all(&paths.out_dir)?;

    let index = extract::index_by(&paths.extract, LID_COL, SOPR_COL)?;
    if index.is_empty() {
        warn!(path = %paths.extract.display(), "Extract contains no rows");
    }

    let Reconciliation { rows, mut store } = reconcile(&index);
    write_store_csv(&paths.store_path(), &rows)?;
    info!(lobbyists = rows.len(), path = %paths.store_path().display(), "Wrote lobbyist store");

    let firms = FirmIndex::from_csv(&paths.firms)?;
    let extract_rows = extract::read_extract(&paths.extract)?;
    let records: Vec<LobbyistRecord> = extract_rows
        .iter()
        .map(|row| bundle(row, &mut store, &firms))
        .collect();
    write_data_csv(&paths.data_path(), &records)?;

    let unknown_employers = records.iter().filter(|r| !r.employer.is_known()).count();
    info!(
        rows = records.len(),
        unknown_employers,
        path = %paths.data_path().display(),
        "Wrote lobbyist data"
    );

    Ok(ReconcileReport {
        lobbyists: rows.len(),
        rows: records.len(),
        unknown_employers,
        finished_at: Utc::now(),
    })
}
