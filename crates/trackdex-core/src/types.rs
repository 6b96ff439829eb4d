// crates/trackdex-core/src/types.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Supplier classification produced by the format detector.
///
/// `Alphabroder` is recognized by the detector but carries no parsing
/// profile yet, so its files are reported as skipped rather than indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierType {
    Sanmar,
    Ss,
    Customink,
    Inbound,
    Alphabroder,
    Unknown,
}

impl SupplierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierType::Sanmar => "sanmar",
            SupplierType::Ss => "ss",
            SupplierType::Customink => "customink",
            SupplierType::Inbound => "inbound",
            SupplierType::Alphabroder => "alphabroder",
            SupplierType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SupplierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value of the published index artifact. Optional fields are omitted
/// from the JSON when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub source: String,
    pub source_type: SupplierType,
    pub po: String,
    pub customer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_flag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipper_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_tokens: Option<Vec<String>>,
}

impl IndexEntry {
    pub fn new(source: &str, source_type: SupplierType, po: String, customer: String) -> Self {
        Self {
            source: source.to_string(),
            source_type,
            po,
            customer,
            department: None,
            due_date: None,
            status: None,
            pipeline_flag: None,
            shipper_name: None,
            reference_tokens: None,
        }
    }
}

/// The tracking index itself: normalized tracking → entry. A `BTreeMap`
/// keeps serialization deterministic, which is what makes rebuilds
/// byte-comparable.
pub type TrackingIndex = BTreeMap<String, IndexEntry>;

/// Enrichment record keyed by a PO digit string in the order index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderInfo {
    pub department: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
    pub pipeline_flag: Option<String>,
}

/// Which tier of the scan a manifest belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Orders,
    Combined,
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    FetchFailed,
    FetchTimedOut,
    CorruptedCsv,
    WorkbookUnreadable,
    UnsupportedExtension,
    NoTrackingColumn,
    NoParsingProfile,
}

/// Outcome of one manifest in one pass of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Indexed { rows: usize, added: usize },
    Orders { orders_loaded: usize },
    Empty,
    Skipped { reason: SkipReason, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub supplier: SupplierType,
    pub kind: ManifestKind,
    pub size: u64,
    /// blake3 of the fetched bytes, for matching a bad index entry back to
    /// the exact upload that produced it. Absent when the fetch failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn is_skip(&self) -> bool {
        matches!(self.outcome, FileOutcome::Skipped { .. })
    }
}

/// Structured summary of an index build, returned by every batch surface
/// even under partial failure.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub manifests_scanned: usize,
    pub trackings_indexed: usize,
    pub enriched: usize,
    pub order_index_size: usize,
    pub counts_by_source: BTreeMap<String, usize>,
    pub duration_ms: u64,
    pub files: Vec<FileReport>,
}

impl BuildSummary {
    pub fn skipped(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|report| report.is_skip())
    }
}

/// Per-supplier outcome of a combiner run.
#[derive(Debug, Clone, Serialize)]
pub struct SupplierCombineReport {
    pub supplier: SupplierType,
    pub daily_files: usize,
    pub rows_in: usize,
    pub rows_kept: usize,
    pub duplicates_dropped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_path: Option<String>,
    pub files: Vec<FileReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombineSummary {
    pub suppliers: Vec<SupplierCombineReport>,
    pub duration_ms: u64,
}
