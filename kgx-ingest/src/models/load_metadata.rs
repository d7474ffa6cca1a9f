//! Per-file load report
//!
//! Written next to the KGX output as `<stem>_load_metadata.json` once a
//! source file has been processed.

use crate::services::batch_normalizer::NormalizationReport;
use crate::services::group_assembler::AssemblyReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use uuid::Uuid;

/// Normalization counters accumulated over every block of a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub requested: usize,
    pub looked_up: usize,
    pub cache_hits: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub failed_chunks: usize,
}

impl NormalizationStats {
    pub fn absorb(&mut self, report: &NormalizationReport) {
        self.requested += report.requested;
        self.looked_up += report.looked_up;
        self.cache_hits += report.cache_hits;
        self.resolved += report.resolved;
        self.unresolved += report.unresolved.len();
        self.failed_chunks += report.failed_chunks;
    }
}

/// Assembly counters accumulated over every block of a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStats {
    pub groups: usize,
    pub edges: usize,
    pub dangling: usize,
    pub anomalies: usize,
    pub malformed: usize,
    pub missing_relation: usize,
}

impl AssemblyStats {
    pub fn absorb(&mut self, report: &AssemblyReport) {
        self.groups += report.groups;
        self.edges += report.edges;
        self.dangling += report.dangling;
        self.anomalies += report.anomalies;
        self.malformed += report.malformed;
        self.missing_relation += report.missing_relation;
    }
}

/// Outcome of loading one source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadMetadata {
    pub run_id: Uuid,
    pub source_file: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub num_source_lines: u64,
    pub unusable_source_lines: u64,
    /// Distinct node lines written
    pub node_count: usize,
    /// Distinct edge lines written
    pub edge_count: usize,
    pub node_normalization: NormalizationStats,
    pub edge_normalization: NormalizationStats,
    pub assembly: AssemblyStats,
    /// Node ids the service could not resolve, sorted
    pub node_norm_failures: BTreeSet<String>,
    /// Relations the service could not resolve, sorted
    pub edge_norm_failures: BTreeSet<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl LoadMetadata {
    pub fn start(source_file: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source_file: source_file.into(),
            started_at: Utc::now(),
            finished_at: None,
            num_source_lines: 0,
            unusable_source_lines: 0,
            node_count: 0,
            edge_count: 0,
            node_normalization: NormalizationStats::default(),
            edge_normalization: NormalizationStats::default(),
            assembly: AssemblyStats::default(),
            node_norm_failures: BTreeSet::new(),
            edge_norm_failures: BTreeSet::new(),
            cancelled: false,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Write as pretty JSON through a temp file and rename
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, path)
    }

    pub fn read_json(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_serialize_sorted() {
        let mut metadata = LoadMetadata::start("go-plus.tsv");
        metadata.node_norm_failures.insert("ZZ:9".to_string());
        metadata.node_norm_failures.insert("AA:1".to_string());

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["node_norm_failures"], serde_json::json!(["AA:1", "ZZ:9"]));
        assert!(value["finished_at"].is_null());
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_load_metadata.json");

        let mut metadata = LoadMetadata::start("x.tsv");
        metadata.num_source_lines = 12;
        metadata.finish();
        metadata.write_json(&path).unwrap();

        assert_eq!(LoadMetadata::read_json(&path).unwrap(), metadata);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_stats_accumulate() {
        let mut stats = AssemblyStats::default();
        let report = AssemblyReport {
            groups: 3,
            edges: 1,
            dangling: 1,
            anomalies: 1,
            ..AssemblyReport::default()
        };
        stats.absorb(&report);
        stats.absorb(&report);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.anomalies, 2);
        assert_eq!(stats.groups, 6);
    }
}
