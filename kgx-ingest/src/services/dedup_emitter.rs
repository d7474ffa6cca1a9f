//! Content-addressed deduplication of output records
//!
//! Edges are keyed by the SHA-256 of their serialized body; the hash also
//! becomes the edge's `id` column. Nodes are keyed by their full serialized
//! line. Both sets are ordered, so the final output is the same whatever
//! order blocks were emitted in.

use crate::types::{GraphEdge, KgxNode};
use kgx_common::config::OutputMode;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Lowercase hex SHA-256 of `body`
pub fn content_hash(body: &str) -> String {
    format!("{:x}", Sha256::digest(body.as_bytes()))
}

/// Append-only sets of serialized nodes and edges for one output file pair
#[derive(Debug, Clone)]
pub struct DedupEmitter {
    mode: OutputMode,
    nodes: BTreeSet<String>,
    /// content hash → full edge line
    edges: BTreeMap<String, String>,
}

impl DedupEmitter {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            nodes: BTreeSet::new(),
            edges: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Returns true if the edge was not seen before
    pub fn emit_edge(&mut self, edge: &GraphEdge) -> bool {
        let (hash, line) = match self.mode {
            OutputMode::Tsv => {
                let body = edge.tsv_body();
                let hash = content_hash(&body);
                let line = format!("{}\t{}", hash, body);
                (hash, line)
            }
            OutputMode::Json => {
                let body = edge.json_body();
                let hash = content_hash(&body);
                let line = format!("{{\"id\":\"{}\", {}}}", hash, body);
                (hash, line)
            }
        };

        match self.edges.entry(hash) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(line);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Returns true if the node line was not seen before
    pub fn emit_node(&mut self, node: &KgxNode) -> bool {
        let line = match self.mode {
            OutputMode::Tsv => node.to_tsv_line(),
            OutputMode::Json => node.to_json_line(),
        };
        self.nodes.insert(line)
    }

    /// Union another emitter's records into this one
    pub fn merge(&mut self, other: DedupEmitter) {
        self.nodes.extend(other.nodes);
        for (hash, line) in other.edges {
            self.edges.entry(hash).or_insert(line);
        }
    }

    pub fn node_lines(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn edge_lines(&self) -> impl Iterator<Item = &str> {
        self.edges.values().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
