//! Pair node fragments into edges by group key
//!
//! **Algorithm:**
//! 1. Stable-sort fragments by group key
//! 2. Scan runs of equal group key
//! 3. Run of exactly two with one subject and one object: look up the
//!    relation and emit one edge if subject, object and relation are all
//!    non-empty
//! 4. Longer run: grouping anomaly, logged, no edge
//! 5. Shorter run: dangling fragment, skipped without logging
//!
//! None of these outcomes are errors. The one exception is a pair whose
//! group key has no relation at all while `strict_relations` is set.

use crate::error::{IngestError, IngestResult};
use crate::types::{EdgeRelation, GraphEdge, NodeFragment, Position, SOURCE_DATABASE_PROPERTY};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Value written to each edge's `source_database` column
    pub source_database: Option<String>,
    /// Fail on a pair whose group key has no relation entry
    pub strict_relations: bool,
}

/// Counters for one assembly pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Distinct group keys seen
    pub groups: usize,
    pub edges: usize,
    /// Groups with a single fragment
    pub dangling: usize,
    /// Groups with more than two fragments
    pub anomalies: usize,
    /// Pairs without a subject/object split or with an empty field
    pub malformed: usize,
    /// Pairs whose group key had no relation entry
    pub missing_relation: usize,
}

pub struct GroupAssembler {
    config: AssemblerConfig,
}

impl GroupAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    /// Consume the fragments of one block and produce its edges
    ///
    /// Edge order follows the sorted group keys. When the relation table
    /// holds more than one entry for a key, the first one is used.
    pub fn assemble(
        &self,
        mut fragments: Vec<NodeFragment>,
        relations: &[EdgeRelation],
    ) -> IngestResult<(Vec<GraphEdge>, AssemblyReport)> {
        let mut relation_table: HashMap<&str, &EdgeRelation> = HashMap::with_capacity(relations.len());
        for relation in relations {
            relation_table.entry(relation.group_key.as_str()).or_insert(relation);
        }

        // sort_by is stable
        fragments.sort_by(|a, b| a.group_key.cmp(&b.group_key));

        let mut report = AssemblyReport::default();
        let mut edges = Vec::new();

        for run in fragments.chunk_by(|a, b| a.group_key == b.group_key) {
            report.groups += 1;
            let group_key = run[0].group_key.as_str();

            match run.len() {
                1 => report.dangling += 1,
                2 => match relation_table.get(group_key) {
                    None if self.config.strict_relations => {
                        return Err(IngestError::MissingRelation {
                            group_key: group_key.to_string(),
                        });
                    }
                    None => {
                        tracing::debug!(group_key, "No relation for group, skipping");
                        report.missing_relation += 1;
                    }
                    Some(relation) => match self.pair_edge(&run[0], &run[1], relation) {
                        Some(edge) => {
                            edges.push(edge);
                            report.edges += 1;
                        }
                        None => {
                            tracing::debug!(
                                group_key,
                                first = %run[0].id,
                                second = %run[1].id,
                                relation = %relation.relation,
                                "Node or relation missing for group, skipping"
                            );
                            report.malformed += 1;
                        }
                    },
                },
                size => {
                    tracing::warn!(group_key, size, "More than two nodes in group, no edge created");
                    report.anomalies += 1;
                }
            }
        }

        tracing::debug!(
            groups = report.groups,
            edges = report.edges,
            anomalies = report.anomalies,
            "Assembled edges"
        );

        Ok((edges, report))
    }

    fn pair_edge(&self, a: &NodeFragment, b: &NodeFragment, relation: &EdgeRelation) -> Option<GraphEdge> {
        let (subject, object) = match (a.position, b.position) {
            (Position::Subject, Position::Object) => (a, b),
            (Position::Object, Position::Subject) => (b, a),
            _ => return None,
        };

        if subject.id.is_empty() || object.id.is_empty() || relation.relation.is_empty() {
            return None;
        }

        let mut properties = BTreeMap::new();
        if let Some(source) = &self.config.source_database {
            properties.insert(SOURCE_DATABASE_PROPERTY.to_string(), source.clone());
        }

        Some(GraphEdge {
            subject: subject.id.clone(),
            predicate: relation.predicate.clone(),
            relation: relation.relation.clone(),
            object: object.id.clone(),
            properties,
        })
    }
}
