//! Core record types for KGX assembly
//!
//! Upstream parsers produce [`NodeFragment`]s and [`EdgeRelation`]s tagged
//! with a group key. After normalization the assembler turns each pair of
//! node fragments into a [`GraphEdge`], and the node fragments (minus their
//! grouping metadata) become [`KgxNode`]s.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Separator for multi-valued KGX fields
pub const PIPE_SEPARATOR: &str = "|";

/// Edge property carrying the originating dataset name
pub const SOURCE_DATABASE_PROPERTY: &str = "source_database";

// ============================================================================
// Fragments
// ============================================================================

/// Role of a node fragment within its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Position {
    /// Edge subject (position 1)
    Subject,
    /// Edge object (position 2)
    Object,
}

#[derive(Debug, Error)]
#[error("Unknown node position: {0}")]
pub struct InvalidPosition(pub u8);

impl TryFrom<u8> for Position {
    type Error = InvalidPosition;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Position::Subject),
            2 => Ok(Position::Object),
            other => Err(InvalidPosition(other)),
        }
    }
}

impl From<Position> for u8 {
    fn from(position: Position) -> u8 {
        match position {
            Position::Subject => 1,
            Position::Object => 2,
        }
    }
}

/// One side of a relation, as produced by an upstream parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFragment {
    /// Key joining this fragment with its partner and its relation
    pub group_key: String,
    /// Subject or object
    pub position: Position,
    /// Identifier (raw before rewriting, canonical after)
    pub id: String,
    /// Display name
    pub name: String,
    /// Pipe-joined categories
    pub category: String,
    /// Pipe-joined equivalent identifiers
    pub equivalent_identifiers: String,
    /// Set once the rewriter has applied a normalization result
    #[serde(default)]
    pub normalized: bool,
}

impl NodeFragment {
    pub fn new(
        group_key: impl Into<String>,
        position: Position,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group_key: group_key.into(),
            position,
            id: id.into(),
            name: name.into(),
            category: String::new(),
            equivalent_identifiers: String::new(),
            normalized: false,
        }
    }
}

/// Relation declared for a group key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRelation {
    pub group_key: String,
    /// Predicate (canonical after predicate normalization)
    pub predicate: String,
    /// Relation as stated by the source
    pub relation: String,
}

impl EdgeRelation {
    pub fn new(
        group_key: impl Into<String>,
        predicate: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            group_key: group_key.into(),
            predicate: predicate.into(),
            relation: relation.into(),
        }
    }
}

// ============================================================================
// Output records
// ============================================================================

/// Assembled edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub subject: String,
    pub predicate: String,
    pub relation: String,
    pub object: String,
    /// Extra columns; `source_database` is always written
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl GraphEdge {
    /// KGX `edge_label`: the predicate, falling back to the raw relation
    pub fn edge_label(&self) -> &str {
        if self.predicate.is_empty() {
            &self.relation
        } else {
            &self.predicate
        }
    }

    pub fn source_database(&self) -> &str {
        self.properties
            .get(SOURCE_DATABASE_PROPERTY)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Tab-separated body hashed for deduplication (no `id` column)
    pub fn tsv_body(&self) -> String {
        [
            tsv_field(&self.subject),
            tsv_field(&self.relation),
            tsv_field(self.edge_label()),
            tsv_field(&self.object),
            tsv_field(self.source_database()),
        ]
        .join("\t")
    }

    /// JSON member list hashed for deduplication (no `id` member)
    pub fn json_body(&self) -> String {
        format!(
            "\"subject\":{}, \"relation\":{}, \"object\":{}, \"edge_label\":{}, \"source_database\":{}",
            json_string(&self.subject),
            json_string(&self.relation),
            json_string(&self.object),
            json_string(self.edge_label()),
            json_string(self.source_database()),
        )
    }
}

impl fmt::Display for GraphEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[{}]->({})", self.subject, self.edge_label(), self.object)
    }
}

/// Node as written to a KGX node file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KgxNode {
    pub id: String,
    pub name: String,
    pub category: Vec<String>,
    pub equivalent_identifiers: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Expected 4 tab-separated columns, found {0}")]
pub struct MalformedNodeRow(pub usize);

impl KgxNode {
    pub fn to_tsv_line(&self) -> String {
        [
            tsv_field(&self.id),
            tsv_field(&self.name),
            tsv_field(&self.category.join(PIPE_SEPARATOR)),
            tsv_field(&self.equivalent_identifiers.join(PIPE_SEPARATOR)),
        ]
        .join("\t")
    }

    pub fn to_json_line(&self) -> String {
        format!(
            "{{\"id\":{}, \"name\":{}, \"category\":{}, \"equivalent_identifiers\":{}}}",
            json_string(&self.id),
            json_string(&self.name),
            json_list(&self.category),
            json_list(&self.equivalent_identifiers),
        )
    }

    /// Parse one data row of a tabular node file
    pub fn from_tsv_line(line: &str) -> Result<Self, MalformedNodeRow> {
        let columns: Vec<&str> = line.trim_end_matches(&['\r', '\n'][..]).split('\t').collect();
        if columns.len() != 4 {
            return Err(MalformedNodeRow(columns.len()));
        }

        Ok(Self {
            id: columns[0].to_string(),
            name: columns[1].to_string(),
            category: split_pipes(columns[2]),
            equivalent_identifiers: split_pipes(columns[3]),
        })
    }
}

impl From<&NodeFragment> for KgxNode {
    fn from(fragment: &NodeFragment) -> Self {
        Self {
            id: fragment.id.clone(),
            name: fragment.name.clone(),
            category: split_pipes(&fragment.category),
            equivalent_identifiers: split_pipes(&fragment.equivalent_identifiers),
        }
    }
}

/// Split a pipe-joined field; the empty string has no values
pub fn split_pipes(field: &str) -> Vec<String> {
    if field.is_empty() {
        Vec::new()
    } else {
        field.split(PIPE_SEPARATOR).map(str::to_string).collect()
    }
}

fn tsv_field(value: &str) -> String {
    value.replace(&['\t', '\n', '\r'][..], " ")
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn json_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| json_string(v)).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_u8() {
        assert_eq!(Position::try_from(1).unwrap(), Position::Subject);
        assert_eq!(Position::try_from(2).unwrap(), Position::Object);
        assert!(Position::try_from(3).is_err());
    }

    #[test]
    fn test_node_json_line_format() {
        let node = KgxNode {
            id: "NCBITaxon:9606".to_string(),
            name: "Homo \"sapiens\"".to_string(),
            category: vec!["biolink:OrganismTaxon".to_string(), "biolink:NamedThing".to_string()],
            equivalent_identifiers: vec!["NCBITaxon:9606".to_string()],
        };

        assert_eq!(
            node.to_json_line(),
            r#"{"id":"NCBITaxon:9606", "name":"Homo \"sapiens\"", "category":["biolink:OrganismTaxon", "biolink:NamedThing"], "equivalent_identifiers":["NCBITaxon:9606"]}"#
        );

        let parsed: serde_json::Value = serde_json::from_str(&node.to_json_line()).unwrap();
        assert_eq!(parsed["category"][1], "biolink:NamedThing");
    }

    #[test]
    fn test_node_tsv_round_trip() {
        let node = KgxNode {
            id: "CHEBI:15377".to_string(),
            name: "water".to_string(),
            category: vec!["biolink:SmallMolecule".to_string(), "biolink:ChemicalEntity".to_string()],
            equivalent_identifiers: vec!["CHEBI:15377".to_string(), "PUBCHEM.COMPOUND:962".to_string()],
        };

        let line = node.to_tsv_line();
        assert_eq!(
            line,
            "CHEBI:15377\twater\tbiolink:SmallMolecule|biolink:ChemicalEntity\tCHEBI:15377|PUBCHEM.COMPOUND:962"
        );
        assert_eq!(KgxNode::from_tsv_line(&line).unwrap(), node);
    }

    #[test]
    fn test_node_tsv_empty_multivalued_fields() {
        let node = KgxNode::from_tsv_line("X:1\tX:1\t\t").unwrap();
        assert!(node.category.is_empty());
        assert!(node.equivalent_identifiers.is_empty());
        assert_eq!(KgxNode::from_tsv_line("only\ttwo"), Err(MalformedNodeRow(2)));
    }

    #[test]
    fn test_edge_label_falls_back_to_relation() {
        let mut edge = GraphEdge {
            subject: "A:1".to_string(),
            predicate: String::new(),
            relation: "RO:0002434".to_string(),
            object: "B:2".to_string(),
            properties: BTreeMap::new(),
        };
        assert_eq!(edge.edge_label(), "RO:0002434");

        edge.predicate = "biolink:interacts_with".to_string();
        assert_eq!(edge.edge_label(), "biolink:interacts_with");
        assert_eq!(edge.to_string(), "(A:1)-[biolink:interacts_with]->(B:2)");
    }
}
