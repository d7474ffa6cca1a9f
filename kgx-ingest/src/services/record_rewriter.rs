//! Apply cached normalization results onto fragments in place
//!
//! Rewriting is idempotent: a fragment that has already been rewritten
//! carries `normalized = true` and is left alone, so a canonical id is
//! never looked up a second time as if it were a raw id.

use crate::models::{NormalizationRecord, PredicateRecord};
use crate::services::normalization_cache::{Lookup, NormalizationCache};
use crate::types::{EdgeRelation, NodeFragment, PIPE_SEPARATOR};
use std::collections::BTreeSet;

/// Outcome of one rewrite pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub rewritten: usize,
    /// Fragments skipped because an earlier pass already rewrote them
    pub already_normalized: usize,
    /// Raw ids with no mapping, sorted
    pub unresolved: BTreeSet<String>,
    /// Ids never submitted for normalization
    pub missing: BTreeSet<String>,
}

/// Rewrite node fragments from the node cache
///
/// Resolved fragments take the canonical id, the label (when the record
/// has one), the pipe-joined categories and the pipe-joined equivalent
/// identifiers. Unresolved fragments keep their id and name.
pub fn rewrite(fragments: &mut [NodeFragment], cache: &NormalizationCache<NormalizationRecord>) -> RewriteReport {
    let mut report = RewriteReport::default();

    for fragment in fragments.iter_mut() {
        if fragment.normalized {
            report.already_normalized += 1;
            continue;
        }

        match cache.lookup(&fragment.id) {
            Lookup::Resolved(record) => {
                apply_record(fragment, &record);
                report.rewritten += 1;
            }
            Lookup::Unresolved => {
                report.unresolved.insert(fragment.id.clone());
            }
            Lookup::Miss => {
                report.missing.insert(fragment.id.clone());
            }
        }
    }

    if !report.unresolved.is_empty() {
        tracing::debug!(count = report.unresolved.len(), "Node fragments left with raw ids");
    }

    report
}

fn apply_record(fragment: &mut NodeFragment, record: &NormalizationRecord) {
    fragment.id = record.canonical_id.clone();
    if let Some(label) = &record.label {
        fragment.name = label.clone();
    }
    fragment.category = record.categories.join(PIPE_SEPARATOR);
    fragment.equivalent_identifiers = record.equivalent_identifiers.join(PIPE_SEPARATOR);
    fragment.normalized = true;
}

/// Rewrite relation fragments from the predicate cache
///
/// A resolved relation sets `predicate` to the canonical identifier;
/// `relation` always keeps the source's own relation. Unresolved
/// relations keep whatever predicate they arrived with.
pub fn rewrite_relations(
    relations: &mut [EdgeRelation],
    cache: &NormalizationCache<PredicateRecord>,
) -> RewriteReport {
    let mut report = RewriteReport::default();

    for relation in relations.iter_mut() {
        match cache.lookup(&relation.relation) {
            Lookup::Resolved(record) => {
                if relation.predicate == record.identifier {
                    report.already_normalized += 1;
                } else {
                    relation.predicate = record.identifier.clone();
                    report.rewritten += 1;
                }
            }
            Lookup::Unresolved => {
                report.unresolved.insert(relation.relation.clone());
            }
            Lookup::Miss => {
                report.missing.insert(relation.relation.clone());
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    fn water_cache() -> NormalizationCache<NormalizationRecord> {
        let cache = NormalizationCache::new();
        cache.insert(
            "MESH:D014867",
            Some(
                NormalizationRecord::new("CHEBI:15377")
                    .with_label("Water")
                    .with_categories(["biolink:SmallMolecule", "biolink:ChemicalEntity"])
                    .with_equivalent_identifiers(["CHEBI:15377", "MESH:D014867"]),
            ),
        );
        cache.insert("FAKE:1", None);
        cache
    }

    #[test]
    fn test_resolved_fragment_rewritten() {
        let cache = water_cache();
        let mut fragments = vec![NodeFragment::new("g1", Position::Subject, "MESH:D014867", "water")];

        let report = rewrite(&mut fragments, &cache);

        let fragment = &fragments[0];
        assert_eq!(report.rewritten, 1);
        assert_eq!(fragment.id, "CHEBI:15377");
        assert_eq!(fragment.name, "Water");
        assert_eq!(fragment.category, "biolink:SmallMolecule|biolink:ChemicalEntity");
        assert_eq!(fragment.equivalent_identifiers, "CHEBI:15377|MESH:D014867");
        assert!(fragment.normalized);
    }

    #[test]
    fn test_unresolved_fragment_kept_and_flagged() {
        let cache = water_cache();
        let mut fragments = vec![
            NodeFragment::new("g1", Position::Object, "FAKE:1", "fake"),
            NodeFragment::new("g2", Position::Object, "NEVER:1", "never"),
        ];

        let report = rewrite(&mut fragments, &cache);

        assert_eq!(fragments[0].id, "FAKE:1");
        assert_eq!(fragments[0].name, "fake");
        assert!(!fragments[0].normalized);
        assert!(report.unresolved.contains("FAKE:1"));
        assert!(report.missing.contains("NEVER:1"));
    }

    #[test]
    fn test_label_absent_keeps_name() {
        let cache = NormalizationCache::new();
        cache.insert("A:1", Some(NormalizationRecord::new("A:100")));
        let mut fragments = vec![NodeFragment::new("g", Position::Subject, "A:1", "source name")];

        rewrite(&mut fragments, &cache);

        assert_eq!(fragments[0].id, "A:100");
        assert_eq!(fragments[0].name, "source name");
        assert_eq!(fragments[0].category, "");
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let cache = water_cache();
        // The canonical id is itself a key whose record would change the name again
        cache.insert("CHEBI:15377", Some(NormalizationRecord::new("OTHER:1").with_label("other")));
        let mut fragments = vec![
            NodeFragment::new("g1", Position::Subject, "MESH:D014867", "water"),
            NodeFragment::new("g1", Position::Object, "FAKE:1", "fake"),
        ];

        rewrite(&mut fragments, &cache);
        let once = fragments.clone();
        let second = rewrite(&mut fragments, &cache);

        assert_eq!(fragments, once);
        assert_eq!(second.already_normalized, 1);
        assert_eq!(second.rewritten, 0);
    }

    #[test]
    fn test_relations_take_canonical_predicate() {
        let cache = NormalizationCache::new();
        cache.insert(
            "RO:0002434",
            Some(PredicateRecord {
                identifier: "biolink:interacts_with".to_string(),
                label: None,
            }),
        );
        cache.insert("weird:rel", None);

        let mut relations = vec![
            EdgeRelation::new("g1", "", "RO:0002434"),
            EdgeRelation::new("g2", "", "weird:rel"),
        ];
        let report = rewrite_relations(&mut relations, &cache);

        assert_eq!(relations[0].predicate, "biolink:interacts_with");
        assert_eq!(relations[0].relation, "RO:0002434");
        assert_eq!(relations[1].predicate, "");
        assert_eq!(report.rewritten, 1);
        assert!(report.unresolved.contains("weird:rel"));

        let again = rewrite_relations(&mut relations, &cache);
        assert_eq!(again.rewritten, 0);
        assert_eq!(again.already_normalized, 1);
    }
}
