//! Tab-separated triple files
//!
//! One `subject\tpredicate\tobject` triple per line. Terms may be full IRIs
//! (optionally in angle brackets) or already-compacted names; each is
//! reduced to a CURIE before fragments are built.

use crate::types::{EdgeRelation, NodeFragment, Position};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// One source triple, terms already converted to CURIEs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    /// Parse one line; `None` if it does not hold three non-empty terms
    pub fn parse(line: &str) -> Option<Self> {
        let mut terms = line.trim_end_matches(&['\r', '\n'][..]).split('\t');
        let subject = to_curie(terms.next()?);
        let predicate = to_curie(terms.next()?);
        let object = to_curie(terms.next()?);

        if terms.next().is_some() || subject.is_empty() || predicate.is_empty() || object.is_empty() {
            return None;
        }

        Some(Self {
            subject,
            predicate,
            object,
        })
    }

    /// Key joining the two node fragments and the relation of this triple
    pub fn group_key(&self) -> String {
        format!("{}/{}/{}", self.subject, self.predicate, self.object)
    }
}

/// Reduce an IRI to a CURIE
///
/// The local name after the last `/` or `#` is kept. Names that are not
/// entirely lowercase are prefixed names written with an underscore
/// (`GO_0008150`), so their underscores become colons. All-lowercase names
/// such as `part_of` are plain words and are left as they are.
pub fn to_curie(term: &str) -> String {
    let term = term.trim().trim_start_matches('<').trim_end_matches('>');
    let local = match term.rfind(&['/', '#'][..]) {
        Some(pos) if pos + 1 < term.len() => &term[pos + 1..],
        _ => term,
    };

    if is_lowercase_word(local) {
        local.to_string()
    } else {
        local.replace('_', ":")
    }
}

/// At least one cased character and no uppercase ones
fn is_lowercase_word(s: &str) -> bool {
    let mut cased = false;
    for c in s.chars() {
        if c.is_uppercase() {
            return false;
        }
        if c.is_lowercase() {
            cased = true;
        }
    }
    cased
}

/// Build the node and relation fragments for a block of triples
///
/// Each triple yields a subject fragment, an object fragment (both named
/// by their id until normalization supplies a label) and one relation
/// whose predicate starts out as the raw relation. A block is a set of
/// triples: a repeated triple contributes nothing further.
pub fn fragments_from_triples(triples: &[Triple]) -> (Vec<NodeFragment>, Vec<EdgeRelation>) {
    let mut fragments = Vec::with_capacity(triples.len() * 2);
    let mut relations = Vec::with_capacity(triples.len());
    let mut seen = HashSet::with_capacity(triples.len());

    for triple in triples {
        let group_key = triple.group_key();
        if !seen.insert(group_key.clone()) {
            continue;
        }
        fragments.push(NodeFragment::new(
            group_key.clone(),
            Position::Subject,
            triple.subject.clone(),
            triple.subject.clone(),
        ));
        fragments.push(NodeFragment::new(
            group_key.clone(),
            Position::Object,
            triple.object.clone(),
            triple.object.clone(),
        ));
        relations.push(EdgeRelation::new(group_key, triple.predicate.clone(), triple.predicate.clone()));
    }

    (fragments, relations)
}

/// Reads triples in fixed-size blocks
pub struct TripleReader<R> {
    reader: R,
    buf: Vec<u8>,
    block_size: usize,
    lines_read: u64,
    unusable_lines: u64,
}

impl TripleReader<BufReader<File>> {
    pub fn open(path: &Path, block_size: usize) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?), block_size))
    }
}

impl<R: BufRead> TripleReader<R> {
    pub fn new(reader: R, block_size: usize) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            block_size: block_size.max(1),
            lines_read: 0,
            unusable_lines: 0,
        }
    }

    /// Next block of up to `block_size` triples; `None` at end of input
    ///
    /// Blank lines are ignored. Lines that do not parse, including lines
    /// that are not valid UTF-8, are counted as unusable and skipped.
    pub fn next_block(&mut self) -> io::Result<Option<Vec<Triple>>> {
        let mut block = Vec::with_capacity(self.block_size.min(8192));

        while block.len() < self.block_size {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
                break;
            }
            self.lines_read += 1;

            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line,
                Err(err) => {
                    tracing::trace!(line = self.lines_read, error = %err, "Triple line is not UTF-8");
                    self.unusable_lines += 1;
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match Triple::parse(line) {
                Some(triple) => block.push(triple),
                None => {
                    tracing::trace!(line = self.lines_read, "Unusable triple line");
                    self.unusable_lines += 1;
                }
            }
        }

        Ok((!block.is_empty()).then_some(block))
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    pub fn unusable_lines(&self) -> u64 {
        self.unusable_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_to_curie() {
        assert_eq!(to_curie("http://purl.obolibrary.org/obo/GO_0008150"), "GO:0008150");
        assert_eq!(to_curie("<http://purl.obolibrary.org/obo/BFO_0000050>"), "BFO:0000050");
        assert_eq!(to_curie("http://www.w3.org/2000/01/rdf-schema#subClassOf"), "subClassOf");
        assert_eq!(to_curie("http://purl.obolibrary.org/obo/go#part_of"), "part_of");
        assert_eq!(to_curie("NCBITaxon_9606"), "NCBITaxon:9606");
        assert_eq!(to_curie("0000_1"), "0000:1");
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(Triple::parse("a\tb").is_none());
        assert!(Triple::parse("a\tb\tc\td").is_none());
        assert!(Triple::parse("a\t\tc").is_none());
        assert_eq!(
            Triple::parse("GO_1\tsubClassOf\tGO_2\r\n").unwrap().group_key(),
            "GO:1/subClassOf/GO:2"
        );
    }

    #[test]
    fn test_reader_blocks_and_counts() {
        let input = "GO_1\tsubClassOf\tGO_2\nbroken line\n\nGO_2\tsubClassOf\tGO_3\nGO_3\tpart_of\tGO_4\n";
        let mut reader = TripleReader::new(Cursor::new(input), 2);

        let first = reader.next_block().unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].subject, "GO:2");

        let second = reader.next_block().unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].predicate, "part_of");

        assert!(reader.next_block().unwrap().is_none());
        assert_eq!(reader.lines_read(), 5);
        assert_eq!(reader.unusable_lines(), 1);
    }

    #[test]
    fn test_invalid_utf8_line_counted_as_unusable() {
        let input: &[u8] = b"GO_1\tsubClassOf\tGO_2\nGO_\xff\tsubClassOf\tGO_3\nGO_3\tpart_of\tGO_4";
        let mut reader = TripleReader::new(Cursor::new(input), 10);

        let block = reader.next_block().unwrap().unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block[1].object, "GO:4");
        assert!(reader.next_block().unwrap().is_none());
        assert_eq!(reader.lines_read(), 3);
        assert_eq!(reader.unusable_lines(), 1);
    }

    #[test]
    fn test_fragments_from_triples() {
        let triple = Triple::parse("GO_1\tBFO_0000050\tGO_2").unwrap();
        let (fragments, relations) = fragments_from_triples(&[triple]);

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].position, Position::Subject);
        assert_eq!(fragments[0].id, "GO:1");
        assert_eq!(fragments[0].name, "GO:1");
        assert_eq!(fragments[1].position, Position::Object);
        assert_eq!(fragments[1].group_key, "GO:1/BFO:0000050/GO:2");
        assert_eq!(relations, vec![EdgeRelation::new("GO:1/BFO:0000050/GO:2", "BFO:0000050", "BFO:0000050")]);
    }

    #[test]
    fn test_repeated_triple_in_block_collapses() {
        let triple = Triple::parse("GO_1\tsubClassOf\tGO_2").unwrap();
        let (fragments, relations) = fragments_from_triples(&[triple.clone(), triple]);
        assert_eq!(fragments.len(), 2);
        assert_eq!(relations.len(), 1);
    }
}
