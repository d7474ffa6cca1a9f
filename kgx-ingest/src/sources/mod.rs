//! Source readers producing node and relation fragments

pub mod triples;

pub use triples::{fragments_from_triples, to_curie, Triple, TripleReader};
