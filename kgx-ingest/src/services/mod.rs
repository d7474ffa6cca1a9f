//! Normalization, assembly and output services

pub mod batch_normalizer;
pub mod dedup_emitter;
pub mod edge_norm_client;
pub mod group_assembler;
pub mod kgx_writer;
pub mod lookup;
pub mod node_norm_client;
pub mod normalization_cache;
pub mod record_rewriter;

pub use batch_normalizer::{BatchConfig, BatchNormalizer, NormalizationReport};
pub use dedup_emitter::{content_hash, DedupEmitter};
pub use edge_norm_client::EdgeNormClient;
pub use group_assembler::{AssemblerConfig, AssemblyReport, GroupAssembler};
pub use kgx_writer::KgxOutputPaths;
pub use lookup::{BatchAnswer, LookupService};
pub use node_norm_client::NodeNormClient;
pub use normalization_cache::{Lookup, NormalizationCache};
pub use record_rewriter::RewriteReport;
