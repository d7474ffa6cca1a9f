//! Triple file → KGX loader
//!
//! # Per-file flow
//! 1. Read the source in blocks of `block_size` triples
//! 2. Per block: build fragments, normalize node ids and relations
//!    concurrently, rewrite, assemble edges, and feed edges then nodes into
//!    the dedup emitter
//! 3. Write the deduplicated node/edge files and `<stem>_load_metadata.json`
//!
//! The loader owns one node cache and one edge cache for its lifetime, so
//! ids seen in an earlier block or file are never looked up again. Both
//! caches can be seeded from and saved to a directory of JSON snapshots.

use crate::error::IngestResult;
use crate::models::{LoadMetadata, NormalizationRecord, PredicateRecord};
use crate::services::batch_normalizer::{BatchConfig, BatchNormalizer};
use crate::services::dedup_emitter::DedupEmitter;
use crate::services::edge_norm_client::EdgeNormClient;
use crate::services::group_assembler::{AssemblerConfig, GroupAssembler};
use crate::services::kgx_writer::{write_emitter, KgxOutputPaths};
use crate::services::lookup::LookupService;
use crate::services::node_norm_client::NodeNormClient;
use crate::services::normalization_cache::NormalizationCache;
use crate::services::record_rewriter::{rewrite, rewrite_relations};
use crate::sources::triples::{fragments_from_triples, TripleReader};
use crate::types::{EdgeRelation, KgxNode, NodeFragment};
use kgx_common::config::{OutputConfig, TomlConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Node cache file name inside a cache snapshot directory
pub const NODE_CACHE_FILE: &str = "node_norms.json";
/// Edge cache file name inside a cache snapshot directory
pub const EDGE_CACHE_FILE: &str = "edge_norms.json";

/// Loader settings not covered by the normalizers
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// Directory holding the source files; outputs are written here too
    pub data_dir: PathBuf,
    pub output: OutputConfig,
    /// Leave the source file in place after a successful load
    pub keep_input: bool,
    pub strict_relations: bool,
}

impl LoaderConfig {
    pub fn new(data_dir: impl Into<PathBuf>, output: OutputConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            output,
            keep_input: false,
            strict_relations: false,
        }
    }
}

/// Loads triple files into KGX node/edge files
pub struct KgxLoader<N = NodeNormClient, E = EdgeNormClient>
where
    N: LookupService<Record = NormalizationRecord>,
    E: LookupService<Record = PredicateRecord>,
{
    node_normalizer: BatchNormalizer<N>,
    edge_normalizer: BatchNormalizer<E>,
    node_cache: NormalizationCache<NormalizationRecord>,
    edge_cache: NormalizationCache<PredicateRecord>,
    config: LoaderConfig,
    cancel: CancellationToken,
}

impl KgxLoader<NodeNormClient, EdgeNormClient> {
    /// Loader backed by the HTTP normalization services
    pub fn from_config(config: &TomlConfig, loader_config: LoaderConfig) -> IngestResult<Self> {
        let normalization = &config.normalization;
        let node_client = NodeNormClient::from_config(normalization)?;
        let edge_client = EdgeNormClient::from_config(normalization)?;

        info!(
            node_endpoint = %normalization.node_endpoint,
            edge_endpoint = %normalization.edge_endpoint,
            "Normalization services configured"
        );

        Ok(Self::new(
            BatchNormalizer::new(Arc::new(node_client), BatchConfig::for_nodes(normalization)),
            BatchNormalizer::new(Arc::new(edge_client), BatchConfig::for_edges(normalization)),
            loader_config,
        ))
    }
}

impl<N, E> KgxLoader<N, E>
where
    N: LookupService<Record = NormalizationRecord>,
    E: LookupService<Record = PredicateRecord>,
{
    pub fn new(node_normalizer: BatchNormalizer<N>, edge_normalizer: BatchNormalizer<E>, config: LoaderConfig) -> Self {
        Self {
            node_normalizer,
            edge_normalizer,
            node_cache: NormalizationCache::new(),
            edge_cache: NormalizationCache::new(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_caches(
        mut self,
        node_cache: NormalizationCache<NormalizationRecord>,
        edge_cache: NormalizationCache<PredicateRecord>,
    ) -> Self {
        self.node_cache = node_cache;
        self.edge_cache = edge_cache;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn node_cache(&self) -> &NormalizationCache<NormalizationRecord> {
        &self.node_cache
    }

    pub fn edge_cache(&self) -> &NormalizationCache<PredicateRecord> {
        &self.edge_cache
    }

    /// Replace both caches with the snapshots found in `dir`
    ///
    /// A snapshot file that does not exist leaves that cache empty.
    pub fn seed_caches(&mut self, dir: &Path) -> IngestResult<()> {
        let node_path = dir.join(NODE_CACHE_FILE);
        if node_path.exists() {
            self.node_cache = NormalizationCache::load_json(&node_path)?;
        } else {
            warn!(path = %node_path.display(), "No node cache snapshot, starting empty");
        }

        let edge_path = dir.join(EDGE_CACHE_FILE);
        if edge_path.exists() {
            self.edge_cache = NormalizationCache::load_json(&edge_path)?;
        } else {
            warn!(path = %edge_path.display(), "No edge cache snapshot, starting empty");
        }

        Ok(())
    }

    pub fn save_caches(&self, dir: &Path) -> IngestResult<()> {
        std::fs::create_dir_all(dir)?;
        self.node_cache.save_json(&dir.join(NODE_CACHE_FILE))?;
        self.edge_cache.save_json(&dir.join(EDGE_CACHE_FILE))?;
        Ok(())
    }

    /// Load each named file from the data directory in turn
    ///
    /// Stops early, without error, once the run is cancelled.
    pub async fn load(&self, file_names: &[String]) -> IngestResult<Vec<LoadMetadata>> {
        info!(files = file_names.len(), "Start of KGX load");

        let mut loaded = Vec::with_capacity(file_names.len());
        for file_name in file_names {
            let metadata = self.load_file(file_name).await?;
            let cancelled = metadata.cancelled;
            loaded.push(metadata);
            if cancelled {
                warn!("Load cancelled, remaining files skipped");
                break;
            }
        }

        info!("KGX load complete");
        Ok(loaded)
    }

    /// Load one source file from the data directory
    pub async fn load_file(&self, file_name: &str) -> IngestResult<LoadMetadata> {
        let input = self.config.data_dir.join(file_name);
        let stem = file_name.split('.').next().unwrap_or(file_name);
        let mode = self.config.output.mode;
        let paths = KgxOutputPaths::new(&self.config.data_dir, stem, mode);

        let assembler = GroupAssembler::new(AssemblerConfig {
            source_database: Some(
                self.config
                    .output
                    .source_database
                    .clone()
                    .unwrap_or_else(|| stem.to_string()),
            ),
            strict_relations: self.config.strict_relations,
        });

        info!(
            file = %input.display(),
            block_size = self.config.output.block_size,
            mode = %mode,
            "Loading source file"
        );

        let mut metadata = LoadMetadata::start(file_name);
        let mut reader = TripleReader::open(&input, self.config.output.block_size)?;
        let mut emitter = DedupEmitter::new(mode);
        let mut block_number = 0usize;

        while let Some(triples) = reader.next_block()? {
            if self.cancel.is_cancelled() {
                metadata.cancelled = true;
                break;
            }

            block_number += 1;
            let started = Instant::now();
            let (fragments, relations) = fragments_from_triples(&triples);

            self.process_block(fragments, relations, &assembler, &mut emitter, &mut metadata)
                .await?;

            debug!(
                block = block_number,
                triples = triples.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Block complete"
            );

            if metadata.cancelled {
                break;
            }
        }

        metadata.num_source_lines = reader.lines_read();
        metadata.unusable_source_lines = reader.unusable_lines();

        let (node_count, edge_count) = write_emitter(&emitter, &paths)?;
        metadata.node_count = node_count;
        metadata.edge_count = edge_count;
        metadata.finish();
        metadata.write_json(&paths.metadata)?;

        info!(
            file = file_name,
            nodes = node_count,
            edges = edge_count,
            node_failures = metadata.node_norm_failures.len(),
            edge_failures = metadata.edge_norm_failures.len(),
            cancelled = metadata.cancelled,
            "Source file loaded"
        );

        if !self.config.keep_input && !metadata.cancelled {
            std::fs::remove_file(&input)?;
            debug!(file = %input.display(), "Removed source file");
        }

        Ok(metadata)
    }

    async fn process_block(
        &self,
        mut fragments: Vec<NodeFragment>,
        mut relations: Vec<EdgeRelation>,
        assembler: &GroupAssembler,
        emitter: &mut DedupEmitter,
        metadata: &mut LoadMetadata,
    ) -> IngestResult<()> {
        let node_ids: Vec<String> = fragments.iter().map(|f| f.id.clone()).collect();
        let relation_ids: Vec<String> = relations.iter().map(|r| r.relation.clone()).collect();

        let (node_report, edge_report) = tokio::join!(
            self.node_normalizer
                .normalize_cancellable(&node_ids, &self.node_cache, &self.cancel),
            self.edge_normalizer
                .normalize_cancellable(&relation_ids, &self.edge_cache, &self.cancel),
        );

        metadata.node_normalization.absorb(&node_report);
        metadata.edge_normalization.absorb(&edge_report);
        metadata.node_norm_failures.extend(node_report.unresolved);
        metadata.edge_norm_failures.extend(edge_report.unresolved);

        // Ids of a cancelled block may still be Miss; emit nothing from it
        if node_report.cancelled || edge_report.cancelled {
            metadata.cancelled = true;
            return Ok(());
        }

        rewrite(&mut fragments, &self.node_cache);
        rewrite_relations(&mut relations, &self.edge_cache);

        let nodes: Vec<KgxNode> = fragments.iter().map(KgxNode::from).collect();
        let (edges, assembly) = assembler.assemble(fragments, &relations)?;
        metadata.assembly.absorb(&assembly);

        for edge in &edges {
            emitter.emit_edge(edge);
        }
        for node in &nodes {
            emitter.emit_node(node);
        }

        Ok(())
    }
}
