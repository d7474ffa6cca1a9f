//! KGX node/edge file output
//!
//! TSV: header line, then rows joined with `\n` (no trailing newline).
//! JSON: `{"nodes":[` + newline, objects joined with `,\n`, then `\n]}`.

use crate::services::dedup_emitter::DedupEmitter;
use kgx_common::config::OutputMode;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const NODE_TSV_HEADER: &str = "id\tname\tcategory\tequivalent_identifiers";
pub const EDGE_TSV_HEADER: &str = "id\tsubject\trelation\tedge_label\tobject\tsource_database";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Nodes,
    Edges,
}

impl RecordKind {
    fn tsv_header(self) -> &'static str {
        match self {
            RecordKind::Nodes => NODE_TSV_HEADER,
            RecordKind::Edges => EDGE_TSV_HEADER,
        }
    }

    fn json_key(self) -> &'static str {
        match self {
            RecordKind::Nodes => "nodes",
            RecordKind::Edges => "edges",
        }
    }
}

/// Output file locations for one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KgxOutputPaths {
    pub nodes: PathBuf,
    pub edges: PathBuf,
    pub metadata: PathBuf,
}

impl KgxOutputPaths {
    /// `<dir>/<stem>_nodes.<ext>`, `<dir>/<stem>_edges.<ext>`, `<dir>/<stem>_load_metadata.json`
    pub fn new(dir: &Path, stem: &str, mode: OutputMode) -> Self {
        Self {
            nodes: dir.join(format!("{}_nodes.{}", stem, mode.extension())),
            edges: dir.join(format!("{}_edges.{}", stem, mode.extension())),
            metadata: dir.join(format!("{}_load_metadata.json", stem)),
        }
    }
}

/// Write one KGX file; returns the number of records written
pub fn write_records<'a, I>(path: &Path, kind: RecordKind, mode: OutputMode, lines: I) -> io::Result<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = BufWriter::new(File::create(path)?);
    let count = write_to(&mut out, kind, mode, lines)?;
    out.flush()?;
    Ok(count)
}

fn write_to<'a, W, I>(out: &mut W, kind: RecordKind, mode: OutputMode, lines: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a str>,
{
    let separator = match mode {
        OutputMode::Tsv => {
            writeln!(out, "{}", kind.tsv_header())?;
            "\n"
        }
        OutputMode::Json => {
            writeln!(out, "{{\"{}\":[", kind.json_key())?;
            ",\n"
        }
    };

    let mut count = 0;
    for line in lines {
        if count > 0 {
            out.write_all(separator.as_bytes())?;
        }
        out.write_all(line.as_bytes())?;
        count += 1;
    }

    if mode == OutputMode::Json {
        out.write_all(b"\n]}")?;
    }

    Ok(count)
}

/// Write the node and edge files for everything collected in `emitter`
pub fn write_emitter(emitter: &DedupEmitter, paths: &KgxOutputPaths) -> io::Result<(usize, usize)> {
    let nodes = write_records(&paths.nodes, RecordKind::Nodes, emitter.mode(), emitter.node_lines())?;
    let edges = write_records(&paths.edges, RecordKind::Edges, emitter.mode(), emitter.edge_lines())?;

    tracing::info!(
        nodes,
        edges,
        node_file = %paths.nodes.display(),
        edge_file = %paths.edges.display(),
        "Wrote KGX files"
    );

    Ok((nodes, edges))
}
