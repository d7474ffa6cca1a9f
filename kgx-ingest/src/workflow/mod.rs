//! Load workflows

pub mod loader;

pub use loader::{KgxLoader, LoaderConfig, EDGE_CACHE_FILE, NODE_CACHE_FILE};
