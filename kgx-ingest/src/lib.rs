//! kgx-ingest library interface
//!
//! Normalizes identifiers against remote batch services, assembles edges
//! from grouped node fragments and writes deduplicated KGX node/edge files.

pub mod error;
pub mod models;
pub mod services;
pub mod sources;
pub mod types;
pub mod utils;
pub mod workflow;

pub use crate::error::{IngestError, IngestResult, LookupError};
pub use crate::workflow::{KgxLoader, LoaderConfig};
