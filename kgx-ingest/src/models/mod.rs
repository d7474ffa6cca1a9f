//! Data models for the loader

pub mod load_metadata;
pub mod normalization_record;

pub use load_metadata::{AssemblyStats, LoadMetadata, NormalizationStats};
pub use normalization_record::{NormalizationRecord, PredicateRecord};
