//! # KGX Common Library
//!
//! Shared code for the KGX source loaders:
//! - Error and result types
//! - TOML configuration loading with layered resolution
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
