//! Test helper utilities
//!
//! Shared utilities for testing kgx-ingest

#![allow(dead_code)]

pub mod fake_service;
pub mod log_capture;

pub use fake_service::{id_number, node_service, numbered_ids, predicate_service, FakeService};
pub use log_capture::{capture_logs, LogCapture};
