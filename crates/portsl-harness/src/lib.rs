//! Diagnostic harness for the portable shared-library layer.
//!
//! This crate provides:
//! - Inventory: group enumerated regions by library
//! - Probes: open a library, resolve symbols, close it, and report each step
//! - Structured logs: JSONL records for every probe step

#![forbid(unsafe_code)]

pub mod error;
pub mod inventory;
pub mod probe;
pub mod structured_log;

pub use error::{HarnessError, HarnessResult};
pub use inventory::{LibraryInventory, LibrarySummary};
pub use probe::{ProbeReport, SymbolSpec, probe_library};
