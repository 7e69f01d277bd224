// All extern "C" exports accept raw pointers from C callers and check them
// for null at the boundary.
#![allow(clippy::missing_safety_doc)]
//! # portsl-abi
//!
//! Host bindings and the `extern "C"` boundary of the portable shared-library
//! layer.
//!
//! This crate produces a `cdylib` exposing the `portsl_sl_*` entry points.
//! Each entry point goes through the process-wide [`HostSharedLibraries`]
//! service, whose request logic lives in `portsl-core`.
//!
//! # Architecture
//!
//! ```text
//! C caller -> sl_abi entry -> SharedLibraries (core) -> HostLinker / HostEnumerator -> OS
//! ```

pub mod enumerate;
pub mod linker;
pub mod sl_abi;
pub mod transcode;

pub use enumerate::{HostEnumerator, ProcMaps};
pub use linker::HostLinker;

/// The shared-library service bound to this host.
pub type HostSharedLibraries = portsl_core::SharedLibraries<HostLinker, HostEnumerator>;
