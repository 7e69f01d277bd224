//! # portsl-core
//!
//! Safe logic of the portable shared-library layer.
//!
//! This crate holds everything that can be expressed without touching the
//! OS: flags and handles, name decoration, the error taxonomy and last-error
//! slot, error-text normalization, the `/proc/self/maps` parser, the Mach-O
//! segment walker and the open/close/lookup state machine. Host bindings
//! live in `portsl-abi`. No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod config;
pub mod dlfcn;
pub mod enumerate;
pub mod error;
pub mod error_text;
pub mod macho;
pub mod maps;
pub mod messages;
pub mod shared_library;

pub use config::{SlConfig, TranscoderChoice, sl_config};
pub use dlfcn::{
    Binding, LibraryHandle, LibraryNaming, LoadMode, OpenFlags, OpenTarget, SymbolAddress,
    SymbolDescriptor,
};
pub use enumerate::{LibraryEnumerator, LibraryRegion};
pub use error::{ErrorSlot, LastError, SlError, SlErrorKind, SlResult, SymbolNotFound};
pub use shared_library::{DynamicLinker, SharedLibraries};
