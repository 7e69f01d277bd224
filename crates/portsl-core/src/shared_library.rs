//! Shared-library open/close/lookup and loaded-library enumeration.
//!
//! [`SharedLibraries`] owns the request logic: name checks, decoration,
//! the retry next to the layer's own module and failure classification. The
//! OS side sits behind [`DynamicLinker`] and [`LibraryEnumerator`], so the
//! whole state machine runs against a recording linker in tests.

use std::borrow::Cow;

use crate::config::{SlConfig, TranscoderChoice};
use crate::dlfcn::{
    LibraryHandle, LibraryNaming, LoadMode, OpenFlags, OpenTarget, SymbolAddress,
    SymbolDescriptor, decorate, sibling_path,
};
use crate::enumerate::{LibraryEnumerator, LibraryRegion};
use crate::error::{ErrorSlot, LastError, SlError, SlErrorKind, SlResult, SymbolNotFound};
use crate::error_text::{MAX_ERR_BUF_LENGTH, RawCopy, normalize_error_text};
use crate::messages::Message;

/// OS dynamic-linker operations.
pub trait DynamicLinker {
    /// `dlopen`. `None` on failure, with the reason left for [`take_error`].
    ///
    /// [`take_error`]: DynamicLinker::take_error
    fn open(&self, target: OpenTarget<'_>, mode: LoadMode) -> Option<LibraryHandle>;

    /// `dlclose`. The OS status is returned unmodified.
    fn close(&self, handle: LibraryHandle) -> i32;

    /// `dlsym`. `None` when the symbol is absent or resolves to null.
    fn symbol(&self, handle: LibraryHandle, name: &str) -> Option<SymbolAddress>;

    /// `dlerror`: the raw text of the last linker failure, consuming it.
    fn take_error(&self) -> Option<Vec<u8>>;

    /// Convert raw linker text to UTF-8 in `out`, NUL-terminated.
    fn normalize_error(
        &self,
        _choice: TranscoderChoice,
        raw: Option<&[u8]>,
        out: &mut [u8],
    ) -> usize {
        normalize_error_text(raw, out, &mut RawCopy)
    }

    /// Filesystem path of the module containing this layer, if the platform
    /// can report it.
    fn self_location(&self) -> Option<Vec<u8>> {
        None
    }

    /// Whether `path` names an existing regular file.
    fn is_regular_file(&self, path: &[u8]) -> bool;
}

/// The shared-library service.
#[derive(Debug)]
pub struct SharedLibraries<L, E> {
    linker: L,
    enumerator: E,
    naming: LibraryNaming,
    config: SlConfig,
    errors: ErrorSlot,
}

impl<L: DynamicLinker, E: LibraryEnumerator> SharedLibraries<L, E> {
    /// Service using the host naming convention and default configuration.
    pub fn new(linker: L, enumerator: E) -> Self {
        Self {
            linker,
            enumerator,
            naming: LibraryNaming::HOST,
            config: SlConfig::default(),
            errors: ErrorSlot::new(),
        }
    }

    /// Default host bindings configured from the process environment.
    pub fn from_env() -> Self
    where
        L: Default,
        E: Default,
    {
        Self::new(L::default(), E::default()).with_config(crate::config::sl_config())
    }

    #[must_use]
    pub fn with_config(mut self, config: SlConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_naming(mut self, naming: LibraryNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn linker(&self) -> &L {
        &self.linker
    }

    pub fn config(&self) -> SlConfig {
        self.config
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.errors.last()
    }

    pub fn clear_last_error(&self) {
        self.errors.clear();
    }

    pub fn startup(&self) -> SlResult<()> {
        tracing::trace!("shared library layer startup");
        Ok(())
    }

    pub fn shutdown(&self) {
        tracing::trace!("shared library layer shutdown");
    }

    /// Open a shared library.
    ///
    /// `name` is passed to the OS byte for byte. Every failure is also
    /// recorded as the last error.
    pub fn open(&self, name: impl AsRef<[u8]>, flags: OpenFlags) -> SlResult<LibraryHandle> {
        let name = name.as_ref();
        tracing::debug!(name = %name.escape_ascii(), flags = flags.bits(), "open shared library");
        match self.open_inner(name, flags) {
            Ok(handle) => {
                tracing::debug!(handle = handle.as_raw(), "opened");
                Ok(handle)
            }
            Err(err) => {
                tracing::debug!(code = err.code(), "open failed");
                Err(self.errors.record(err))
            }
        }
    }

    fn open_inner(&self, name: &[u8], flags: OpenFlags) -> SlResult<LibraryHandle> {
        let executable = flags.contains(OpenFlags::OPEN_EXECUTABLE);
        let mode = flags.load_mode();

        let open_name: Cow<'_, [u8]> = if executable {
            Cow::Borrowed(name)
        } else {
            check_name(name)?;
            if flags.contains(OpenFlags::DECORATE) {
                Cow::Owned(decorate(name, self.naming)?)
            } else {
                Cow::Borrowed(name)
            }
        };
        let target = if executable {
            OpenTarget::Executable
        } else {
            OpenTarget::Path(&open_name)
        };
        tracing::trace!(name = %open_name.escape_ascii(), ?mode, "loading");

        if mode.no_load {
            let handle = self.linker.open(target, mode);
            tracing::trace!(found = handle.is_some(), "no-load probe");
            return handle.ok_or_else(|| SlError::new(SlErrorKind::NotFound, self.os_error_text()));
        }

        if let Some(handle) = self.linker.open(target, mode) {
            return Ok(handle);
        }

        if !executable && self.config.self_dir_fallback {
            if let Some(handle) = self.retry_beside_self(target, &open_name, mode)? {
                return Ok(handle);
            }
        }

        let text = self.os_error_text();
        tracing::debug!(error = %text, "load failed");
        let kind = if !executable && self.linker.is_regular_file(&open_name) {
            SlErrorKind::Invalid
        } else {
            SlErrorKind::NotFound
        };
        Err(SlError::new(kind, text))
    }

    /// Load `open_name` from the directory holding this layer's own module.
    /// When that also fails the first attempt is repeated so the pending OS
    /// error describes `open_name`.
    ///
    /// `open_name` is the name of the first attempt, so it carries the
    /// platform prefix and suffix when decoration was requested.
    fn retry_beside_self(
        &self,
        target: OpenTarget<'_>,
        open_name: &[u8],
        mode: LoadMode,
    ) -> SlResult<Option<LibraryHandle>> {
        let Some(location) = self.linker.self_location() else {
            return Ok(None);
        };
        let Some(sibling) = sibling_path(&location, open_name) else {
            return Ok(None);
        };
        let sibling = sibling?;

        tracing::trace!(path = %sibling.escape_ascii(), "retrying beside own module");
        if let Some(handle) = self.linker.open(OpenTarget::Path(&sibling), mode) {
            return Ok(Some(handle));
        }
        Ok(self.linker.open(target, mode))
    }

    /// Close a handle. A null handle is a no-op returning `0`.
    pub fn close(&self, handle: LibraryHandle) -> i32 {
        tracing::debug!(handle = handle.as_raw(), "close shared library");
        if handle.is_null() {
            return 0;
        }
        let rc = self.linker.close(handle);
        if rc != 0 {
            let text = self.os_error_text();
            tracing::warn!(rc, error = %text, "dlclose() failed");
        }
        rc
    }

    /// Resolve `symbol` in `handle`. The signature is carried for
    /// diagnostics only.
    pub fn lookup(
        &self,
        handle: LibraryHandle,
        symbol: &SymbolDescriptor<'_>,
    ) -> Result<SymbolAddress, SymbolNotFound> {
        tracing::debug!(
            handle = handle.as_raw(),
            name = symbol.name,
            signature = symbol.signature,
            "lookup name"
        );
        match self.linker.symbol(handle, symbol.name) {
            Some(address) => {
                tracing::trace!(address = address.as_raw(), "resolved");
                Ok(address)
            }
            None => {
                tracing::debug!(name = symbol.name, "symbol not found");
                Err(SymbolNotFound {
                    name: symbol.name.to_string(),
                })
            }
        }
    }

    /// Report every file-backed region of the loaded libraries to `visitor`.
    ///
    /// Returns `Ok(0)` after a complete walk, or the first non-zero visitor
    /// result. A missing visitor is an [`SlErrorKind::OpFailed`] error.
    pub fn enumerate_libraries(
        &self,
        visitor: Option<&mut dyn FnMut(&LibraryRegion<'_>) -> usize>,
    ) -> SlResult<usize> {
        let Some(visitor) = visitor else {
            return Err(self.errors.record(SlError::new(
                SlErrorKind::OpFailed,
                Message::NullCallback.text(),
            )));
        };
        self.enumerator
            .enumerate(&self.errors, visitor)
            .map_err(|err| self.errors.record(err))
    }

    fn os_error_text(&self) -> String {
        let raw = self.linker.take_error();
        let mut buf = [0_u8; MAX_ERR_BUF_LENGTH];
        let len = self
            .linker
            .normalize_error(self.config.transcoder, raw.as_deref(), &mut buf);
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }
}

fn check_name(name: &[u8]) -> SlResult<()> {
    if name.is_empty() {
        return Err(SlError::new(
            SlErrorKind::Unsupported,
            Message::EmptyLibraryName.text(),
        ));
    }
    if name.contains(&0) {
        return Err(SlError::new(
            SlErrorKind::Unsupported,
            Message::InteriorNul.text(),
        ));
    }
    Ok(())
}
