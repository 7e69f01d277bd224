//! Error taxonomy and the last-error slot.
//!
//! Every failing port-layer operation reports a numeric code together with a
//! UTF-8 message. The code is what crosses the C ABI; the message is recorded
//! in an [`ErrorSlot`] owned by the service object so callers (and tests) can
//! inspect the most recent failure without a hidden global.

use parking_lot::Mutex;
use thiserror::Error;

/// No such file.
pub const SL_NOT_FOUND: i32 = 1;
/// Library exists but failed to load or link.
pub const SL_INVALID: i32 = 2;
/// Precondition or static buffer violation detected before any OS call.
pub const SL_UNSUPPORTED: i32 = 3;
/// Invalid argument, or a step that should never fail did.
pub const PORT_ERROR_OPFAILED: i32 = -1;
/// Operation has no implementation on this platform.
pub const PORT_ERROR_NOT_SUPPORTED_ON_THIS_PLATFORM: i32 = -2;
/// A file the operation depends on could not be opened.
pub const PORT_ERROR_FILE_OPFAILED: i32 = -3;

/// Classification of a port-layer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlErrorKind {
    /// Target does not exist as a file.
    NotFound,
    /// Target exists but failed to load, or a composed path did not fit.
    Invalid,
    /// Precondition violation detected before any OS call.
    Unsupported,
    /// Invalid argument such as a missing visitor.
    OpFailed,
    /// Enumeration is unavailable on this platform.
    NotSupportedOnThisPlatform,
    /// A pseudo-file required by the operation could not be opened.
    FileOpenFailed,
}

impl SlErrorKind {
    /// Numeric code reported across the C ABI.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::NotFound => SL_NOT_FOUND,
            Self::Invalid => SL_INVALID,
            Self::Unsupported => SL_UNSUPPORTED,
            Self::OpFailed => PORT_ERROR_OPFAILED,
            Self::NotSupportedOnThisPlatform => PORT_ERROR_NOT_SUPPORTED_ON_THIS_PLATFORM,
            Self::FileOpenFailed => PORT_ERROR_FILE_OPFAILED,
        }
    }

    /// Short lowercase label used in messages and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Invalid => "invalid",
            Self::Unsupported => "unsupported",
            Self::OpFailed => "operation failed",
            Self::NotSupportedOnThisPlatform => "not supported on this platform",
            Self::FileOpenFailed => "file open failed",
        }
    }
}

impl core::fmt::Display for SlErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure with its diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SlError {
    pub kind: SlErrorKind,
    pub message: String,
}

impl SlError {
    #[must_use]
    pub fn new(kind: SlErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Numeric code for this error.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.kind.code()
    }
}

/// Result type for port-layer operations.
pub type SlResult<T> = Result<T, SlError>;

/// Symbol lookup failure. Lookup failures carry no OS text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("symbol not found: {name}")]
pub struct SymbolNotFound {
    pub name: String,
}

impl SymbolNotFound {
    /// Lookup failures always report code 1.
    #[must_use]
    pub const fn code(&self) -> i32 {
        1
    }
}

/// Snapshot of the most recently recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub code: i32,
    pub message: String,
}

/// Last-error storage owned by a service instance.
#[derive(Debug, Default)]
pub struct ErrorSlot {
    inner: Mutex<Option<LastError>>,
}

impl ErrorSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `code` and `message`, returning `code`.
    pub fn set(&self, code: i32, message: impl Into<String>) -> i32 {
        *self.inner.lock() = Some(LastError {
            code,
            message: message.into(),
        });
        code
    }

    /// Record `err` and hand it back, so failures can be written as
    /// `return Err(slot.record(err))`.
    pub fn record(&self, err: SlError) -> SlError {
        self.set(err.code(), err.message.clone());
        err
    }

    #[must_use]
    pub fn last(&self) -> Option<LastError> {
        self.inner.lock().clone()
    }

    /// Code of the last failure, `0` when none was recorded.
    #[must_use]
    pub fn last_code(&self) -> i32 {
        self.inner.lock().as_ref().map_or(0, |e| e.code)
    }

    pub fn clear(&self) {
        *self.inner.lock() = None;
    }
}
