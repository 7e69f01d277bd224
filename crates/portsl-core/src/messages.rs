//! Fallback message catalog.
//!
//! Substituted when the OS supplies no text of its own, or when the port
//! layer itself detects the failure.

/// Catalog entries used by the shared-library layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    UnknownError,
    BufferExceeded,
    NullCallback,
    MapsOpenFailed,
    MapsLineTruncated,
    EmptyLibraryName,
    InteriorNul,
    NameTooLong,
    EnumerationUnsupported,
}

impl Message {
    /// English text for this entry, without a trailing newline.
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error",
            Self::BufferExceeded => {
                "Insufficient buffer memory while attempting to load a shared library"
            }
            Self::NullCallback => "Callback function is NULL.",
            Self::MapsOpenFailed => "Failed to open /proc/self/maps",
            Self::MapsLineTruncated => "An unexpected long path name. Line is truncated.",
            Self::EmptyLibraryName => "Shared library name is empty",
            Self::InteriorNul => "Shared library name contains a NUL byte",
            Self::NameTooLong => "Decorated shared library name exceeds the maximum length",
            Self::EnumerationUnsupported => {
                "Enumerating loaded libraries is not supported on this platform"
            }
        }
    }
}

impl core::fmt::Display for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.text())
    }
}
