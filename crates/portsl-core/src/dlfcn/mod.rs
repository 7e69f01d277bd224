//! Dynamic linking request types: flags, handles and symbol descriptors.
//!
//! Pure-logic pieces of the shared-library layer. Actual dlopen/dlsym/dlclose
//! invocations live behind the [`DynamicLinker`](crate::DynamicLinker) seam.

pub mod naming;

pub use naming::{LibraryNaming, MAX_STRING_LENGTH, decorate, sibling_path};

/// Options accepted by `open`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// Defer symbol resolution. Absent means resolve eagerly.
    pub const LAZY: Self = Self(0x1);
    /// Apply the platform naming convention to the name.
    pub const DECORATE: Self = Self(0x2);
    /// Open the running executable instead of a named file.
    pub const OPEN_EXECUTABLE: Self = Self(0x4);
    /// Only succeed when the library is already loaded.
    pub const NO_LOAD: Self = Self(0x8);

    const ALL: u32 = 0xF;

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw C ABI bits. Unknown bits are dropped.
    #[must_use]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Linker request derived from these flags.
    #[must_use]
    pub const fn load_mode(self) -> LoadMode {
        LoadMode {
            binding: if self.contains(Self::LAZY) {
                Binding::Lazy
            } else {
                Binding::Now
            },
            no_load: self.contains(Self::NO_LOAD),
        }
    }
}

impl core::ops::BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Symbol binding requested from the linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// `RTLD_LAZY`
    Lazy,
    /// `RTLD_NOW`
    Now,
}

/// Exact request handed to the linker. A no-load request still carries a
/// binding because the OS requires one of lazy/now alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadMode {
    pub binding: Binding,
    pub no_load: bool,
}

/// What the linker should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenTarget<'a> {
    /// The running program image.
    Executable,
    /// A library name or path, as raw OS bytes.
    Path(&'a [u8]),
}

/// Opaque native library handle.
///
/// There is no destructor: the caller owns the close obligation. Using a
/// handle after it was closed is whatever the OS makes of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct LibraryHandle(usize);

impl LibraryHandle {
    /// Zero sentinel. Closing it is a no-op.
    pub const NULL: Self = Self(0);

    /// Wrap a raw native handle value.
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Address of a resolved symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SymbolAddress(usize);

impl SymbolAddress {
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> usize {
        self.0
    }
}

/// A symbol name plus its argument signature.
///
/// The signature uses one character per type: `V` void, `Z` boolean, `B`
/// byte, `C` 16-bit char, `I` 32-bit int, `J` 64-bit int, `F` float, `D`
/// double, `L` object/pointer, `P` pointer-width value. Lowercase means
/// unsigned. The first character is the return type, the rest are the
/// parameters left to right. This layer never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolDescriptor<'a> {
    pub name: &'a str,
    pub signature: &'a str,
}

impl<'a> SymbolDescriptor<'a> {
    #[must_use]
    pub const fn new(name: &'a str, signature: &'a str) -> Self {
        Self { name, signature }
    }
}
