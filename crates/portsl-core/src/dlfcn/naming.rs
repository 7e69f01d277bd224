//! Library name decoration and self-relative path composition.
//!
//! Both compositions are bounded by [`MAX_STRING_LENGTH`]. The length is
//! computed before anything is built, so an oversized name is rejected
//! rather than truncated. Names are raw bytes, as the OS sees them.

use crate::error::{SlError, SlErrorKind, SlResult};
use crate::messages::Message;

/// Maximum length of a composed library path.
pub const MAX_STRING_LENGTH: usize = 1024;

/// Platform shared-library file naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryNaming {
    pub prefix: &'static str,
    pub suffix: &'static str,
}

impl LibraryNaming {
    /// ELF platforms: `libfoo.so`.
    pub const ELF: Self = Self {
        prefix: "lib",
        suffix: ".so",
    };

    /// Apple platforms: `libfoo.dylib`.
    pub const MACHO: Self = Self {
        prefix: "lib",
        suffix: ".dylib",
    };

    /// Convention of the build target.
    #[cfg(target_vendor = "apple")]
    pub const HOST: Self = Self::MACHO;
    /// Convention of the build target.
    #[cfg(not(target_vendor = "apple"))]
    pub const HOST: Self = Self::ELF;
}

impl Default for LibraryNaming {
    fn default() -> Self {
        Self::HOST
    }
}

/// Apply `naming` to `name`, keeping any directory component.
///
/// `dir/foo` becomes `dir/libfoo.so`. Fails with
/// [`SlErrorKind::Unsupported`] when the result would reach
/// [`MAX_STRING_LENGTH`].
pub fn decorate(name: &[u8], naming: LibraryNaming) -> SlResult<Vec<u8>> {
    let (dir, base) = match name.iter().rposition(|&b| b == b'/') {
        Some(sep) => name.split_at(sep + 1),
        None => (&name[..0], name),
    };

    let len = dir.len() + naming.prefix.len() + base.len() + naming.suffix.len();
    if len >= MAX_STRING_LENGTH {
        return Err(SlError::new(
            SlErrorKind::Unsupported,
            Message::NameTooLong.text(),
        ));
    }

    let mut decorated = Vec::with_capacity(len);
    decorated.extend_from_slice(dir);
    decorated.extend_from_slice(naming.prefix.as_bytes());
    decorated.extend_from_slice(base);
    decorated.extend_from_slice(naming.suffix.as_bytes());
    Ok(decorated)
}

/// Path of `name` inside the directory holding `self_location`.
///
/// Returns `None` when `self_location` has no directory component, since the
/// result would repeat the attempt already made. A path that does not fit is
/// an [`SlErrorKind::Invalid`] error.
pub fn sibling_path(self_location: &[u8], name: &[u8]) -> Option<SlResult<Vec<u8>>> {
    let sep = self_location.iter().rposition(|&b| b == b'/')?;
    let dir = &self_location[..=sep];

    if MAX_STRING_LENGTH < dir.len() + name.len() + 1 {
        return Some(Err(SlError::new(
            SlErrorKind::Invalid,
            Message::BufferExceeded.text(),
        )));
    }

    let mut path = Vec::with_capacity(dir.len() + name.len());
    path.extend_from_slice(dir);
    path.extend_from_slice(name);
    Some(Ok(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decorate_bare_name() {
        assert_eq!(decorate(b"foo", LibraryNaming::ELF).unwrap(), b"libfoo.so");
        assert_eq!(
            decorate(b"foo", LibraryNaming::MACHO).unwrap(),
            b"libfoo.dylib"
        );
    }

    #[test]
    fn decorate_keeps_directory() {
        assert_eq!(
            decorate(b"/opt/vm/lib/jit", LibraryNaming::ELF).unwrap(),
            b"/opt/vm/lib/libjit.so"
        );
        assert_eq!(
            decorate(b"rel/dir/gc", LibraryNaming::MACHO).unwrap(),
            b"rel/dir/libgc.dylib"
        );
        assert_eq!(decorate(b"dir/", LibraryNaming::ELF).unwrap(), b"dir/lib.so");
    }

    #[test]
    fn decorate_passes_non_utf8_bytes_through() {
        assert_eq!(
            decorate(b"/opt/caf\xe9/jit", LibraryNaming::ELF).unwrap(),
            b"/opt/caf\xe9/libjit.so"
        );
    }

    #[test]
    fn decorate_rejects_at_limit() {
        // "lib" + base + ".so" == 1023 fits, 1024 does not.
        let fits = "a".repeat(MAX_STRING_LENGTH - 1 - 6);
        assert_eq!(
            decorate(fits.as_bytes(), LibraryNaming::ELF).unwrap().len(),
            MAX_STRING_LENGTH - 1
        );

        let too_long = "a".repeat(MAX_STRING_LENGTH - 6);
        let err = decorate(too_long.as_bytes(), LibraryNaming::ELF).unwrap_err();
        assert_eq!(err.kind, SlErrorKind::Unsupported);
    }

    #[test]
    fn host_naming_matches_target() {
        if cfg!(target_vendor = "apple") {
            assert_eq!(LibraryNaming::HOST.suffix, ".dylib");
        } else {
            assert_eq!(LibraryNaming::HOST.suffix, ".so");
        }
        assert_eq!(LibraryNaming::default(), LibraryNaming::HOST);
    }

    #[test]
    fn sibling_path_composes_directory() {
        assert_eq!(
            sibling_path(b"/opt/vm/lib/libportsl.so", b"libjit.so")
                .unwrap()
                .unwrap(),
            b"/opt/vm/lib/libjit.so"
        );
        assert_eq!(
            sibling_path(b"/libportsl.so", b"libjit.so").unwrap().unwrap(),
            b"/libjit.so"
        );
    }

    #[test]
    fn sibling_path_without_directory() {
        assert!(sibling_path(b"libportsl.so", b"libjit.so").is_none());
    }

    #[test]
    fn sibling_path_overflow_is_invalid() {
        let dir = format!("/{}/", "d".repeat(600));
        let self_location = format!("{dir}libportsl.so");
        let name = "n".repeat(MAX_STRING_LENGTH - dir.len());
        let err = sibling_path(self_location.as_bytes(), name.as_bytes())
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind, SlErrorKind::Invalid);
        assert_eq!(err.message, Message::BufferExceeded.text());

        // One byte shorter fits, counting the terminator.
        let name = "n".repeat(MAX_STRING_LENGTH - dir.len() - 1);
        assert!(
            sibling_path(self_location.as_bytes(), name.as_bytes())
                .unwrap()
                .is_ok()
        );
    }
}
