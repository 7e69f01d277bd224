//! Host loaded-library enumerators.
//!
//! Linux and Android read `/proc/self/maps`; Apple platforms walk the images
//! dyld reports. [`HostEnumerator`] names the one this target uses.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use portsl_core::maps::{MAPS_LINE_CAPACITY, scan_maps};
use portsl_core::messages::Message;
use portsl_core::{ErrorSlot, LibraryEnumerator, LibraryRegion, SlError, SlErrorKind};

/// Default location of the process memory map.
pub const PROC_SELF_MAPS: &str = "/proc/self/maps";

/// Text-table enumerator over a `/proc/<pid>/maps` style file.
#[derive(Debug, Clone)]
pub struct ProcMaps {
    path: PathBuf,
}

impl ProcMaps {
    /// Enumerator over an arbitrary maps file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcMaps {
    fn default() -> Self {
        Self::at(PROC_SELF_MAPS)
    }
}

impl LibraryEnumerator for ProcMaps {
    fn enumerate(
        &self,
        errors: &ErrorSlot,
        visitor: &mut dyn FnMut(&LibraryRegion<'_>) -> usize,
    ) -> Result<usize, SlError> {
        let file = File::open(&self.path).map_err(|err| {
            tracing::debug!(path = %self.path.display(), %err, "failed to open maps");
            SlError::new(SlErrorKind::FileOpenFailed, Message::MapsOpenFailed.text())
        })?;
        let reader = BufReader::with_capacity(MAPS_LINE_CAPACITY, file);
        Ok(scan_maps(reader, errors, visitor))
    }
}

#[cfg(target_vendor = "apple")]
mod dyld {
    use std::ffi::{CStr, c_char};

    use portsl_core::macho::{MACH_HEADER_64_SIZE, MachHeader64, visit_image_segments};
    use portsl_core::{ErrorSlot, LibraryEnumerator, LibraryRegion, SlError};

    unsafe extern "C" {
        fn _dyld_image_count() -> u32;
        fn _dyld_get_image_header(image_index: u32) -> *const u8;
        fn _dyld_get_image_vmaddr_slide(image_index: u32) -> isize;
        fn _dyld_get_image_name(image_index: u32) -> *const c_char;
    }

    /// Binary-header enumerator over the images dyld has loaded.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct DyldImages;

    impl LibraryEnumerator for DyldImages {
        fn enumerate(
            &self,
            _errors: &ErrorSlot,
            visitor: &mut dyn FnMut(&LibraryRegion<'_>) -> usize,
        ) -> Result<usize, SlError> {
            // SAFETY: dyld image queries take no pointers.
            let count = unsafe { _dyld_image_count() };
            for index in 0..count {
                // SAFETY: `index` is below the count dyld just reported.
                let name = unsafe { _dyld_get_image_name(index) };
                if name.is_null() {
                    continue;
                }
                // SAFETY: non-null image names are NUL-terminated and owned
                // by dyld for as long as the image stays loaded.
                let path = unsafe { CStr::from_ptr(name) }.to_bytes();
                if !path.starts_with(b"/") {
                    continue;
                }
                // SAFETY: as above, `index` is in range.
                let header = unsafe { _dyld_get_image_header(index) };
                if header.is_null() {
                    continue;
                }
                // SAFETY: a loaded image maps at least its header and load
                // commands readable at `header`.
                let head = unsafe { std::slice::from_raw_parts(header, MACH_HEADER_64_SIZE) };
                let Ok(parsed) = MachHeader64::parse(head) else {
                    continue;
                };
                // SAFETY: the header and its `sizeofcmds` bytes of load
                // commands are mapped together at `header`.
                let image = unsafe { std::slice::from_raw_parts(header, parsed.image_span()) };
                // SAFETY: as above, `index` is in range.
                let slide = unsafe { _dyld_get_image_vmaddr_slide(index) };

                let result = visit_image_segments(image, slide, path, visitor);
                if result != 0 {
                    return Ok(result);
                }
            }
            Ok(0)
        }
    }
}

#[cfg(target_vendor = "apple")]
pub use dyld::DyldImages;

/// Enumerator used by the host service.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub type HostEnumerator = ProcMaps;
/// Enumerator used by the host service.
#[cfg(target_vendor = "apple")]
pub type HostEnumerator = DyldImages;
/// Enumerator used by the host service.
#[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple")))]
pub type HostEnumerator = portsl_core::enumerate::Unsupported;
