//! Host dynamic linker: `dlopen`, `dlsym`, `dlclose`, `dlerror`, `dladdr`.

use std::ffi::{CStr, CString, OsStr, c_int, c_void};
use std::os::unix::ffi::OsStrExt;

use portsl_core::{
    Binding, DynamicLinker, LibraryHandle, LoadMode, OpenTarget, SymbolAddress, TranscoderChoice,
};

use crate::transcode;

/// [`DynamicLinker`] over the process's `libdl`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostLinker;

fn dlopen_flags(mode: LoadMode) -> c_int {
    let binding = match mode.binding {
        Binding::Lazy => libc::RTLD_LAZY,
        Binding::Now => libc::RTLD_NOW,
    };
    if mode.no_load {
        binding | libc::RTLD_NOLOAD
    } else {
        binding
    }
}

// Only its address matters: dladdr resolves it to the module holding this crate.
#[inline(never)]
extern "C" fn location_anchor() {}

impl DynamicLinker for HostLinker {
    fn open(&self, target: OpenTarget<'_>, mode: LoadMode) -> Option<LibraryHandle> {
        let flags = dlopen_flags(mode);
        let handle = match target {
            // SAFETY: a null filename asks for the main program's handle.
            OpenTarget::Executable => unsafe { libc::dlopen(std::ptr::null(), flags) },
            OpenTarget::Path(path) => {
                let path = CString::new(path).ok()?;
                // SAFETY: `path` is NUL-terminated and outlives the call.
                unsafe { libc::dlopen(path.as_ptr(), flags) }
            }
        };
        (!handle.is_null()).then(|| LibraryHandle::from_raw(handle as usize))
    }

    fn close(&self, handle: LibraryHandle) -> i32 {
        // SAFETY: the caller hands back a handle from `open`; dlclose
        // validates it and reports failure through its status.
        unsafe { libc::dlclose(handle.as_raw() as *mut c_void) }
    }

    fn symbol(&self, handle: LibraryHandle, name: &str) -> Option<SymbolAddress> {
        let name = CString::new(name).ok()?;
        // SAFETY: `name` is NUL-terminated; the handle came from `open`.
        let address = unsafe { libc::dlsym(handle.as_raw() as *mut c_void, name.as_ptr()) };
        (!address.is_null()).then(|| SymbolAddress::from_raw(address as usize))
    }

    fn take_error(&self) -> Option<Vec<u8>> {
        // SAFETY: no arguments; returns null or a thread-local string.
        let message = unsafe { libc::dlerror() };
        if message.is_null() {
            return None;
        }
        // SAFETY: dlerror returns a NUL-terminated string valid until the next
        // dlerror call on this thread.
        Some(unsafe { CStr::from_ptr(message) }.to_bytes().to_vec())
    }

    fn normalize_error(&self, choice: TranscoderChoice, raw: Option<&[u8]>, out: &mut [u8]) -> usize {
        transcode::normalize_host(choice, raw, out)
    }

    fn self_location(&self) -> Option<Vec<u8>> {
        // SAFETY: Dl_info is plain pointers and integers; all-zero is valid.
        let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
        let anchor = location_anchor as extern "C" fn() as *const c_void;
        // SAFETY: `anchor` is a code address in this module and `info` is a
        // live, writable Dl_info.
        let rc = unsafe { libc::dladdr(anchor, &mut info) };
        if rc == 0 || info.dli_fname.is_null() {
            return None;
        }
        // SAFETY: dli_fname points into the loader's own bookkeeping.
        let path = unsafe { CStr::from_ptr(info.dli_fname) };
        Some(path.to_bytes().to_vec())
    }

    fn is_regular_file(&self, path: &[u8]) -> bool {
        std::fs::metadata(OsStr::from_bytes(path)).is_ok_and(|meta| meta.is_file())
    }
}
