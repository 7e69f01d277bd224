//! `extern "C"` surface of the shared-library layer.
//!
//! All entry points share one process-wide [`HostSharedLibraries`],
//! configured from the environment on first use. Status values are returned
//! as `uintptr_t`; negative codes travel sign-extended.

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::sync::OnceLock;

use portsl_core::{LibraryHandle, OpenFlags, SymbolDescriptor};

use crate::HostSharedLibraries;

/// Visitor invoked per loaded region: `(path, low, high, user_data)`.
pub type LibraryInfoCallback = unsafe extern "C" fn(
    path: *const c_char,
    low: *mut c_void,
    high: *mut c_void,
    user_data: *mut c_void,
) -> usize;

static SERVICE: OnceLock<HostSharedLibraries> = OnceLock::new();

/// The process-wide service.
pub fn service() -> &'static HostSharedLibraries {
    SERVICE.get_or_init(HostSharedLibraries::from_env)
}

#[inline]
fn status(code: i32) -> usize {
    code as isize as usize
}

/// # Safety
///
/// `ptr` is null or a NUL-terminated string that outlives `'a`.
unsafe fn c_bytes_or_empty<'a>(ptr: *const c_char) -> &'a [u8] {
    if ptr.is_null() {
        return b"";
    }
    // SAFETY: per the contract above.
    unsafe { CStr::from_ptr(ptr) }.to_bytes()
}

/// Open a shared library and store its handle in `descriptor`.
///
/// Returns `0` on success, otherwise an error code that is also recorded as
/// the last error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn portsl_sl_open_shared_library(
    name: *const c_char,
    descriptor: *mut usize,
    flags: usize,
) -> usize {
    let name = unsafe { c_bytes_or_empty(name) };
    let flags = OpenFlags::from_bits_truncate(flags as u32);
    match service().open(name, flags) {
        Ok(handle) => {
            if !descriptor.is_null() {
                // SAFETY: non-null out-pointers are writable per the C contract.
                unsafe { descriptor.write(handle.as_raw()) };
            }
            0
        }
        Err(err) => status(err.code()),
    }
}

/// Close a handle. Returns the OS status; `0` for a null handle.
#[unsafe(no_mangle)]
pub extern "C" fn portsl_sl_close_shared_library(descriptor: usize) -> usize {
    status(service().close(LibraryHandle::from_raw(descriptor)))
}

/// Resolve `name` in `descriptor` and store the address in `func`.
///
/// Returns `0` on success and `1` when the symbol is not found. `func` is
/// untouched on failure.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn portsl_sl_lookup_name(
    descriptor: usize,
    name: *const c_char,
    func: *mut usize,
    signature: *const c_char,
) -> usize {
    if name.is_null() {
        return 1;
    }
    // SAFETY: checked non-null; symbol names are NUL-terminated.
    let Ok(name) = unsafe { CStr::from_ptr(name) }.to_str() else {
        return 1;
    };
    let signature = String::from_utf8_lossy(unsafe { c_bytes_or_empty(signature) });
    let symbol = SymbolDescriptor::new(name, &signature);
    match service().lookup(LibraryHandle::from_raw(descriptor), &symbol) {
        Ok(address) => {
            if !func.is_null() {
                // SAFETY: non-null out-pointers are writable per the C contract.
                unsafe { func.write(address.as_raw()) };
            }
            0
        }
        Err(err) => status(err.code()),
    }
}

/// Call `callback` for every file-backed region of every loaded library.
///
/// Returns `0` after a full walk, the first non-zero callback result, or a
/// negative error code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn portsl_sl_get_libraries(
    callback: Option<LibraryInfoCallback>,
    user_data: *mut c_void,
) -> usize {
    let result = match callback {
        None => service().enumerate_libraries(None),
        Some(callback) => service().enumerate_libraries(Some(&mut |region| {
            let Ok(path) = CString::new(region.path) else {
                return 0;
            };
            // SAFETY: `path` lives until the callback returns; `user_data` is
            // the caller's own pointer, passed back untouched.
            unsafe {
                callback(
                    path.as_ptr(),
                    region.low as *mut c_void,
                    region.high as *mut c_void,
                    user_data,
                )
            }
        })),
    };
    match result {
        Ok(result) => result,
        Err(err) => status(err.code()),
    }
}

/// Code of the last recorded failure, `0` if none.
#[unsafe(no_mangle)]
pub extern "C" fn portsl_sl_last_error_number() -> c_int {
    service().last_error().map_or(0, |err| err.code)
}

/// Copy the last failure's message into `buf`, NUL-terminated.
///
/// Returns the number of bytes written before the terminator.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn portsl_sl_last_error_message(buf: *mut c_char, len: usize) -> usize {
    if buf.is_null() || len == 0 {
        return 0;
    }
    let message = service().last_error().map(|err| err.message).unwrap_or_default();
    let count = message.len().min(len - 1);
    // SAFETY: `buf` holds `len` bytes and `count + 1 <= len`.
    unsafe {
        std::ptr::copy_nonoverlapping(message.as_ptr().cast::<c_char>(), buf, count);
        buf.add(count).write(0);
    }
    count
}

/// Startup hook. Returns `0`.
#[unsafe(no_mangle)]
pub extern "C" fn portsl_sl_startup() -> c_int {
    match service().startup() {
        Ok(()) => 0,
        Err(err) => err.code(),
    }
}

/// Shutdown hook.
#[unsafe(no_mangle)]
pub extern "C" fn portsl_sl_shutdown() {
    service().shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_codes_sign_extend() {
        assert_eq!(status(-1), usize::MAX);
        assert_eq!(status(-3), usize::MAX - 2);
        assert_eq!(status(2), 2);
    }

    #[test]
    fn lifecycle_hooks() {
        assert_eq!(portsl_sl_startup(), 0);
        portsl_sl_shutdown();
    }

    #[test]
    fn close_null_descriptor() {
        assert_eq!(portsl_sl_close_shared_library(0), 0);
    }

    #[test]
    fn null_callback_is_opfailed() {
        let rc = unsafe { portsl_sl_get_libraries(None, std::ptr::null_mut()) };
        assert_eq!(rc, usize::MAX);
    }

    #[test]
    fn message_buffer_bounds() {
        assert_eq!(
            unsafe { portsl_sl_last_error_message(std::ptr::null_mut(), 16) },
            0
        );
        let mut buf = [0x7f as c_char; 4];
        let n = unsafe { portsl_sl_last_error_message(buf.as_mut_ptr(), buf.len()) };
        assert!(n <= 3);
        assert_eq!(buf[n], 0);
    }
}
