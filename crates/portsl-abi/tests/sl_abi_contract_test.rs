//! Contract tests for the `portsl_sl_*` C entry points.
#![cfg(target_os = "linux")]

use std::ffi::{CStr, CString, OsStr, c_char, c_void};
use std::os::unix::ffi::OsStrExt;
use std::sync::Mutex;

use portsl_abi::sl_abi::{
    portsl_sl_close_shared_library, portsl_sl_get_libraries, portsl_sl_last_error_message,
    portsl_sl_last_error_number, portsl_sl_lookup_name, portsl_sl_open_shared_library,
};

// The entry points share one last-error slot.
static TEST_LOCK: Mutex<()> = Mutex::new(());

const LAZY: usize = 0x1;
const DECORATE: usize = 0x2;
const NO_LOAD: usize = 0x8;

unsafe extern "C" fn count_regions(
    path: *const c_char,
    low: *mut c_void,
    high: *mut c_void,
    user_data: *mut c_void,
) -> usize {
    let path = unsafe { CStr::from_ptr(path) };
    assert_eq!(path.to_bytes().first(), Some(&b'/'));
    assert!((low as usize) < (high as usize));
    let count = unsafe { &mut *user_data.cast::<usize>() };
    *count += 1;
    0
}

unsafe extern "C" fn stop_immediately(
    _path: *const c_char,
    _low: *mut c_void,
    _high: *mut c_void,
    _user_data: *mut c_void,
) -> usize {
    42
}

unsafe extern "C" fn find_libc(
    path: *const c_char,
    _low: *mut c_void,
    _high: *mut c_void,
    user_data: *mut c_void,
) -> usize {
    let path = unsafe { CStr::from_ptr(path) }.to_bytes();
    if !path.ends_with(b"/libc.so.6") {
        return 0;
    }
    let found = unsafe { &mut *user_data.cast::<Option<Vec<u8>>>() };
    *found = Some(path.to_vec());
    1
}

fn last_message() -> String {
    let mut buf = [0 as c_char; 512];
    let len = unsafe { portsl_sl_last_error_message(buf.as_mut_ptr(), buf.len()) };
    let bytes: Vec<u8> = buf[..len].iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[test]
fn open_lookup_close_round() {
    let _guard = TEST_LOCK.lock().unwrap();
    let mut handle = 0_usize;
    let rc = unsafe { portsl_sl_open_shared_library(c"libc.so.6".as_ptr(), &mut handle, LAZY) };
    assert_eq!(rc, 0);
    assert_ne!(handle, 0);

    let mut func = 0_usize;
    let rc =
        unsafe { portsl_sl_lookup_name(handle, c"strlen".as_ptr(), &mut func, c"pL".as_ptr()) };
    assert_eq!(rc, 0);
    assert_ne!(func, 0);

    let mut untouched = 0xabcd_usize;
    let rc = unsafe {
        portsl_sl_lookup_name(handle, c"portsl_absent".as_ptr(), &mut untouched, c"V".as_ptr())
    };
    assert_eq!(rc, 1);
    assert_eq!(untouched, 0xabcd);

    assert_eq!(portsl_sl_close_shared_library(handle), 0);
}

#[test]
fn failed_open_sets_last_error() {
    let _guard = TEST_LOCK.lock().unwrap();
    let mut handle = 0_usize;
    let rc = unsafe {
        portsl_sl_open_shared_library(c"portsl-missing".as_ptr(), &mut handle, DECORATE)
    };
    assert_eq!(rc, 1);
    assert_eq!(handle, 0);
    assert_eq!(portsl_sl_last_error_number(), 1);
    assert!(last_message().contains("libportsl-missing.so"));
}

#[test]
fn no_load_miss_is_not_found() {
    let _guard = TEST_LOCK.lock().unwrap();
    let mut handle = 0_usize;
    let rc = unsafe {
        portsl_sl_open_shared_library(c"libportsl-never-loaded.so".as_ptr(), &mut handle, NO_LOAD)
    };
    assert_eq!(rc, 1);
}

#[test]
fn empty_name_is_unsupported() {
    let _guard = TEST_LOCK.lock().unwrap();
    let mut handle = 0_usize;
    let rc = unsafe { portsl_sl_open_shared_library(std::ptr::null(), &mut handle, 0) };
    assert_eq!(rc, 3);
    assert_eq!(portsl_sl_last_error_number(), 3);
}

#[test]
fn get_libraries_walks_and_stops() {
    let _guard = TEST_LOCK.lock().unwrap();
    let mut count = 0_usize;
    let rc = unsafe {
        portsl_sl_get_libraries(Some(count_regions), (&raw mut count).cast::<c_void>())
    };
    assert_eq!(rc, 0);
    assert!(count > 0);

    let rc = unsafe { portsl_sl_get_libraries(Some(stop_immediately), std::ptr::null_mut()) };
    assert_eq!(rc, 42);
}

#[test]
fn get_libraries_without_callback() {
    let _guard = TEST_LOCK.lock().unwrap();
    let rc = unsafe { portsl_sl_get_libraries(None, std::ptr::null_mut()) };
    assert_eq!(rc as isize, -1);
    assert_eq!(portsl_sl_last_error_number(), -1);
    assert_eq!(last_message(), "Callback function is NULL.");
}

#[test]
fn open_passes_non_utf8_path_bytes() {
    let _guard = TEST_LOCK.lock().unwrap();
    let mut libc: Option<Vec<u8>> = None;
    let rc = unsafe { portsl_sl_get_libraries(Some(find_libc), (&raw mut libc).cast::<c_void>()) };
    assert_eq!(rc, 1);
    let libc = libc.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let odd_dir = dir.path().join(OsStr::from_bytes(b"caf\xe9"));
    std::fs::create_dir(&odd_dir).unwrap();
    let link = odd_dir.join("libc.so.6");
    std::os::unix::fs::symlink(OsStr::from_bytes(&libc), &link).unwrap();

    let name = CString::new(link.as_os_str().as_bytes()).unwrap();
    let mut handle = 0_usize;
    let rc = unsafe { portsl_sl_open_shared_library(name.as_ptr(), &mut handle, LAZY) };
    assert_eq!(rc, 0);
    assert_ne!(handle, 0);
    assert_eq!(portsl_sl_close_shared_library(handle), 0);
}
