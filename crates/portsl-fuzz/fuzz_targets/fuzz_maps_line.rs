#![no_main]
use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use portsl_core::ErrorSlot;
use portsl_core::maps::{parse_maps_line, scan_maps};

fuzz_target!(|data: &[u8]| {
    if let Some(record) = parse_maps_line(data) {
        assert!(data.strip_suffix(b"\n").unwrap_or(data).ends_with(record.path));
        assert!(record.permissions.len() <= 4);
    }

    let errors = ErrorSlot::new();
    let mut visited = 0_usize;
    let rc = scan_maps(Cursor::new(data), &errors, &mut |region| {
        assert!(region.path.starts_with(b"/"));
        visited += 1;
        if visited == 64 { 1 } else { 0 }
    });
    assert!(rc == 0 || rc == 1);
});
