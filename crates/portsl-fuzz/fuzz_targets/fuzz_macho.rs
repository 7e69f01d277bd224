#![no_main]
use libfuzzer_sys::fuzz_target;
use portsl_core::macho::{MachHeader64, segments, visit_image_segments};

fuzz_target!(|data: &[u8]| {
    let Ok(header) = MachHeader64::parse(data) else {
        return;
    };
    let span = header.image_span().min(data.len());
    let image = &data[..span];

    if let Ok(segs) = segments(image) {
        assert!(segs.len() <= header.ncmds as usize);
    }
    let _ = visit_image_segments(image, 0x1000, b"/fuzz/image", &mut |_| 0);
});
