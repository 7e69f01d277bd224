#![no_main]
use libfuzzer_sys::fuzz_target;
use portsl_core::error_text::{
    RawCopy, Utf8Decoder, WideCharTranscoder, normalize_error_text,
};

fuzz_target!(|data: &[u8]| {
    let Some((&cap, raw)) = data.split_first() else {
        return;
    };
    let mut out = vec![0xAA_u8; usize::from(cap)];

    let len = normalize_error_text(Some(raw), &mut out, &mut WideCharTranscoder::new(Utf8Decoder));
    if !out.is_empty() {
        assert!(len < out.len());
        assert_eq!(out[len], 0);
    }

    let len = normalize_error_text(Some(raw), &mut out, &mut RawCopy);
    if !out.is_empty() {
        assert!(len < out.len());
        assert_eq!(out[len], 0);
    }
});
